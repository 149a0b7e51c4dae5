//! AES in OFB mode.
//!
//! Every keystream starts from the same all-zero IV. That is only sound
//! while a key never protects two different plaintexts in the same
//! direction, so one [`AesPool`] key is meant for a bounded, session-scoped
//! set of connections and not as a long-term secret. There is no integrity
//! tag; run it alongside TLS when tampering matters.

use std::fmt;

use ::aes::{Aes128, Aes192, Aes256};
use ofb::cipher::generic_array::GenericArray;
use ofb::cipher::KeyIvInit;
use ofb::Ofb;

use super::{CipherError, CipherPool, Keystream};

#[derive(Clone)]
enum AesKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

/// Hands out AES-OFB encrypting and decrypting keystreams for one key.
#[derive(Clone)]
pub struct AesPool {
    key: AesKey,
}

impl AesPool {
    /// Build a pool from a 16, 24 or 32 byte key (AES-128/192/256).
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        let key = match key.len() {
            16 => AesKey::Aes128(copy_key(key)),
            24 => AesKey::Aes192(copy_key(key)),
            32 => AesKey::Aes256(copy_key(key)),
            n => return Err(CipherError::InvalidKeyLength(n)),
        };
        Ok(Self { key })
    }

    /// Key size in bits.
    pub fn key_bits(&self) -> usize {
        match self.key {
            AesKey::Aes128(_) => 128,
            AesKey::Aes192(_) => 192,
            AesKey::Aes256(_) => 256,
        }
    }

    fn keystream(&self) -> Box<dyn Keystream> {
        match &self.key {
            AesKey::Aes128(k) => Box::new(Ofb::<Aes128>::new(
                GenericArray::from_slice(k),
                &GenericArray::default(),
            )),
            AesKey::Aes192(k) => Box::new(Ofb::<Aes192>::new(
                GenericArray::from_slice(k),
                &GenericArray::default(),
            )),
            AesKey::Aes256(k) => Box::new(Ofb::<Aes256>::new(
                GenericArray::from_slice(k),
                &GenericArray::default(),
            )),
        }
    }
}

fn copy_key<const N: usize>(key: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(key);
    out
}

impl CipherPool for AesPool {
    fn reader(&self) -> Option<Box<dyn Keystream>> {
        Some(self.keystream())
    }

    fn writer(&self) -> Option<Box<dyn Keystream>> {
        Some(self.keystream())
    }
}

impl fmt::Debug for AesPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesPool")
            .field("key_bits", &self.key_bits())
            .finish_non_exhaustive()
    }
}
