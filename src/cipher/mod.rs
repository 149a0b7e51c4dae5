//! In-house stream encryption layered over the transport.
//!
//! # Data Flow
//! ```text
//! handler write → CipherStream (encrypt keystream) → transport (TLS/TCP)
//! handler read  ← CipherStream (decrypt keystream) ← transport (TLS/TCP)
//! ```
//!
//! # Design Decisions
//! - A [`CipherPool`] is shared read-only across connections; every call to
//!   [`CipherPool::reader`] / [`CipherPool::writer`] yields a fresh
//!   [`Keystream`] owned by exactly one connection direction
//! - A pool may leave a direction unencrypted by returning `None`
//! - The layer knows nothing about deadlines; those live on the transport

pub mod aes;

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use ofb::cipher::StreamCipher;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pub use self::aes::AesPool;

/// Largest chunk encrypted per `poll_write` call.
const MAX_WRITE_CHUNK: usize = 16 * 1024;

/// Error type for cipher setup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("invalid key length {0}; expected 16, 24 or 32 bytes")]
    InvalidKeyLength(usize),
}

/// A synchronous keystream XORed over every byte passing through it.
pub trait Keystream: Send {
    fn apply_keystream(&mut self, buf: &mut [u8]);
}

impl<T: StreamCipher + Send> Keystream for T {
    fn apply_keystream(&mut self, buf: &mut [u8]) {
        StreamCipher::apply_keystream(self, buf)
    }
}

/// Tells servers and clients how to set up in-house encryption.
///
/// Encryption runs on top of TLS when both are configured.
pub trait CipherPool: Send + Sync + 'static {
    /// New keystream decrypting bytes read from the transport. `None` means
    /// reads pass through untouched.
    fn reader(&self) -> Option<Box<dyn Keystream>>;

    /// New keystream encrypting bytes written to the transport. `None` means
    /// writes pass through untouched.
    fn writer(&self) -> Option<Box<dyn Keystream>>;
}

impl<P: CipherPool + ?Sized> CipherPool for Arc<P> {
    fn reader(&self) -> Option<Box<dyn Keystream>> {
        (**self).reader()
    }

    fn writer(&self) -> Option<Box<dyn Keystream>> {
        (**self).writer()
    }
}

/// A duplex stream whose reads are decrypted and writes encrypted.
///
/// Writes are encrypted into an internal buffer before touching the inner
/// stream, so a write reported as accepted has already consumed keystream.
/// Unsent ciphertext drains on the next write, flush, shutdown or read.
/// A write whose ciphertext the inner stream rejects returns that error and
/// the ciphertext is discarded.
pub struct CipherStream<S> {
    inner: S,
    decrypt: Option<Box<dyn Keystream>>,
    encrypt: Option<Box<dyn Keystream>>,
    pending: Vec<u8>,
    written: usize,
}

impl<S> CipherStream<S> {
    /// Wrap `inner` with keystreams taken from `pool`.
    pub fn new(inner: S, pool: Option<&dyn CipherPool>) -> Self {
        let (decrypt, encrypt) = match pool {
            Some(pool) => (pool.reader(), pool.writer()),
            None => (None, None),
        };
        Self {
            inner,
            decrypt,
            encrypt,
            pending: Vec::new(),
            written: 0,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Whether any direction is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.decrypt.is_some() || self.encrypt.is_some()
    }
}

impl<S: AsyncWrite + Unpin> CipherStream<S> {
    /// Push buffered ciphertext into the inner stream.
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.written < self.pending.len() {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.pending[self.written..]))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.written += n;
        }
        self.pending.clear();
        self.written = 0;
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncRead for CipherStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        // A peer waiting on our ciphertext before it answers would otherwise
        // deadlock a handler that reads without flushing.
        if !this.pending.is_empty() {
            if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
                return Poll::Ready(Err(e));
            }
        }

        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        if let Some(decrypt) = this.decrypt.as_mut() {
            decrypt.apply_keystream(&mut buf.filled_mut()[before..]);
        }
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for CipherStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.encrypt.is_none() {
            return Pin::new(&mut this.inner).poll_write(cx, buf);
        }

        ready!(this.poll_drain(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let n = buf.len().min(MAX_WRITE_CHUNK);
        this.pending.extend_from_slice(&buf[..n]);
        if let Some(encrypt) = this.encrypt.as_mut() {
            encrypt.apply_keystream(&mut this.pending);
        }

        // Accepted once encrypted, unless the transport refuses them outright.
        // A pending drain finishes on the next write or flush.
        if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
            this.pending.clear();
            this.written = 0;
            return Poll::Ready(Err(e));
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}
