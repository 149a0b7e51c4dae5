//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SocketConfig (validated file form)
//!     → Config (runtime form: TLS configs, idle timeout, cipher pool)
//!     → cloned into each Server / Client
//! ```
//!
//! # Design Decisions
//! - `Config` is an inert value; servers snapshot it when an accept loop
//!   starts, so later edits only affect loops started afterwards
//! - Changing a config a running loop still reads from another task is a
//!   race, not a supported contract
//! - All file fields have defaults to allow minimal configs

pub mod loader;
pub mod schema;
pub mod validation;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cipher::CipherPool;
use crate::net::tls::TlsSettings;

pub use schema::SocketConfig;

/// Runtime configuration attached to a [`Server`](crate::Server) or
/// [`Client`](crate::Client).
#[derive(Clone, Default)]
pub struct Config {
    /// TLS settings for secure sockets.
    pub tls: Option<TlsSettings>,

    /// After a connection is opened and after each successful I/O call the
    /// transport deadline is moved to `now + idle_timeout`.
    ///
    /// Zero disables timeouts entirely.
    pub idle_timeout: Duration,

    /// In-house stream encryption, layered on top of TLS when both are set.
    pub cipher: Option<Arc<dyn CipherPool>>,
}

impl Config {
    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_cipher<P: CipherPool>(mut self, pool: P) -> Self {
        self.cipher = Some(Arc::new(pool));
        self
    }

    pub fn with_shared_cipher(mut self, pool: Arc<dyn CipherPool>) -> Self {
        self.cipher = Some(pool);
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("tls", &self.tls)
            .field("idle_timeout", &self.idle_timeout)
            .field("cipher", &self.cipher.is_some())
            .finish()
    }
}
