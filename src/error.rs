//! Crate-wide error type.

use std::io;

use crate::cipher::CipherError;
use crate::config::loader::ConfigError;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by servers and clients.
///
/// Per-connection I/O failures never show up here; they reach the handler
/// as ordinary `io::Error`s on the [`Connection`](crate::Connection).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to bind a listener.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Failed to open an outbound connection.
    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Non-transient accept failure; ends the accept loop.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The listener was closed by [`Server::close`](crate::Server::close).
    #[error("listener closed")]
    ListenerClosed,

    /// TLS settings could not be built or used.
    #[error("tls: {0}")]
    Tls(String),

    /// Client-side TLS handshake failed.
    #[error("tls handshake failed: {0}")]
    TlsHandshake(#[source] io::Error),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// True when the error is the normal shutdown path of an accept loop.
    pub fn is_listener_closed(&self) -> bool {
        matches!(self, Error::ListenerClosed)
    }
}
