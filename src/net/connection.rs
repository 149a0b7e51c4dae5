//! Per-connection decorated stream and lifecycle tracking.
//!
//! # Responsibilities
//! - Layer the optional cipher over the raw transport
//! - Push the idle deadline forward after every successful read/write
//! - Generate unique connection IDs for tracing
//! - Count live connections so shutdown can observe draining
//!
//! # Layering
//! ```text
//! handler ⇄ Connection (idle-deadline bookkeeping)
//!         ⇄ CipherStream (optional keystreams)
//!         ⇄ Transport (TLS or TCP, owns the absolute deadline)
//! ```

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

use crate::cipher::CipherStream;
use crate::config::Config;
use crate::net::deadline::Transport;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A duplex byte stream handed to a [`Handler`](crate::Handler).
///
/// Reads and writes go through the configured cipher, if any. After every
/// call that moves at least one byte without error, and when the idle
/// timeout is non-zero, the transport deadline is pushed to
/// `now + idle_timeout`. Failing to move the deadline is logged, never
/// returned; the I/O result stands.
///
/// A connection is owned by exactly one handler invocation and is closed
/// after the handler returns.
pub struct Connection {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    stream: CipherStream<Box<dyn Transport>>,
    idle_timeout: Duration,
}

impl Connection {
    /// Decorate `transport` according to `config`.
    pub fn new(transport: Box<dyn Transport>, config: &Config) -> Self {
        Self {
            id: ConnectionId::new(),
            peer_addr: None,
            stream: CipherStream::new(transport, config.cipher.as_deref()),
            idle_timeout: config.idle_timeout,
        }
    }

    pub(crate) fn with_peer_addr(mut self, peer_addr: Option<SocketAddr>) -> Self {
        self.peer_addr = peer_addr;
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address, when the transport has one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Whether the in-house cipher is active in either direction.
    pub fn is_encrypted(&self) -> bool {
        self.stream.is_encrypted()
    }

    fn extend_deadline(&mut self) {
        if self.idle_timeout.is_zero() {
            return;
        }
        let deadline = Instant::now() + self.idle_timeout;
        if let Err(e) = self.stream.get_mut().set_deadline(deadline) {
            tracing::warn!(connection_id = %self.id, error = %e, "Failed to extend idle deadline");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("idle_timeout", &self.idle_timeout)
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let res = Pin::new(&mut this.stream).poll_read(cx, buf);
        if matches!(res, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            this.extend_deadline();
        }
        res
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let res = Pin::new(&mut this.stream).poll_write(cx, buf);
        if matches!(res, Poll::Ready(Ok(n)) if n > 0) {
            this.extend_deadline();
        }
        res
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

/// Tracks live connections for draining.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new live connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        crate::observability::metrics::record_connection_opened();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime, including through a panic.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        crate::observability::metrics::record_connection_closed();
    }
}
