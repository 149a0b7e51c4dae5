//! Listener abstraction and the TCP implementation.
//!
//! # Responsibilities
//! - Bind to `host:port` addresses (empty host = all interfaces)
//! - Accept incoming TCP connections
//! - Enable TCP keep-alive on accepted sockets

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{Error, Result};

/// Keep-alive period applied to accepted TCP connections.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(3 * 60);

/// Source of raw connections for [`Server::serve`](crate::Server::serve).
///
/// `accept` errors are classified by the accept loop: transient ones are
/// retried with backoff, anything else ends the loop.
pub trait Listener: Send + 'static {
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Io, Option<SocketAddr>)>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// TCP listener with keep-alive on accepted sockets.
#[derive(Debug)]
pub struct TcpAcceptor {
    inner: TcpListener,
    keepalive: Option<Duration>,
}

impl TcpAcceptor {
    /// Bind to `addr`. A leading `:` (no host) binds all interfaces.
    pub async fn bind(addr: &str) -> Result<Self> {
        let bind_addr = normalize_bind_addr(addr);
        let listener = TcpListener::bind(bind_addr.as_str())
            .await
            .map_err(|source| Error::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self::from_listener(listener))
    }

    pub fn from_listener(inner: TcpListener) -> Self {
        Self {
            inner,
            keepalive: Some(DEFAULT_KEEPALIVE),
        }
    }

    /// Override the keep-alive period; `None` leaves sockets untouched.
    pub fn with_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.keepalive = keepalive;
        self
    }
}

impl Listener for TcpAcceptor {
    type Io = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, Option<SocketAddr>)> {
        let (stream, peer_addr) = self.inner.accept().await?;
        if let Some(period) = self.keepalive {
            let params = TcpKeepalive::new().with_time(period);
            if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&params) {
                tracing::debug!(peer_addr = %peer_addr, error = %e, "Failed to enable keep-alive");
            }
        }
        Ok((stream, Some(peer_addr)))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// `":8080"` → `"0.0.0.0:8080"`; anything else is returned unchanged.
fn normalize_bind_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}
