//! Socket server: accept loop, per-connection tasks and shutdown.
//!
//! # Responsibilities
//! - Bind listeners and apply TLS termination when configured
//! - Accept in a loop, backing off on transient errors
//! - Run each connection's handler on its own task, isolating panics
//! - Stop accepting on [`Server::close`] while in-flight connections drain
//!
//! # States
//! ```text
//! Idle → Listening → Draining → Stopped
//! ```

use std::any::Any;
use std::backtrace::Backtrace;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_rustls::TlsAcceptor;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handler::{Handler, HandlerFn};
use crate::lifecycle::Shutdown;
use crate::net::connection::{Connection, ConnectionTracker};
use crate::net::deadline::{DeadlineStream, Transport};
use crate::net::listener::{Listener, TcpAcceptor};
use crate::net::tls::TlsSettings;
use crate::observability::metrics;
use crate::resilience::{is_transient_accept_error, AcceptBackoff};

/// A socket server.
///
/// `listen_and_serve` may be called several times, concurrently, on
/// different addresses; a single [`close`](Server::close) stops all of them.
/// Each accept loop snapshots [`config`](Server::config) when it starts, so
/// loops already running keep their old configuration.
pub struct Server {
    /// Configuration for new incoming connections.
    pub config: Config,
    parent: Option<Shutdown>,
    /// Scope shared by running accept loops; created on first use.
    scope: Mutex<Option<Shutdown>>,
    tracker: ConnectionTracker,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            parent: None,
            scope: Mutex::new(None),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Derive the server's scope from `parent`: triggering the parent stops
    /// this server's accept loops too.
    pub fn with_parent(mut self, parent: &Shutdown) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Connections whose handler is still running.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Current scope, created under the lock if no loop has started yet.
    fn scope(&self) -> Shutdown {
        let mut scope = self.scope.lock().unwrap_or_else(PoisonError::into_inner);
        scope
            .get_or_insert_with(|| match &self.parent {
                Some(parent) => parent.child(),
                None => Shutdown::new(),
            })
            .clone()
    }

    /// Listen on the TCP address `addr` and serve incoming connections with
    /// `handler`. Blocks until the loop ends; see [`Server::serve`].
    ///
    /// `addr` is `"host:port"`, like `"127.0.0.1:8080"`. If host is omitted,
    /// as in `":8080"`, all interfaces are used. TLS is terminated when
    /// [`Config::tls`] is set.
    pub async fn listen_and_serve<H: Handler>(&self, addr: &str, handler: H) -> Result<Infallible> {
        let scope = self.scope();
        let listener = TcpAcceptor::bind(addr).await?;
        let tls = self.config.tls.is_some();
        self.serve_in(scope, listener, handler, tls).await
    }

    /// [`listen_and_serve`](Server::listen_and_serve) with a plain function.
    pub async fn listen_and_serve_fn<F>(&self, addr: &str, f: F) -> Result<Infallible>
    where
        F: for<'a> Fn(&'a mut Connection) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.listen_and_serve(addr, HandlerFn(f)).await
    }

    /// Accept connections on `listener`, running `handler` for each on a new
    /// task.
    ///
    /// The listener's streams are used as they are: [`Config::tls`] is
    /// ignored here, so a listener that already yields TLS streams is not
    /// wrapped twice. Use [`serve_tls`](Server::serve_tls) to terminate TLS
    /// on a plain listener.
    ///
    /// Never returns `Ok`: the loop ends with [`Error::ListenerClosed`] after
    /// [`close`](Server::close), or with the first non-transient accept
    /// error.
    pub async fn serve<L: Listener, H: Handler>(&self, listener: L, handler: H) -> Result<Infallible> {
        let scope = self.scope();
        self.serve_in(scope, listener, handler, false).await
    }

    /// [`serve`](Server::serve), terminating TLS on each accepted stream with
    /// the server half of [`Config::tls`].
    ///
    /// Fails with [`Error::Tls`] before accepting anything when no server
    /// TLS configuration is set.
    pub async fn serve_tls<L: Listener, H: Handler>(
        &self,
        listener: L,
        handler: H,
    ) -> Result<Infallible> {
        let scope = self.scope();
        self.serve_in(scope, listener, handler, true).await
    }

    /// Stop accepting new connections on every running loop.
    ///
    /// Does not wait for, or interrupt, connections already accepted.
    /// Calling it again, or before serving, is a no-op.
    pub fn close(&self) {
        let scope = self
            .scope
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(scope) = scope {
            scope.trigger();
            tracing::info!(
                active_connections = self.tracker.active_count(),
                "Server closed; draining connections"
            );
        }
    }

    async fn serve_in<L: Listener, H: Handler>(
        &self,
        scope: Shutdown,
        mut listener: L,
        handler: H,
        tls: bool,
    ) -> Result<Infallible> {
        let mut signal = scope.subscribe();
        let config = self.config.clone();
        let acceptor = if tls {
            let acceptor = config.tls.as_ref().and_then(TlsSettings::acceptor);
            Some(acceptor.ok_or_else(|| Error::Tls("no server configuration to listen with".into()))?)
        } else {
            None
        };
        let handler = Arc::new(handler);
        let local_addr = listener.local_addr().ok();

        tracing::info!(
            address = ?local_addr,
            tls = acceptor.is_some(),
            cipher = config.cipher.is_some(),
            idle_timeout = ?config.idle_timeout,
            "Accept loop started"
        );

        let mut backoff = AcceptBackoff::new();
        loop {
            let accepted = tokio::select! {
                biased;
                _ = signal.recv() => None,
                res = listener.accept() => Some(res),
            };

            let (io, peer_addr) = match accepted {
                None => {
                    tracing::info!(address = ?local_addr, "Listener closed");
                    return Err(Error::ListenerClosed);
                }
                Some(Ok(accepted)) => accepted,
                Some(Err(e)) if is_transient_accept_error(&e) => {
                    let delay = backoff.next_delay();
                    metrics::record_accept_retry();
                    tracing::warn!(error = %e, retry_in = ?delay, "Accept error; retrying");
                    tokio::select! {
                        biased;
                        _ = signal.recv() => {
                            tracing::info!(address = ?local_addr, "Listener closed");
                            return Err(Error::ListenerClosed);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
                Some(Err(e)) => {
                    tracing::error!(address = ?local_addr, error = %e, "Accept failed; stopping");
                    return Err(Error::Accept(e));
                }
            };
            backoff.reset();

            let mut stream = DeadlineStream::new(io);
            if !config.idle_timeout.is_zero() {
                if let Err(e) = stream.set_deadline(Instant::now() + config.idle_timeout) {
                    tracing::warn!(peer_addr = ?peer_addr, error = %e, "Failed to set idle deadline");
                }
            }

            let guard = self.tracker.track();
            let config = config.clone();
            let acceptor = acceptor.clone();
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                serve_connection(stream, peer_addr, config, acceptor, handler).await;
                drop(guard);
            });
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("active_connections", &self.tracker.active_count())
            .finish_non_exhaustive()
    }
}

/// Body of a per-connection task: TLS handshake, decoration, handler, close.
async fn serve_connection<S, H>(
    stream: DeadlineStream<S>,
    peer_addr: Option<SocketAddr>,
    config: Config,
    acceptor: Option<TlsAcceptor>,
    handler: Arc<H>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: Handler,
{
    let transport: Box<dyn Transport> = match acceptor {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls) => Box::new(tls),
            Err(e) => {
                tracing::debug!(peer_addr = ?peer_addr, error = %e, "TLS handshake failed");
                return;
            }
        },
        None => Box::new(stream),
    };

    let mut conn = Connection::new(transport, &config).with_peer_addr(peer_addr);
    let id = conn.id();
    tracing::debug!(connection_id = %id, peer_addr = ?peer_addr, "Connection accepted");

    let outcome = AssertUnwindSafe(async { handler.serve_socket(&mut conn).await })
        .catch_unwind()
        .await;
    if let Err(panic) = outcome {
        metrics::record_handler_panic();
        tracing::error!(
            connection_id = %id,
            peer_addr = ?peer_addr,
            panic = panic_message(panic.as_ref()),
            backtrace = %Backtrace::force_capture(),
            "Handler panicked; hanging up"
        );
    }

    if let Err(e) = conn.shutdown().await {
        tracing::warn!(connection_id = %id, error = %e, "Connection close failed");
    }
    tracing::debug!(connection_id = %id, "Connection closed");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
