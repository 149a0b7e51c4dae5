//! Socket client: one outbound connection per call.

use futures_util::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handler::{Handler, HandlerFn};
use crate::net::connection::Connection;
use crate::net::deadline::{DeadlineStream, Transport};

/// Dials servers and runs a handler over each connection.
///
/// The connection is decorated exactly as the server side is: optional TLS,
/// then the optional cipher, then idle-deadline bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Client {
    pub config: Config,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Connect to the TCP address `addr` and run `handler` on the
    /// connection, closing it when the handler returns.
    ///
    /// A single attempt is made. Dial and handshake failures are returned;
    /// a failure closing the connection afterwards is only logged.
    pub async fn connect<H: Handler>(&self, addr: &str, handler: H) -> Result<()> {
        let tcp = TcpStream::connect(addr).await.map_err(|source| Error::Dial {
            addr: addr.to_string(),
            source,
        })?;
        let peer_addr = tcp.peer_addr().ok();

        let mut stream = DeadlineStream::new(tcp);
        if !self.config.idle_timeout.is_zero() {
            stream.set_deadline(Instant::now() + self.config.idle_timeout)?;
        }

        let transport: Box<dyn Transport> = match &self.config.tls {
            Some(tls) => {
                let connector = tls
                    .connector()
                    .ok_or_else(|| Error::Tls("no client configuration to dial with".into()))?;
                let server_name = tls.server_name_for(addr)?;
                let tls_stream = connector
                    .connect(server_name, stream)
                    .await
                    .map_err(Error::TlsHandshake)?;
                Box::new(tls_stream)
            }
            None => Box::new(stream),
        };

        let mut conn = Connection::new(transport, &self.config).with_peer_addr(peer_addr);
        let id = conn.id();
        tracing::debug!(connection_id = %id, addr, "Connected");

        handler.serve_socket(&mut conn).await;

        if let Err(e) = conn.shutdown().await {
            tracing::warn!(connection_id = %id, error = %e, "Connection close failed");
        }
        tracing::debug!(connection_id = %id, "Connection closed");
        Ok(())
    }

    /// [`connect`](Client::connect) with a plain function.
    pub async fn connect_fn<F>(&self, addr: &str, f: F) -> Result<()>
    where
        F: for<'a> Fn(&'a mut Connection) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.connect(addr, HandlerFn(f)).await
    }
}
