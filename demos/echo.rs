//! Echo server driven by a TOML config file.
//!
//! ```text
//! cargo run --example echo -- demos/echo.toml
//! ```
//!
//! Ctrl-C stops accepting; connections already open are left to finish.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use socketkit::config::loader::load_config;
use socketkit::observability::logging;
use socketkit::{Connection, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn echo(conn: &mut Connection) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let mut buf = [0u8; 4096];
        loop {
            let n = match conn.read(&mut buf).await {
                Ok(0) => return,
                Ok(n) => n,
                Err(e) => {
                    tracing::info!(connection_id = %conn.id(), error = %e, "Read ended");
                    return;
                }
            };
            if conn.write_all(&buf[..n]).await.is_err() || conn.flush().await.is_err() {
                return;
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("demos/echo.toml"));
    let config = load_config(&path)?;
    logging::init(&config.observability.log_level);

    let server = Arc::new(Server::new(config.server_config()?));
    let closer = Arc::clone(&server);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            closer.close();
        }
    });

    tracing::info!(address = %config.listener.bind_address, "Echo server starting");
    match server
        .listen_and_serve_fn(&config.listener.bind_address, echo)
        .await
    {
        Err(e) if e.is_listener_closed() => Ok(()),
        Err(e) => Err(e.into()),
        Ok(never) => match never {},
    }
}
