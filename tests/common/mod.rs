//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use socketkit::net::tls;
use socketkit::net::TcpAcceptor;
use socketkit::{Client, Config, Connection, Handler, Server, TlsSettings};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Start `server` on an ephemeral loopback port, terminating TLS when its
/// config carries TLS settings.
///
/// Returns the bound address and the accept loop's task.
pub async fn start_server<H: Handler>(
    server: Arc<Server>,
    handler: H,
) -> (String, JoinHandle<socketkit::Result<Infallible>>) {
    let listener = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    let addr = socketkit::net::Listener::local_addr(&listener)
        .unwrap()
        .to_string();
    let task = tokio::spawn(async move {
        if server.config.tls.is_some() {
            server.serve_tls(listener, handler).await
        } else {
            server.serve(listener, handler).await
        }
    });
    (addr, task)
}

/// Copy everything read back to the peer until EOF or error.
pub fn echo(conn: &mut Connection) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let mut buf = [0u8; 1024];
        loop {
            match conn.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => {
                    if conn.write_all(&buf[..n]).await.is_err() {
                        return;
                    }
                    if conn.flush().await.is_err() {
                        return;
                    }
                }
            }
        }
    })
}

pub fn explode(_conn: &mut Connection) -> BoxFuture<'_, ()> {
    Box::pin(async { panic!("handler exploded") })
}

/// Write `msg`, then read back exactly as many bytes.
pub async fn round_trip(conn: &mut Connection, msg: &[u8]) -> std::io::Result<Vec<u8>> {
    conn.write_all(msg).await?;
    conn.flush().await?;
    let mut out = vec![0u8; msg.len()];
    conn.read_exact(&mut out).await?;
    Ok(out)
}

/// Self-signed "localhost" certificate and its key.
pub fn self_signed() -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(certified.key_pair.serialize_der().into());
    (cert, key)
}

/// Settings usable by both ends: the server presents the self-signed
/// certificate and the client trusts only it.
pub fn tls_settings() -> TlsSettings {
    let (cert, key) = self_signed();
    let server = tls::server_config(vec![cert.clone()], key).unwrap();
    let client = tls::client_config(vec![cert]).unwrap();
    TlsSettings {
        server: Some(Arc::new(server)),
        client: Some(Arc::new(client)),
        server_name: Some("localhost".to_string()),
    }
}

pub fn tls_config() -> Config {
    Config::default().with_tls(tls_settings())
}

/// Dial `addr`, send `msg` and collect the reply of the same length.
pub async fn exchange(
    client: &Client,
    addr: &str,
    msg: &'static [u8],
) -> socketkit::Result<std::io::Result<Vec<u8>>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .connect_fn(addr, move |conn| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(round_trip(conn, msg).await);
            })
        })
        .await?;
    Ok(rx.recv().await.expect("handler ran"))
}
