//! End-to-end server and client behavior over loopback TCP.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use socketkit::net::{Listener, TcpAcceptor};
use socketkit::{handler_fn, Client, Config, Connection, Error, Handler, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

mod common;

#[tokio::test]
async fn test_echo_round_trip() {
    let server = Arc::new(Server::default());
    let (addr, _task) = common::start_server(Arc::clone(&server), handler_fn(common::echo)).await;

    let reply = common::exchange(&Client::default(), &addr, b"hello, world!")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, b"hello, world!");
    server.close();
}

#[tokio::test]
async fn test_server_speaks_first() {
    let server = Arc::new(Server::default());
    let greet = handler_fn(|conn| {
        Box::pin(async move {
            let _ = conn.write_all(b"welcome").await;
            let _ = conn.flush().await;
        })
    });
    let (addr, _task) = common::start_server(Arc::clone(&server), greet).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    Client::default()
        .connect_fn(&addr, move |conn| {
            let tx = tx.clone();
            Box::pin(async move {
                let mut buf = Vec::new();
                let _ = tx.send(conn.read_to_end(&mut buf).await.map(|_| buf));
            })
        })
        .await
        .unwrap();
    assert_eq!(rx.recv().await.unwrap().unwrap(), b"welcome");
    server.close();
}

struct PanicFirst(AtomicBool);

impl Handler for PanicFirst {
    fn serve_socket<'a>(&'a self, conn: &'a mut Connection) -> BoxFuture<'a, ()> {
        let first = !self.0.swap(true, Ordering::SeqCst);
        Box::pin(async move {
            if first {
                panic!("first connection is cursed");
            }
            common::echo(conn).await;
        })
    }
}

#[tokio::test]
async fn test_handler_panic_is_isolated() {
    let server = Arc::new(Server::default());
    let (addr, task) =
        common::start_server(Arc::clone(&server), PanicFirst(AtomicBool::new(false))).await;

    // The cursed connection is hung up on rather than answered.
    let first = common::exchange(&Client::default(), &addr, b"ping").await.unwrap();
    assert!(first.is_err());

    let second = common::exchange(&Client::default(), &addr, b"ping")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, b"ping");
    assert!(!task.is_finished());
    server.close();
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let idle = Duration::from_millis(150);
    let server = Arc::new(Server::new(Config::default().with_idle_timeout(idle)));
    let (addr, _task) = common::start_server(Arc::clone(&server), handler_fn(common::echo)).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    Client::default()
        .connect_fn(&addr, move |conn| {
            let tx = tx.clone();
            Box::pin(async move {
                tokio::time::sleep(idle * 3).await;
                // The server's echo read timed out and it hung up.
                let _ = tx.send(common::round_trip(conn, b"late").await);
            })
        })
        .await
        .unwrap();
    assert!(rx.recv().await.unwrap().is_err());
    server.close();
}

#[tokio::test]
async fn test_activity_extends_idle_deadline() {
    let idle = Duration::from_millis(200);
    let server = Arc::new(Server::new(Config::default().with_idle_timeout(idle)));
    let (addr, _task) = common::start_server(Arc::clone(&server), handler_fn(common::echo)).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    Client::default()
        .connect_fn(&addr, move |conn| {
            let tx = tx.clone();
            Box::pin(async move {
                // Total time well past one idle period, but no gap reaches it.
                for _ in 0..4 {
                    tokio::time::sleep(idle / 2).await;
                    if let Err(e) = common::round_trip(conn, b"tick").await {
                        let _ = tx.send(Err(e));
                        return;
                    }
                }
                let _ = tx.send(Ok(()));
            })
        })
        .await
        .unwrap();
    rx.recv().await.unwrap().unwrap();
    server.close();
}

#[tokio::test]
async fn test_tls_echo() {
    let config = common::tls_config();
    let server = Arc::new(Server::new(config.clone()));
    let (addr, _task) = common::start_server(Arc::clone(&server), handler_fn(common::echo)).await;

    let client = Client::new(config);
    let reply = common::exchange(&client, &addr, b"secret handshake")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, b"secret handshake");
    server.close();
}

#[tokio::test]
async fn test_failed_handshake_does_not_stop_server() {
    let config = common::tls_config();
    let server = Arc::new(Server::new(config.clone()));
    let (addr, task) = common::start_server(Arc::clone(&server), handler_fn(common::echo)).await;

    // A plaintext client speaks garbage to the TLS server.
    let plain = common::exchange(&Client::default(), &addr, b"not a client hello")
        .await
        .unwrap();
    assert!(plain.is_err());
    assert!(!task.is_finished());

    let client = Client::new(config);
    let reply = common::exchange(&client, &addr, b"after").await.unwrap().unwrap();
    assert_eq!(reply, b"after");
    server.close();
}

#[tokio::test]
async fn test_untrusted_certificate_fails_dial() {
    let server = Arc::new(Server::new(common::tls_config()));
    let (addr, _task) = common::start_server(Arc::clone(&server), handler_fn(common::echo)).await;

    // Fresh settings trust a different self-signed certificate.
    let client = Client::new(common::tls_config());
    let err = client
        .connect_fn(&addr, common::echo)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TlsHandshake(_)), "got {err:?}");
    server.close();
}

#[tokio::test]
async fn test_close_stops_all_loops() {
    let server = Arc::new(Server::default());
    let (_, first) = common::start_server(Arc::clone(&server), handler_fn(common::echo)).await;
    let (_, second) = common::start_server(Arc::clone(&server), handler_fn(common::echo)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    server.close();
    server.close();
    for task in [first, second] {
        let err = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert!(err.is_listener_closed());
    }
}

#[tokio::test]
async fn test_listen_and_serve_returns_after_close() {
    let server = Arc::new(Server::default());
    let loop_server = Arc::clone(&server);
    let task = tokio::spawn(async move {
        loop_server
            .listen_and_serve_fn("127.0.0.1:0", common::echo)
            .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    server.close();
    let err = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, Error::ListenerClosed));
}

#[tokio::test]
async fn test_server_can_serve_again_after_close() {
    let server = Arc::new(Server::default());
    let (_, first) = common::start_server(Arc::clone(&server), handler_fn(common::echo)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    server.close();
    assert!(first.await.unwrap().unwrap_err().is_listener_closed());

    let (addr, _task) = common::start_server(Arc::clone(&server), handler_fn(common::echo)).await;
    let reply = common::exchange(&Client::default(), &addr, b"again")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, b"again");
    server.close();
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap().to_string();

    let err = Server::default()
        .listen_and_serve_fn(&addr, common::echo)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Bind { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_in_flight_connection_drains_after_close() {
    let server = Arc::new(Server::default());
    let (addr, task) = common::start_server(Arc::clone(&server), handler_fn(common::echo)).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let close_server = Arc::clone(&server);
    Client::default()
        .connect_fn(&addr, move |conn| {
            let tx = tx.clone();
            let server = Arc::clone(&close_server);
            Box::pin(async move {
                let before = common::round_trip(conn, b"before").await;
                server.close();
                tokio::time::sleep(Duration::from_millis(20)).await;
                let after = common::round_trip(conn, b"after").await;
                let _ = tx.send((before, after));
            })
        })
        .await
        .unwrap();

    let (before, after) = rx.recv().await.unwrap();
    assert_eq!(before.unwrap(), b"before");
    assert_eq!(after.unwrap(), b"after");
    assert!(task.await.unwrap().unwrap_err().is_listener_closed());

    // The server side finishes once the client hangs up.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while server.active_connections() > 0 {
        assert!(tokio::time::Instant::now() < deadline, "connection never drained");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_serve_uses_listener_streams_as_is() {
    // TLS settings are present, but `serve` leaves termination to the listener.
    let server = Arc::new(Server::new(common::tls_config()));
    let listener = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let loop_server = Arc::clone(&server);
    let _task =
        tokio::spawn(async move { loop_server.serve(listener, handler_fn(common::echo)).await });

    let reply = common::exchange(&Client::default(), &addr, b"plain")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply, b"plain");
    server.close();
}
