//! Duplex TCP/TLS sockets with idle deadlines and stream-cipher layering.
//!
//! # Architecture Overview
//!
//! ```text
//!     Server::listen_and_serve / Client::connect
//!         │
//!         ▼
//!   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌────────────┐
//!   │ listener │──▶│ deadline │──▶│   tls    │──▶│   cipher   │──▶ Handler
//!   │ / dialer │   │  stream  │   │(optional)│   │ (optional) │
//!   └──────────┘   └──────────┘   └──────────┘   └────────────┘
//!
//!   Cross-cutting: config, lifecycle (shutdown scopes),
//!                  resilience (accept backoff), observability
//! ```
//!
//! A [`Handler`] sees a [`Connection`]: a plain `AsyncRead + AsyncWrite`
//! whose idle deadline is pushed forward after every successful read or
//! write.
//!
//! ```no_run
//! use socketkit::{handler_fn, Config, Server};
//! use std::time::Duration;
//!
//! # async fn run() -> socketkit::Result<()> {
//! let server = Server::new(Config::default().with_idle_timeout(Duration::from_secs(30)));
//! let echo = handler_fn(|conn| {
//!     Box::pin(async move {
//!         let (mut r, mut w) = tokio::io::split(conn);
//!         let _ = tokio::io::copy(&mut r, &mut w).await;
//!     })
//! });
//! let err = server.listen_and_serve(":7000", echo).await.unwrap_err();
//! assert!(err.is_listener_closed());
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod server;

pub use cipher::{AesPool, CipherPool};
pub use client::Client;
pub use config::Config;
pub use error::{Error, Result};
pub use handler::{handler_fn, Handler, HandlerFn};
pub use lifecycle::Shutdown;
pub use net::connection::Connection;
pub use net::tls::TlsSettings;
pub use server::Server;
