//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, keepalive)
//!     → deadline.rs (absolute read/write deadline)
//!     → tls.rs (optional TLS handshake)
//!     → connection.rs (cipher, idle deadline, tracking)
//!     → Hand off to the handler
//!
//! Connection States:
//!     Accepting → Handshaking → Active → Closed
//! ```
//!
//! # Design Decisions
//! - The deadline sits below TLS so handshakes are bounded by it too
//! - Each connection tracked for graceful shutdown
//! - TLS is optional and handled transparently

pub mod connection;
pub mod deadline;
pub mod listener;
pub mod tls;

pub use connection::{Connection, ConnectionId};
pub use deadline::{DeadlineStream, Transport};
pub use listener::{Listener, TcpAcceptor};
pub use tls::TlsSettings;
