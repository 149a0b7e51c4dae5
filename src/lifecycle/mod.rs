//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Server::listen_and_serve / serve
//!     → lazily creates one Shutdown scope (child of an optional parent)
//!     → every accept loop subscribes to it
//!
//! Server::close
//!     → triggers the scope → each loop stops accepting → drain
//! ```
//!
//! # Design Decisions
//! - Stop accepting, never abort: in-flight connections run to completion
//! - One scope per server generation; closing forgets it so the server can
//!   be started again

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};
