//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! accept loop, connection tasks, client dials
//!     → tracing events (structured fields: connection_id, peer_addr, error)
//!     → metrics.rs (counters, gauges)
//! ```
//!
//! # Design Decisions
//! - Library code only emits; the embedding binary decides where it goes
//! - `logging::init` is a convenience for binaries, demos and tests

pub mod logging;
pub mod metrics;
