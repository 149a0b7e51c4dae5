//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! listener.accept() error
//!     → backoff.rs (transient? sleep 5ms..1s and retry : end the loop)
//! ```
//!
//! # Design Decisions
//! - Only resource-pressure errors are retried; anything else is permanent
//! - Deterministic delays (no jitter): one loop per listener, no herd

pub mod backoff;

pub use backoff::{is_transient_accept_error, AcceptBackoff};
