//! Connection metrics.
//!
//! # Metrics
//! - `socketkit_connections_accepted_total` (counter)
//! - `socketkit_active_connections` (gauge)
//! - `socketkit_handler_panics_total` (counter)
//! - `socketkit_accept_retries_total` (counter): transient accept failures
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding application installs a recorder.

use ::metrics::{counter, gauge};

pub fn record_connection_opened() {
    counter!("socketkit_connections_accepted_total").increment(1);
    gauge!("socketkit_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    gauge!("socketkit_active_connections").decrement(1.0);
}

pub fn record_handler_panic() {
    counter!("socketkit_handler_panics_total").increment(1);
}

pub fn record_accept_retry() {
    counter!("socketkit_accept_retries_total").increment(1);
}
