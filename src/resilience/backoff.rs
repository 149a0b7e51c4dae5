//! Capped exponential backoff for transient accept failures.

use std::io;
use std::time::Duration;

/// First retry delay after a transient accept error.
pub const MIN_ACCEPT_DELAY: Duration = Duration::from_millis(5);

/// Upper bound on the retry delay.
pub const MAX_ACCEPT_DELAY: Duration = Duration::from_secs(1);

/// Calculate the delay for the `attempt`-th consecutive failure (1-based):
/// `base * 2^(attempt-1)`, capped at `max`. Attempt 0 means no delay.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let factor = 2u32.saturating_pow(attempt - 1);
    base.saturating_mul(factor).min(max)
}

/// Accept-loop retry state: 5ms, doubling, capped at 1s, reset on success.
#[derive(Debug, Clone, Default)]
pub struct AcceptBackoff {
    failures: u32,
}

impl AcceptBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transient failure and return how long to sleep.
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        calculate_backoff(self.failures, MIN_ACCEPT_DELAY, MAX_ACCEPT_DELAY)
    }

    /// Record a successful accept.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive transient failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

/// Whether an accept error is temporary resource pressure worth retrying.
pub fn is_transient_accept_error(err: &io::Error) -> bool {
    use io::ErrorKind;

    if matches!(
        err.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::OutOfMemory
    ) {
        return true;
    }

    // EMFILE, ENFILE, ENOMEM and ENOBUFS: out of descriptors or buffers.
    #[cfg(unix)]
    {
        const ENOMEM: i32 = 12;
        const ENFILE: i32 = 23;
        const EMFILE: i32 = 24;
        #[cfg(any(target_os = "linux", target_os = "android"))]
        const ENOBUFS: i32 = 105;
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        const ENOBUFS: i32 = 55;

        if let Some(code) = err.raw_os_error() {
            return matches!(code, ENOMEM | ENFILE | EMFILE | ENOBUFS);
        }
    }

    false
}
