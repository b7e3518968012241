// crates/socratic-bench-core/src/runtime/retry.rs
// ============================================================================
// Module: Retry Policy
// Description: Exponential backoff with jitter for transient failure classes.
// Purpose: Bound in-handler retries before falling back to queue redelivery.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! Transient failure classes (timeouts, throttles, 5xx-equivalents) retry
//! in-handler with exponential backoff and jitter, up to a capped attempt
//! count. After the cap the error propagates, the handler fails, and the
//! queue's visibility timeout becomes the outer retry loop. Deterministic
//! semantic failures must not pass through this path; they are persisted
//! with error markers instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;

use rand::Rng;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Retry policy for transient failures.
///
/// # Invariants
/// - `max_attempts >= 1`; the first attempt is not a retry.
/// - `jitter` is a fraction in `[0, 1]` applied to each computed delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum total attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Jitter fraction in `[0, 1]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Returns a policy that never retries (single attempt).
    #[must_use]
    pub const fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Computes the backoff delay before retry number `retry` (1-based),
    /// applying exponential growth, the cap, and jitter.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let scaled = self.base_delay.saturating_mul(1_u32 << exponent);
        let capped = scaled.min(self.max_delay);
        if self.jitter <= 0.0 || capped.is_zero() {
            return capped;
        }
        let spread = capped.mul_f64(self.jitter.min(1.0));
        let jittered = rand::thread_rng().gen_range(0.0..=1.0);
        capped.saturating_sub(spread.mul_f64(jittered))
    }
}

// ============================================================================
// SECTION: Retry Loop
// ============================================================================

/// Runs an operation with in-handler retries for transient failures.
///
/// `operation` receives the 1-based attempt number. `is_transient` decides
/// whether a failure is worth retrying; permanent failures propagate
/// immediately. The provided `sleep` makes the loop testable without real
/// delays.
///
/// # Errors
///
/// Returns the last error once attempts are exhausted or the failure is
/// classified permanent.
pub fn with_retries<T, E>(
    policy: &RetryPolicy,
    is_transient: impl Fn(&E) -> bool,
    sleep: impl Fn(Duration),
    mut operation: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts && is_transient(&err) => {
                sleep(policy.delay_for_retry(attempt));
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Thread-blocking sleep for production workers.
pub fn blocking_sleep(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
