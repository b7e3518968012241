// crates/socratic-bench-core/src/core/time.rs
// ============================================================================
// Module: Socratic Bench Time Model
// Description: Canonical timestamps, clock boundary, and ISO-week periods.
// Purpose: Provide deterministic, replayable time values across pipeline records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! All persisted records carry explicit UTC timestamps with millisecond
//! precision. The pipeline components never read wall-clock time directly;
//! hosts supply a [`Clock`] implementation at the worker boundary so replay
//! and tests stay deterministic. Period keys for weekly roll-ups are derived
//! from timestamps using the ISO 8601 week calendar.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::PeriodKey;

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Canonical UTC timestamp with millisecond precision.
///
/// # Invariants
/// - Values are explicitly provided by callers; core logic never reads wall-clock time.
/// - Serializes as a plain integer of unix epoch milliseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the ISO 8601 week period key (`YYYY-Www`) containing this timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::OutOfRange`] when the timestamp cannot be
    /// represented as a calendar date.
    pub fn period_key(self) -> Result<PeriodKey, TimeError> {
        let nanos = i128::from(self.0) * 1_000_000;
        let datetime = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|err| TimeError::OutOfRange(err.to_string()))?;
        let (year, week, _) = datetime.to_iso_week_date();
        Ok(PeriodKey::new(format!("{year:04}-W{week:02}")))
    }
}

/// Time conversion errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, thiserror::Error)]
pub enum TimeError {
    /// Timestamp cannot be represented as a calendar date.
    #[error("timestamp out of calendar range: {0}")]
    OutOfRange(String),
}

// ============================================================================
// SECTION: Clock Boundary
// ============================================================================

/// Wall-clock boundary supplied by hosts.
///
/// Implementations must be cheap to call; workers read the clock once per
/// persisted record.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// System wall-clock backed by [`SystemTime`].
///
/// # Invariants
/// - Times before the unix epoch clamp to zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
        Timestamp::from_unix_millis(millis)
    }
}

/// Manually advanced clock for deterministic tests and replay.
///
/// # Invariants
/// - `now` returns the last value passed to `set` (or the initial value).
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current time in unix epoch milliseconds.
    millis: AtomicI64,
}

impl ManualClock {
    /// Creates a manual clock starting at the provided timestamp.
    #[must_use]
    pub fn starting_at(timestamp: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(timestamp.as_unix_millis()),
        }
    }

    /// Sets the current time.
    pub fn set(&self, timestamp: Timestamp) {
        self.millis.store(timestamp.as_unix_millis(), Ordering::SeqCst);
    }

    /// Advances the current time by the provided number of milliseconds.
    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.millis.load(Ordering::SeqCst))
    }
}
