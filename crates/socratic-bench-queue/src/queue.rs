// crates/socratic-bench-queue/src/queue.rs
// ============================================================================
// Module: In-Process Job Queue
// Description: FIFO queue with visibility timeout and dead-letter diversion.
// Purpose: Give workers at-least-once delivery with bounded redelivery.
// Dependencies: serde, serde_json, socratic-bench-core
// ============================================================================

//! ## Overview
//! A received message stays invisible until it is acknowledged or its
//! visibility timeout expires; expiry returns it to the front-of-line in
//! arrival order. Each delivery increments the receive count, and a message
//! whose count would exceed the configured maximum diverts to the
//! dead-letter sink instead of redelivering. The visibility timeout is the
//! primary safety net for worker crashes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use socratic_bench_core::Delivery;
use socratic_bench_core::JobQueue;
use socratic_bench_core::QueueError;
use socratic_bench_core::ReceiptHandle;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Queue tuning knobs.
///
/// # Invariants
/// - `visibility_timeout` must exceed the expected handler duration.
/// - `max_receives >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// How long a received message stays invisible before redelivery.
    pub visibility_timeout: Duration,
    /// Maximum deliveries before dead-letter diversion.
    pub max_receives: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            max_receives: 5,
        }
    }
}

// ============================================================================
// SECTION: Internal State
// ============================================================================

/// One stored message with its wire body.
#[derive(Debug, Clone)]
struct Message {
    /// JSON-encoded payload.
    body: Vec<u8>,
    /// Deliveries so far.
    receive_count: u32,
}

/// An in-flight delivery awaiting acknowledgement.
#[derive(Debug, Clone)]
struct InFlight {
    /// The delivered message.
    message: Message,
    /// Instant at which the message becomes visible again.
    visible_at: Instant,
}

/// Mutable queue state behind the mutex.
#[derive(Debug, Default)]
struct Inner {
    /// Messages awaiting delivery, in arrival order.
    ready: VecDeque<Message>,
    /// In-flight deliveries keyed by receipt.
    inflight: BTreeMap<u64, InFlight>,
    /// Dead-letter sink.
    dead: Vec<Message>,
    /// Next receipt value; receipts are unique per delivery, so a stale
    /// receipt can never acknowledge a redelivered copy.
    next_receipt: u64,
}

// ============================================================================
// SECTION: Queue
// ============================================================================

/// In-process [`JobQueue`] with visibility-timeout semantics.
///
/// # Invariants
/// - Payloads cross the queue as JSON; a payload that cannot be decoded on
///   receive diverts to the dead-letter sink.
pub struct MemoryJobQueue<T> {
    /// Tuning knobs.
    config: QueueConfig,
    /// Queue state.
    state: Mutex<Inner>,
    /// Signaled when a message becomes available.
    available: Condvar,
    /// Payload type marker.
    _payload: PhantomData<fn(T) -> T>,
}

impl<T> MemoryJobQueue<T> {
    /// Creates an empty queue with the given configuration.
    #[must_use]
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(Inner::default()),
            available: Condvar::new(),
            _payload: PhantomData,
        }
    }

    /// Locks the queue state.
    fn lock(&self) -> Result<MutexGuard<'_, Inner>, QueueError> {
        self.state.lock().map_err(|_poisoned| QueueError::Queue("mutex poisoned".to_string()))
    }

    /// Returns expired in-flight messages to the ready queue or the
    /// dead-letter sink.
    fn reclaim_expired(&self, inner: &mut Inner, now: Instant) {
        let expired: Vec<u64> = inner
            .inflight
            .iter()
            .filter(|(_receipt, entry)| entry.visible_at <= now)
            .map(|(receipt, _entry)| *receipt)
            .collect();
        for receipt in expired {
            if let Some(entry) = inner.inflight.remove(&receipt) {
                if entry.message.receive_count >= self.config.max_receives {
                    inner.dead.push(entry.message);
                } else {
                    inner.ready.push_back(entry.message);
                }
            }
        }
    }

    /// Earliest instant at which an in-flight message expires.
    fn next_expiry(inner: &Inner) -> Option<Instant> {
        inner.inflight.values().map(|entry| entry.visible_at).min()
    }
}

impl<T> JobQueue<T> for MemoryJobQueue<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn enqueue(&self, payload: &T) -> Result<(), QueueError> {
        let body = serde_json::to_vec(payload)
            .map_err(|err| QueueError::Serialization(err.to_string()))?;
        let mut inner = self.lock()?;
        inner.ready.push_back(Message {
            body,
            receive_count: 0,
        });
        drop(inner);
        self.available.notify_one();
        Ok(())
    }

    fn receive(&self, max_wait: Duration) -> Result<Option<Delivery<T>>, QueueError> {
        let deadline = Instant::now() + max_wait;
        let mut inner = self.lock()?;
        loop {
            let now = Instant::now();
            self.reclaim_expired(&mut inner, now);

            if let Some(mut message) = inner.ready.pop_front() {
                message.receive_count += 1;
                let payload: T = match serde_json::from_slice(&message.body) {
                    Ok(payload) => payload,
                    Err(err) => {
                        inner.dead.push(message);
                        return Err(QueueError::Serialization(err.to_string()));
                    }
                };
                let receipt_value = inner.next_receipt;
                inner.next_receipt += 1;
                let receipt = ReceiptHandle::new(receipt_value);
                let receive_count = message.receive_count;
                inner.inflight.insert(
                    receipt_value,
                    InFlight {
                        message,
                        visible_at: now + self.config.visibility_timeout,
                    },
                );
                return Ok(Some(Delivery {
                    payload,
                    receipt,
                    receive_count,
                }));
            }

            if now >= deadline {
                return Ok(None);
            }
            let wait_until = Self::next_expiry(&inner).map_or(deadline, |expiry| expiry.min(deadline));
            let wait = wait_until.saturating_duration_since(now);
            let (guard, _timeout) = self
                .available
                .wait_timeout(inner, wait.max(Duration::from_millis(1)))
                .map_err(|_poisoned| QueueError::Queue("mutex poisoned".to_string()))?;
            inner = guard;
        }
    }

    fn ack(&self, receipt: ReceiptHandle) -> Result<(), QueueError> {
        let mut inner = self.lock()?;
        if inner.inflight.remove(&receipt.get()).is_none() {
            return Err(QueueError::Queue(format!(
                "unknown or expired receipt {}",
                receipt.get()
            )));
        }
        Ok(())
    }

    fn depth(&self) -> Result<u64, QueueError> {
        let inner = self.lock()?;
        Ok(u64::try_from(inner.ready.len()).unwrap_or(u64::MAX))
    }

    fn dead_letter_depth(&self) -> Result<u64, QueueError> {
        let inner = self.lock()?;
        Ok(u64::try_from(inner.dead.len()).unwrap_or(u64::MAX))
    }

    fn drain_dead_letters(&self) -> Result<Vec<T>, QueueError> {
        let mut inner = self.lock()?;
        let dead = std::mem::take(&mut inner.dead);
        drop(inner);
        let mut payloads = Vec::with_capacity(dead.len());
        for message in dead {
            let payload = serde_json::from_slice(&message.body)
                .map_err(|err| QueueError::Serialization(err.to_string()))?;
            payloads.push(payload);
        }
        Ok(payloads)
    }
}
