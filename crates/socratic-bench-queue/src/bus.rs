// crates/socratic-bench-queue/src/bus.rs
// ============================================================================
// Module: In-Process Signal Bus
// Description: Broadcast bus for run-judged signals.
// Purpose: Fan signals out to subscriber queues with at-least-once delivery.
// Dependencies: socratic-bench-core
// ============================================================================

//! ## Overview
//! The bus copies every emitted signal into each subscriber's queue, so a
//! signal reaches every consumer at least once and duplicate emissions from
//! concurrent judges simply become duplicate deliveries. Subscribers are
//! ordinary job queues with the same visibility and dead-letter semantics
//! as the rest of the pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use socratic_bench_core::JobQueue;
use socratic_bench_core::RunJudgedSignal;
use socratic_bench_core::SignalBus;
use socratic_bench_core::SignalError;

use crate::queue::MemoryJobQueue;
use crate::queue::QueueConfig;

// ============================================================================
// SECTION: Bus
// ============================================================================

/// In-process broadcast [`SignalBus`].
///
/// # Invariants
/// - Emission succeeds when at least one subscriber accepted the signal (or
///   when there are no subscribers yet).
pub struct MemorySignalBus {
    /// Queue configuration applied to new subscriber queues.
    config: QueueConfig,
    /// Subscriber queues.
    subscribers: Mutex<Vec<Arc<MemoryJobQueue<RunJudgedSignal>>>>,
}

impl MemorySignalBus {
    /// Creates a bus whose subscribers use the given queue configuration.
    #[must_use]
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new subscriber and returns its delivery queue.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] when the subscriber list is unavailable.
    pub fn subscribe(&self) -> Result<Arc<MemoryJobQueue<RunJudgedSignal>>, SignalError> {
        let queue = Arc::new(MemoryJobQueue::new(self.config));
        self.subscribers
            .lock()
            .map_err(|_poisoned| SignalError::Bus("subscriber mutex poisoned".to_string()))?
            .push(Arc::clone(&queue));
        Ok(queue)
    }
}

impl SignalBus for MemorySignalBus {
    fn emit(&self, signal: &RunJudgedSignal) -> Result<(), SignalError> {
        let subscribers = self
            .subscribers
            .lock()
            .map_err(|_poisoned| SignalError::Bus("subscriber mutex poisoned".to_string()))?
            .clone();
        if subscribers.is_empty() {
            return Ok(());
        }
        let mut delivered = 0usize;
        let mut last_error = None;
        for subscriber in &subscribers {
            match subscriber.enqueue(signal) {
                Ok(()) => delivered += 1,
                Err(err) => last_error = Some(err),
            }
        }
        if delivered == 0
            && let Some(err) = last_error
        {
            return Err(SignalError::Bus(err.to_string()));
        }
        Ok(())
    }
}
