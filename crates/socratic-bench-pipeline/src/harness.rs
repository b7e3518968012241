// crates/socratic-bench-pipeline/src/harness.rs
// ============================================================================
// Module: Worker Harness
// Description: Thread pools driving queue consumers with bounded concurrency.
// Purpose: Enforce per-component concurrency caps and ack discipline.
// Dependencies: socratic-bench-core
// ============================================================================

//! ## Overview
//! Each pipeline component runs as a pool of OS threads with an enforced
//! concurrency cap. Every thread executes a straight-line receive, handle,
//! acknowledge loop: a successful handler acknowledges the delivery, a
//! failed handler leaves it in flight so the queue's visibility timeout
//! redelivers it. The pool never retries in place; redelivery and
//! dead-letter diversion belong to the queue substrate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use socratic_bench_core::Delivery;
use socratic_bench_core::JobQueue;
use socratic_bench_core::QueueError;
use socratic_bench_core::telemetry::Component;
use socratic_bench_core::telemetry::HandlerOutcome;
use socratic_bench_core::telemetry::MetricsRecorder;

// ============================================================================
// SECTION: Handler Contract
// ============================================================================

/// Failure reported by a job handler.
///
/// # Invariants
/// - `transient` selects the telemetry category only; either way the
///   delivery is left unacknowledged for the queue to redeliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Human-readable failure description.
    pub message: String,
    /// Whether the failure class is transient.
    pub transient: bool,
}

impl HandlerFailure {
    /// Creates a transient failure.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    /// Creates a permanent failure.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

/// One component's message handler.
pub trait JobHandler<T>: Send + Sync {
    /// Returns the component label for telemetry.
    fn component(&self) -> Component;

    /// Handles one delivery.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerFailure`] when the delivery must redeliver.
    fn handle(&self, delivery: &Delivery<T>) -> Result<(), HandlerFailure>;
}

// ============================================================================
// SECTION: Pool Configuration
// ============================================================================

/// Worker pool tuning knobs.
///
/// # Invariants
/// - `concurrency >= 1`.
/// - `max_receives` mirrors the consumed queue's configuration so the pool
///   can attribute dead-letter diversions in telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Pool name used for thread names.
    pub name: String,
    /// Number of worker threads.
    pub concurrency: usize,
    /// Receive wait per poll.
    pub poll_wait: Duration,
    /// The consumed queue's delivery limit.
    pub max_receives: u32,
}

impl WorkerPoolConfig {
    /// Creates a pool configuration with the standard poll wait.
    #[must_use]
    pub fn new(name: impl Into<String>, concurrency: usize, max_receives: u32) -> Self {
        Self {
            name: name.into(),
            concurrency: concurrency.max(1),
            poll_wait: Duration::from_millis(500),
            max_receives,
        }
    }
}

// ============================================================================
// SECTION: Worker Pool
// ============================================================================

/// A pool of worker threads consuming one queue.
///
/// # Invariants
/// - Threads stop at the next poll boundary after shutdown is requested.
pub struct WorkerPool {
    /// Shutdown flag shared with the worker threads.
    shutdown: Arc<AtomicBool>,
    /// Worker thread handles.
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns a pool consuming `queue` with `handler`.
    pub fn spawn<T>(
        config: WorkerPoolConfig,
        queue: Arc<dyn JobQueue<T>>,
        handler: Arc<dyn JobHandler<T>>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(config.concurrency);
        for worker_index in 0..config.concurrency {
            let worker = Worker {
                shutdown: Arc::clone(&shutdown),
                queue: Arc::clone(&queue),
                handler: Arc::clone(&handler),
                metrics: Arc::clone(&metrics),
                poll_wait: config.poll_wait,
                max_receives: config.max_receives,
            };
            let thread_name = format!("{}-{worker_index}", config.name);
            let builder = thread::Builder::new().name(thread_name);
            if let Ok(handle) = builder.spawn(move || worker.run()) {
                handles.push(handle);
            }
        }
        Self {
            shutdown,
            handles,
        }
    }

    /// Requests shutdown and joins all worker threads.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

/// One worker thread's state.
struct Worker<T> {
    /// Shutdown flag.
    shutdown: Arc<AtomicBool>,
    /// Consumed queue.
    queue: Arc<dyn JobQueue<T>>,
    /// Message handler.
    handler: Arc<dyn JobHandler<T>>,
    /// Metrics recorder.
    metrics: Arc<dyn MetricsRecorder>,
    /// Receive wait per poll.
    poll_wait: Duration,
    /// The consumed queue's delivery limit.
    max_receives: u32,
}

impl<T> Worker<T> {
    /// Straight-line receive, handle, acknowledge loop.
    fn run(&self) {
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.queue.receive(self.poll_wait) {
                Ok(Some(delivery)) => self.dispatch(&delivery),
                Ok(None) => {}
                Err(QueueError::Closed) => break,
                Err(_err) => thread::sleep(self.poll_wait),
            }
        }
    }

    /// Handles one delivery and applies the ack discipline.
    fn dispatch(&self, delivery: &Delivery<T>) {
        let component = self.handler.component();
        let started = Instant::now();
        match self.handler.handle(delivery) {
            Ok(()) => {
                let _ = self.queue.ack(delivery.receipt);
                self.metrics.record_handler(component, HandlerOutcome::Ok, started.elapsed());
            }
            Err(failure) => {
                let outcome = if failure.transient {
                    HandlerOutcome::TransientFailure
                } else {
                    HandlerOutcome::PermanentFailure
                };
                self.metrics.record_handler(component, outcome, started.elapsed());
                if delivery.receive_count >= self.max_receives {
                    self.metrics.record_dead_letter(component);
                }
            }
        }
    }
}
