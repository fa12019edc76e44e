// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded worker pool with cancellable execution handles.
//!
//! Analysis jobs run on a fixed set of OS threads, fed through a
//! fixed-capacity queue. When the queue is full, submission fails
//! immediately instead of letting accepted work grow unbounded; callers
//! surface that as an overloaded response. Each submission yields an
//! [`ExecutionHandle`] tied to exactly one request: it can be awaited with a
//! deadline, cancelled cooperatively, and is never reused.

use std::sync::mpsc::{SyncSender, TrySendError, sync_channel};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::engine::{AnalysisEngine, EngineError, InterruptFlag};
use crate::filter::RuleFilter;
use crate::result::ResultMap;

/// Worker pool sizing.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Capacity of the admission queue (jobs accepted but not yet running).
    pub queue_capacity: usize,
}

impl PoolConfig {
    /// Size the pool from available CPU parallelism.
    ///
    /// Falls back to a single worker when parallelism is unavailable or
    /// explicitly forced, which keeps constrained environments and
    /// deterministic tests on one thread.
    pub fn detect(force_single_threaded: bool, queue_capacity: usize) -> Self {
        let cpus = num_cpus::get();
        let workers = if force_single_threaded || cpus < 2 {
            1
        } else {
            cpus
        };
        Self {
            workers,
            queue_capacity,
        }
    }
}

/// Submission failure.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The admission queue is full; the caller should shed the request.
    #[error("analysis queue is full")]
    Overloaded,
    /// The pool has shut down.
    #[error("analysis pool is shut down")]
    Shutdown,
}

/// Outcome of awaiting an execution handle.
#[derive(Debug)]
pub enum WaitOutcome {
    /// Analysis finished; the full result map, one entry per known check.
    Completed(ResultMap),
    /// The deadline elapsed before the worker finished.
    TimedOut,
    /// The worker failed or was interrupted without completing.
    Failed(EngineError),
}

struct Job {
    recording: Vec<u8>,
    filter: RuleFilter,
    interrupt: InterruptFlag,
    result_tx: oneshot::Sender<Result<ResultMap, EngineError>>,
}

/// A handle to one in-flight analysis job.
///
/// Dropping the handle cancels the job, which bridges client disconnects
/// (the request future is dropped) into cooperative interruption without any
/// explicit callback wiring.
pub struct ExecutionHandle {
    result_rx: oneshot::Receiver<Result<ResultMap, EngineError>>,
    interrupt: InterruptFlag,
}

impl ExecutionHandle {
    /// Block (suspend) up to `remaining` for the job to finish.
    ///
    /// On [`WaitOutcome::TimedOut`] the job is still running; the caller
    /// must [`cancel`](Self::cancel) and must not wait for the worker to
    /// actually stop — interruption is observed only between checks, so the
    /// worker may overrun by up to one in-flight check.
    pub async fn wait(&mut self, remaining: Duration) -> WaitOutcome {
        eprintln!("DEBUG wait: remaining={remaining:?}");
        tokio::time::sleep(Duration::from_millis(10)).await;
        eprintln!("DEBUG wait: slept 10ms ok");
        let out = tokio::time::timeout(remaining, &mut self.result_rx).await;
        eprintln!("DEBUG wait: timeout returned, is_err(timed out)={}", out.is_err());
        match out {
            Ok(Ok(Ok(map))) => WaitOutcome::Completed(map),
            Ok(Ok(Err(e))) => WaitOutcome::Failed(e),
            Ok(Err(_)) => WaitOutcome::Failed(EngineError::Failed(
                "analysis worker terminated unexpectedly".to_string(),
            )),
            Err(_) => WaitOutcome::TimedOut,
        }
    }

    /// Request cooperative cancellation. Idempotent; may be called from
    /// timeout handling and a disconnect path without coordination.
    pub fn cancel(&self) {
        self.interrupt.interrupt();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.interrupt.is_interrupted()
    }
}

impl Drop for ExecutionHandle {
    fn drop(&mut self) {
        // Cancellation after completion is a no-op for the worker.
        self.interrupt.interrupt();
    }
}

/// Shared worker pool executing analysis jobs.
pub struct AnalysisPool {
    tx: Option<SyncSender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl AnalysisPool {
    /// Spawn the worker threads and the bounded admission queue.
    pub fn new(engine: Arc<dyn AnalysisEngine>, config: PoolConfig) -> Self {
        let (tx, rx) = sync_channel::<Job>(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let rx = Arc::clone(&rx);
            let engine = Arc::clone(&engine);
            let handle = thread::Builder::new()
                .name(format!("analysis-{worker_id}"))
                .spawn(move || worker_loop(worker_id, rx, engine))
                .unwrap_or_else(|e| panic!("failed to spawn analysis worker: {e}"));
            workers.push(handle);
        }

        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Analysis pool started"
        );

        Self {
            tx: Some(tx),
            workers,
        }
    }

    /// Submit a recording for analysis.
    ///
    /// Fails fast with [`SubmitError::Overloaded`] when the admission queue
    /// is full; accepted jobs yield a fresh [`ExecutionHandle`].
    pub fn submit(
        &self,
        recording: Vec<u8>,
        filter: RuleFilter,
    ) -> Result<ExecutionHandle, SubmitError> {
        let tx = self.tx.as_ref().ok_or(SubmitError::Shutdown)?;
        let interrupt = InterruptFlag::new();
        let (result_tx, result_rx) = oneshot::channel();
        let job = Job {
            recording,
            filter,
            interrupt: interrupt.clone(),
            result_tx,
        };
        match tx.try_send(job) {
            Ok(()) => Ok(ExecutionHandle {
                result_rx,
                interrupt,
            }),
            Err(TrySendError::Full(_)) => {
                warn!("Analysis queue full, rejecting submission");
                Err(SubmitError::Overloaded)
            }
            Err(TrySendError::Disconnected(_)) => Err(SubmitError::Shutdown),
        }
    }
}

impl Drop for AnalysisPool {
    fn drop(&mut self) {
        // Closing the queue lets idle workers exit; busy workers finish (or
        // observe interruption from dropped handles) before joining.
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<std::sync::mpsc::Receiver<Job>>>,
    engine: Arc<dyn AnalysisEngine>,
) {
    loop {
        let job = {
            let Ok(guard) = rx.lock() else {
                break;
            };
            guard.recv()
        };
        let Ok(job) = job else {
            break;
        };
        // A job cancelled while still queued never touches the engine.
        if job.interrupt.is_interrupted() {
            let _ = job.result_tx.send(Err(EngineError::Interrupted));
            continue;
        }
        debug!(worker_id, bytes = job.recording.len(), "Analysis job started");
        let result = engine.evaluate(&job.recording, &job.filter, &job.interrupt);
        // The receiver may be gone (timeout or disconnect); that is not an error.
        let _ = job.result_tx.send(result);
    }
    debug!(worker_id, "Analysis worker stopped");
}
