// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution pool behavior: completion, deadline, cancellation, backpressure.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flightscope_analysis::engine::{AnalysisEngine, EngineError, InterruptFlag};
use flightscope_analysis::filter::RuleFilter;
use flightscope_analysis::pool::{AnalysisPool, PoolConfig, SubmitError, WaitOutcome};
use flightscope_analysis::result::{Evaluation, ResultMap, RuleEvaluation};

fn single_entry_map() -> ResultMap {
    let mut map = ResultMap::new();
    map.insert(
        "ChunkHeader".to_string(),
        RuleEvaluation {
            score: 0.0,
            name: "Chunk Header Integrity".to_string(),
            topic: "recording_integrity".to_string(),
            evaluation: Evaluation::default(),
        },
    );
    map
}

/// Engine that completes immediately and counts invocations.
struct InstantEngine {
    calls: AtomicUsize,
}

impl AnalysisEngine for InstantEngine {
    fn evaluate(
        &self,
        _recording: &[u8],
        _filter: &RuleFilter,
        _interrupt: &InterruptFlag,
    ) -> Result<ResultMap, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(single_entry_map())
    }

    fn check_count(&self) -> usize {
        1
    }
}

/// Engine that signals when a job starts and then blocks until released by
/// the test. Keeps timing out of the tests entirely.
struct ControlledEngine {
    calls: AtomicUsize,
    started: Mutex<mpsc::Sender<InterruptFlag>>,
    gate: Mutex<mpsc::Receiver<()>>,
}

fn controlled_engine() -> (
    Arc<ControlledEngine>,
    mpsc::Receiver<InterruptFlag>,
    mpsc::Sender<()>,
) {
    let (started_tx, started_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel();
    let engine = Arc::new(ControlledEngine {
        calls: AtomicUsize::new(0),
        started: Mutex::new(started_tx),
        gate: Mutex::new(gate_rx),
    });
    (engine, started_rx, gate_tx)
}

impl AnalysisEngine for ControlledEngine {
    fn evaluate(
        &self,
        _recording: &[u8],
        _filter: &RuleFilter,
        interrupt: &InterruptFlag,
    ) -> Result<ResultMap, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.started.lock().unwrap().send(interrupt.clone());
        // Block until the test releases us (or drops the sender at teardown).
        let _ = self.gate.lock().unwrap().recv();
        if interrupt.is_interrupted() {
            Err(EngineError::Interrupted)
        } else {
            Ok(single_entry_map())
        }
    }

    fn check_count(&self) -> usize {
        1
    }
}

#[tokio::test]
async fn job_completes_within_deadline() {
    let engine = Arc::new(InstantEngine {
        calls: AtomicUsize::new(0),
    });
    let pool = AnalysisPool::new(
        engine.clone(),
        PoolConfig {
            workers: 1,
            queue_capacity: 4,
        },
    );

    let mut handle = pool
        .submit(b"FLR\0".to_vec(), RuleFilter::accept_all())
        .unwrap();
    match handle.wait(Duration::from_secs(5)).await {
        WaitOutcome::Completed(map) => {
            assert_eq!(map.len(), 1);
            assert!(map.contains_key("ChunkHeader"));
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn deadline_elapsing_yields_timed_out_and_cancel_is_idempotent() {
    let (engine, started_rx, gate_tx) = controlled_engine();
    let pool = AnalysisPool::new(
        engine.clone(),
        PoolConfig {
            workers: 1,
            queue_capacity: 1,
        },
    );

    let mut handle = pool.submit(Vec::new(), RuleFilter::accept_all()).unwrap();
    let interrupt = started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    match handle.wait(Duration::from_millis(20)).await {
        WaitOutcome::TimedOut => {}
        other => panic!("expected timeout, got {other:?}"),
    }

    // Timeout handling and a disconnect callback may both cancel.
    handle.cancel();
    handle.cancel();
    assert!(handle.is_cancelled());
    assert!(interrupt.is_interrupted());

    let _ = gate_tx.send(());
}

#[tokio::test]
async fn full_queue_rejects_submission() {
    let (engine, started_rx, gate_tx) = controlled_engine();
    let pool = AnalysisPool::new(
        engine,
        PoolConfig {
            workers: 1,
            queue_capacity: 1,
        },
    );

    // First job occupies the worker, second fills the queue slot.
    let _running = pool.submit(Vec::new(), RuleFilter::accept_all()).unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let _queued = pool.submit(Vec::new(), RuleFilter::accept_all()).unwrap();

    match pool.submit(Vec::new(), RuleFilter::accept_all()) {
        Err(SubmitError::Overloaded) => {}
        other => panic!("expected overloaded, got {:?}", other.map(|_| ())),
    }

    let _ = gate_tx.send(());
    let _ = gate_tx.send(());
}

#[tokio::test]
async fn dropping_handle_cancels_job() {
    let (engine, started_rx, gate_tx) = controlled_engine();
    let pool = AnalysisPool::new(
        engine,
        PoolConfig {
            workers: 1,
            queue_capacity: 1,
        },
    );

    let handle = pool.submit(Vec::new(), RuleFilter::accept_all()).unwrap();
    let interrupt = started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(!interrupt.is_interrupted());

    // Simulates the client going away: the request future (and with it the
    // handle) is dropped without an explicit cancel call.
    drop(handle);
    assert!(interrupt.is_interrupted());

    let _ = gate_tx.send(());
}

#[tokio::test]
async fn job_cancelled_while_queued_never_reaches_engine() {
    let (engine, started_rx, gate_tx) = controlled_engine();
    let pool = AnalysisPool::new(
        engine.clone(),
        PoolConfig {
            workers: 1,
            queue_capacity: 1,
        },
    );

    let _running = pool.submit(Vec::new(), RuleFilter::accept_all()).unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let mut queued = pool.submit(Vec::new(), RuleFilter::accept_all()).unwrap();
    queued.cancel();
    let _ = gate_tx.send(());

    match queued.wait(Duration::from_secs(5)).await {
        WaitOutcome::Failed(EngineError::Interrupted) => {}
        other => panic!("expected interruption, got {other:?}"),
    }
    // Only the first job ever ran.
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn forced_single_threaded_pool_uses_one_worker() {
    let config = PoolConfig::detect(true, 8);
    assert_eq!(config.workers, 1);
    assert_eq!(config.queue_capacity, 8);
}
