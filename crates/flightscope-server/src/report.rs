// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-request orchestration.
//!
//! The pipeline runs admit → ingest → decompress → re-admit → analyze, with
//! the remaining deadline recomputed before every blocking stage. A request
//! that burns its whole budget fetching or decompressing fails with a
//! deadline error before ever occupying an analysis worker. Cleanup is
//! structural: the [`Recording`] deletes its temp file on drop, and the
//! execution handle cancels its job on drop, so every exit path — including
//! the handler future being dropped on client disconnect — releases both.

use std::time::{Duration, Instant};

use flightscope_analysis::engine::EngineError;
use flightscope_analysis::filter::RuleFilter;
use flightscope_analysis::pool::{SubmitError, WaitOutcome};
use flightscope_analysis::result::ResultMap;
use tracing::info;

use crate::admission::check_admissible;
use crate::error::{Error, Result};
use crate::http::AppState;
use crate::ingest::{Recording, maybe_decompress};

/// Wall-clock budget for one request.
///
/// Computed once at request entry; every stage recomputes the remainder
/// instead of assuming it constant across blocking work.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    start: Instant,
    deadline: Instant,
}

impl Budget {
    /// Start a budget of `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        let start = Instant::now();
        Self {
            start,
            deadline: start + timeout,
        }
    }

    /// Time left before the deadline, zero once exceeded.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    pub fn exhausted(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Time spent since request entry.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Run the analysis pipeline for one materialized recording.
///
/// `source` is only used for logging (an upload file name or a remote path).
pub async fn run_analysis(
    state: &AppState,
    recording: Recording,
    filter_expr: Option<&str>,
    budget: &Budget,
    source: &str,
) -> Result<ResultMap> {
    let result = analyze(state, recording, filter_expr, budget).await;
    match &result {
        Ok(map) => info!(
            source,
            checks = map.len(),
            elapsed_ms = budget.elapsed().as_millis() as u64,
            "Completed report request"
        ),
        Err(e) => info!(
            source,
            elapsed_ms = budget.elapsed().as_millis() as u64,
            error = %e,
            "Report request terminated without a report"
        ),
    }
    result
}

async fn analyze(
    state: &AppState,
    recording: Recording,
    filter_expr: Option<&str>,
    budget: &Budget,
) -> Result<ResultMap> {
    let compressed_len = recording.byte_len();
    let (recording, was_compressed) =
        tokio::task::spawn_blocking(move || maybe_decompress(recording))
            .await
            .map_err(|e| Error::Internal(format!("Decompression task panicked: {e}")))??;
    if was_compressed {
        info!(
            compressed_bytes = compressed_len,
            decompressed_bytes = recording.byte_len(),
            elapsed_ms = budget.elapsed().as_millis() as u64,
            "Recording was compressed"
        );
    }

    // Covers the unknown-length-at-admission case: the materialized
    // (post-decompression) size is what analysis will actually pay for.
    check_admissible(
        Some(recording.byte_len()),
        state.config.memory_factor,
        state.monitor.as_ref(),
    )?;

    // No point occupying a worker for an answer nobody can wait for.
    if budget.exhausted() {
        return Err(Error::DeadlineExceeded);
    }

    let filter = RuleFilter::parse(filter_expr);
    let bytes = recording.read().await?;
    // The temp file is no longer needed once the bytes are in memory.
    drop(recording);

    let mut handle = state
        .pool
        .submit(bytes, filter)
        .map_err(|e| match e {
            SubmitError::Overloaded => Error::Overloaded,
            SubmitError::Shutdown => Error::Internal("Analysis pool is shut down".to_string()),
        })?;

    match handle.wait(budget.remaining()).await {
        WaitOutcome::Completed(map) => Ok(map),
        WaitOutcome::TimedOut => {
            // The worker keeps running until its next check boundary; we do
            // not wait for it to actually stop.
            eprintln!("DEBUG analyze: TimedOut arm, cancelling");
            handle.cancel();
            eprintln!("DEBUG analyze: cancelled, returning DeadlineExceeded");
            Err(Error::DeadlineExceeded)
        }
        WaitOutcome::Failed(EngineError::Interrupted) => Err(Error::Internal(
            "Analysis interrupted without a timeout or cancellation cause".to_string(),
        )),
        WaitOutcome::Failed(e) => Err(Error::Internal(e.to_string())),
    }
}
