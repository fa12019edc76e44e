// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Rule check and analysis engine contracts.
//!
//! An [`AnalysisEngine`] takes a materialized recording, a [`RuleFilter`]
//! and an [`InterruptFlag`] and produces a [`ResultMap`] with one entry per
//! registered check. The engine is assumed to be CPU-bound and long-running;
//! interruption is cooperative and observed only between checks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, warn};

use crate::filter::RuleFilter;
use crate::result::{Evaluation, ResultMap, RuleEvaluation, SCORE_NOT_APPLICABLE};

/// Shared cooperative interruption flag.
///
/// Cloning yields a handle to the same flag. Setting it is idempotent; a
/// running engine tests it at check boundaries and stops at the next one.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Create a new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request interruption. Safe to call multiple times from any thread.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether interruption has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Error from a single check evaluation.
///
/// A failing check does not fail the report; it is recorded in the result
/// map with the evaluation-error sentinel score.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CheckError(pub String);

/// The outcome of one successfully evaluated check.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// Score in `[0, 100]`, or [`SCORE_NOT_APPLICABLE`].
    pub score: f64,
    /// Explanation, remediation and suggestions.
    pub evaluation: Evaluation,
}

impl CheckOutcome {
    /// Outcome for a check that does not apply to this recording.
    pub fn not_applicable() -> Self {
        Self {
            score: SCORE_NOT_APPLICABLE,
            evaluation: Evaluation::default(),
        }
    }
}

/// One named analysis rule applied to a recording.
pub trait RuleCheck: Send + Sync {
    /// Stable identifier, used as the result map key.
    fn id(&self) -> &str;
    /// Human-readable name.
    fn name(&self) -> &str;
    /// Topic the check belongs to; filter expressions may select by topic.
    fn topic(&self) -> &str;
    /// Evaluate the check against the raw recording bytes.
    fn evaluate(&self, recording: &[u8]) -> Result<CheckOutcome, CheckError>;
}

/// Engine-level failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Evaluation was interrupted before completing.
    #[error("analysis interrupted")]
    Interrupted,
    /// The engine failed for a reason unrelated to any single check.
    #[error("analysis failed: {0}")]
    Failed(String),
}

/// A pluggable analysis engine.
///
/// Implementations must produce an entry for every check they know about,
/// not only the filtered subset; filtered-out checks carry the
/// not-evaluated sentinel score.
pub trait AnalysisEngine: Send + Sync {
    /// Evaluate all registered checks against a recording.
    fn evaluate(
        &self,
        recording: &[u8],
        filter: &RuleFilter,
        interrupt: &InterruptFlag,
    ) -> Result<ResultMap, EngineError>;

    /// Number of registered checks.
    fn check_count(&self) -> usize;
}

/// The built-in engine: runs a registered set of [`RuleCheck`]s in order,
/// testing the interrupt flag between checks.
pub struct RuleEngine {
    checks: Vec<Box<dyn RuleCheck>>,
}

impl RuleEngine {
    /// Build an engine over the given check set.
    pub fn new(checks: Vec<Box<dyn RuleCheck>>) -> Self {
        Self { checks }
    }
}

impl AnalysisEngine for RuleEngine {
    fn evaluate(
        &self,
        recording: &[u8],
        filter: &RuleFilter,
        interrupt: &InterruptFlag,
    ) -> Result<ResultMap, EngineError> {
        let mut map = ResultMap::new();
        for check in &self.checks {
            // Cooperative cancellation point: only between checks.
            if interrupt.is_interrupted() {
                debug!(check_id = check.id(), "Analysis interrupted before check");
                return Err(EngineError::Interrupted);
            }
            if !filter.accepts(check.id(), check.topic()) {
                map.insert(
                    check.id().to_string(),
                    RuleEvaluation::not_evaluated(check.name(), check.topic()),
                );
                continue;
            }
            let entry = match check.evaluate(recording) {
                Ok(outcome) => RuleEvaluation {
                    score: outcome.score,
                    name: check.name().to_string(),
                    topic: check.topic().to_string(),
                    evaluation: outcome.evaluation,
                },
                Err(e) => {
                    warn!(check_id = check.id(), error = %e, "Check evaluation failed");
                    RuleEvaluation::evaluation_error(check.name(), check.topic())
                }
            };
            map.insert(check.id().to_string(), entry);
        }
        Ok(map)
    }

    fn check_count(&self) -> usize {
        self.checks.len()
    }
}
