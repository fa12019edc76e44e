// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Report wire model.
//!
//! The report body is a JSON object mapping check id to [`RuleEvaluation`].
//! Real scores fall in `[0, 100]`; the negative sentinel values mark checks
//! that were registered but produced no real score. Filtered-out checks are
//! always present in the map with the [`SCORE_NOT_EVALUATED`] sentinel,
//! never omitted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The check was registered but not evaluated (typically excluded by the
/// request's rule filter).
pub const SCORE_NOT_EVALUATED: f64 = -1.0;

/// The check ran but failed with an error.
pub const SCORE_EVALUATION_ERROR: f64 = -2.0;

/// The check ran and determined it does not apply to this recording.
pub const SCORE_NOT_APPLICABLE: f64 = -3.0;

/// A concrete tuning suggestion attached to an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Human-readable name of the suggestion.
    pub name: String,
    /// The setting or option the suggestion applies to.
    pub setting: String,
    /// The suggested value.
    pub value: String,
}

/// The explanatory part of a check result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// One-line summary of the finding.
    pub summary: String,
    /// Longer explanation of why the finding matters.
    pub explanation: String,
    /// Suggested remediation.
    pub solution: String,
    /// Concrete tuning suggestions, in the order the check produced them.
    pub suggestions: Vec<Suggestion>,
}

/// One check's contribution to the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    /// Score in `[0, 100]`, or one of the negative sentinels.
    pub score: f64,
    /// Display name of the check.
    pub name: String,
    /// Topic the check belongs to.
    pub topic: String,
    /// Explanation, remediation and suggestions.
    pub evaluation: Evaluation,
}

impl RuleEvaluation {
    /// Sentinel entry for a check excluded by the request filter.
    pub fn not_evaluated(name: &str, topic: &str) -> Self {
        Self::sentinel(SCORE_NOT_EVALUATED, name, topic)
    }

    /// Sentinel entry for a check that failed during evaluation.
    pub fn evaluation_error(name: &str, topic: &str) -> Self {
        Self::sentinel(SCORE_EVALUATION_ERROR, name, topic)
    }

    fn sentinel(score: f64, name: &str, topic: &str) -> Self {
        Self {
            score,
            name: name.to_string(),
            topic: topic.to_string(),
            evaluation: Evaluation::default(),
        }
    }
}

/// Full report: check id mapped to its evaluation, in stable key order.
pub type ResultMap = BTreeMap<String, RuleEvaluation>;
