// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Built-in recording-level checks.
//!
//! These operate on the raw recording bytes without a parsed event model, so
//! they are cheap and always available. Deployments with a full rule corpus
//! register their own [`RuleCheck`](crate::engine::RuleCheck) set instead.

use crate::engine::{CheckError, CheckOutcome, RuleCheck};
use crate::result::{Evaluation, Suggestion};

// JFR chunk header magic: 'F' 'L' 'R' '\0'.
const JFR_MAGIC: [u8; 4] = [0x46, 0x4c, 0x52, 0x00];

/// Verifies the recording starts with a valid flight-recorder chunk header.
pub struct ChunkHeaderCheck;

impl RuleCheck for ChunkHeaderCheck {
    fn id(&self) -> &str {
        "ChunkHeader"
    }

    fn name(&self) -> &str {
        "Chunk Header Integrity"
    }

    fn topic(&self) -> &str {
        "recording_integrity"
    }

    fn evaluate(&self, recording: &[u8]) -> Result<CheckOutcome, CheckError> {
        if recording.len() < JFR_MAGIC.len() {
            return Ok(CheckOutcome::not_applicable());
        }
        if recording[..JFR_MAGIC.len()] == JFR_MAGIC {
            Ok(CheckOutcome {
                score: 0.0,
                evaluation: Evaluation {
                    summary: "Recording begins with a valid chunk header".to_string(),
                    ..Evaluation::default()
                },
            })
        } else {
            Ok(CheckOutcome {
                score: 100.0,
                evaluation: Evaluation {
                    summary: "Recording does not begin with a flight-recorder chunk header"
                        .to_string(),
                    explanation: "The file is either truncated, corrupted, or not a flight \
                                  recording at all. Rule evaluation over its events is unlikely \
                                  to produce meaningful results."
                        .to_string(),
                    solution: "Re-capture the recording and verify the transfer did not \
                               truncate it."
                        .to_string(),
                    suggestions: Vec::new(),
                },
            })
        }
    }
}

/// Flags recordings large enough that analysis memory pressure becomes a
/// concern.
pub struct RecordingSizeCheck {
    /// Size at which the score reaches 100.
    warn_bytes: u64,
}

impl RecordingSizeCheck {
    /// Check scoring linearly up to `warn_bytes`.
    pub fn new(warn_bytes: u64) -> Self {
        Self { warn_bytes }
    }
}

impl Default for RecordingSizeCheck {
    fn default() -> Self {
        // 256 MiB of raw recording is already painful to hold parsed in memory.
        Self::new(256 * 1024 * 1024)
    }
}

impl RuleCheck for RecordingSizeCheck {
    fn id(&self) -> &str {
        "RecordingSize"
    }

    fn name(&self) -> &str {
        "Recording Size"
    }

    fn topic(&self) -> &str {
        "recording_integrity"
    }

    fn evaluate(&self, recording: &[u8]) -> Result<CheckOutcome, CheckError> {
        if recording.is_empty() {
            return Ok(CheckOutcome::not_applicable());
        }
        let score = (recording.len() as f64 / self.warn_bytes as f64 * 100.0).min(100.0);
        let mut evaluation = Evaluation {
            summary: format!("Recording is {} bytes", recording.len()),
            ..Evaluation::default()
        };
        if score >= 50.0 {
            evaluation.explanation = "Large recordings are expensive to materialize and analyze; \
                                      consider shorter capture windows or tighter event settings."
                .to_string();
            evaluation.suggestions.push(Suggestion {
                name: "Limit recording duration".to_string(),
                setting: "duration".to_string(),
                value: "60s".to_string(),
            });
        }
        Ok(CheckOutcome { score, evaluation })
    }
}

/// The default check set shipped with the sidecar.
pub fn default_checks() -> Vec<Box<dyn RuleCheck>> {
    vec![
        Box::new(ChunkHeaderCheck),
        Box::new(RecordingSizeCheck::default()),
    ]
}
