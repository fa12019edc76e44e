// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Rule filter expression parsing.
//!
//! A filter expression is a comma-separated list of check ids and/or topic
//! names, matched case-sensitively. An absent or empty expression accepts
//! every check. Unknown entries are not an error: they simply match nothing,
//! so the corresponding checks still appear in the report with the
//! not-evaluated sentinel score.

use std::collections::BTreeSet;

/// A parsed, request-scoped rule filter.
///
/// The filter is a pure predicate over `(check id, topic)`; parsing the same
/// expression twice yields identical inclusion decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    /// `None` means no filtering (accept everything).
    entries: Option<BTreeSet<String>>,
}

impl RuleFilter {
    /// Filter that accepts every check.
    pub fn accept_all() -> Self {
        Self { entries: None }
    }

    /// Parse a filter expression. Absent, empty and whitespace-only
    /// expressions accept everything.
    pub fn parse(expr: Option<&str>) -> Self {
        let Some(expr) = expr else {
            return Self::accept_all();
        };
        let entries: BTreeSet<String> = expr
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if entries.is_empty() {
            Self::accept_all()
        } else {
            Self {
                entries: Some(entries),
            }
        }
    }

    /// Whether a check with the given id and topic passes the filter.
    pub fn accepts(&self, check_id: &str, topic: &str) -> bool {
        match &self.entries {
            None => true,
            Some(entries) => entries.contains(check_id) || entries.contains(topic),
        }
    }
}
