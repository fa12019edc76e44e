// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flightscope Analysis - rule evaluation contract and execution pool
//!
//! This crate defines the contract between the flightscope report server and
//! a rule-analysis engine, plus the machinery to run that engine under a
//! deadline:
//!
//! - [`result`]: the report wire model (`RuleEvaluation`, sentinel scores)
//! - [`engine`]: the [`RuleCheck`](engine::RuleCheck) and
//!   [`AnalysisEngine`](engine::AnalysisEngine) traits and the built-in
//!   [`RuleEngine`](engine::RuleEngine)
//! - [`filter`]: parsing of user-supplied rule filter expressions
//! - [`pool`]: the bounded worker pool and cancellable execution handles
//!
//! Analysis is CPU-bound and only cooperatively interruptible: the engine
//! tests an interruption flag between individual checks, never mid-check. A
//! cancelled evaluation may therefore overrun by up to the duration of one
//! in-flight check; callers must not wait for the worker to actually stop.

/// Report wire model and sentinel scores.
pub mod result;

/// Rule check and analysis engine contracts.
pub mod engine;

/// Rule filter expression parsing.
pub mod filter;

/// Bounded worker pool with cancellable execution handles.
pub mod pool;

/// Built-in recording-level checks.
pub mod checks;

pub use engine::{AnalysisEngine, InterruptFlag, RuleEngine};
pub use filter::RuleFilter;
pub use pool::{AnalysisPool, ExecutionHandle};
pub use result::{ResultMap, RuleEvaluation};
