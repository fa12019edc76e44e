// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flightscope Server - recording report sidecar
//!
//! An HTTP service that accepts a flight recording (uploaded directly, or
//! fetched from a presigned storage location), runs it through the analysis
//! engine and returns a JSON report. Every request runs under a hard
//! deadline with bounded memory admission; temp files and in-flight analysis
//! jobs are released on every exit path, including client disconnects.
//!
//! # Endpoints
//!
//! | Route | Method | Description |
//! |-------|--------|-------------|
//! | `/health` | GET | Liveness probe, `204 No Content` |
//! | `/report` | POST | Multipart upload (`file`, optional `filter`) |
//! | `/remote_report` | POST | Fetch from presigned storage (`path`, `query`, optional `filter`) |
//!
//! # Configuration
//!
//! Loaded from environment variables (see [`config::Config::from_env`]):
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FLIGHTSCOPE_PORT` | `8080` | HTTP listen port |
//! | `FLIGHTSCOPE_TIMEOUT_MS` | `29000` | Per-request deadline |
//! | `FLIGHTSCOPE_MEMORY_FACTOR` | `0` | Admission divisor, `0` disables |
//! | `FLIGHTSCOPE_QUEUE_CAPACITY` | `8` | Bounded analysis admission queue |
//! | `FLIGHTSCOPE_SINGLETHREADED` | `false` | Force one analysis worker |
//! | `FLIGHTSCOPE_STORAGE_BASE_URI` | - | Presigned storage base |
//! | `FLIGHTSCOPE_STORAGE_AUTH_METHOD` / `FLIGHTSCOPE_STORAGE_AUTH` | - | Outbound credential |
//! | `FLIGHTSCOPE_STORAGE_IGNORE_TLS` | `false` | Accept any storage certificate |
//! | `FLIGHTSCOPE_STORAGE_VERIFY_HOSTNAME` | `true` | TLS hostname verification |
//! | `FLIGHTSCOPE_STORAGE_TLS_CA_PATH` / `FLIGHTSCOPE_STORAGE_TLS_CERT_PATH` | - | Pinned certificates (both or neither) |
//! | `FLIGHTSCOPE_STORAGE_TLS_VERSION` | `1.2` | Minimum TLS version |

/// Server configuration loaded from environment variables.
pub mod config;

/// Error taxonomy and HTTP status mapping.
pub mod error;

/// Memory-based request admission control.
pub mod admission;

/// Transport trust configuration for presigned storage fetches.
pub mod trust;

/// Presigned recording download.
pub mod fetch;

/// Recording materialization and transparent decompression.
pub mod ingest;

/// Per-request orchestration: budget accounting and the analysis pipeline.
pub mod report;

/// HTTP surface: router, handlers, multipart parsing.
pub mod http;

pub use config::Config;
pub use error::Error;
