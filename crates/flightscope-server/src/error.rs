// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for flightscope-server.
//!
//! Every error is resolved at the handler boundary into exactly one HTTP
//! status; no partial or ambiguous states are surfaced to the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Server errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Transport trust configuration is invalid.
    #[error("Trust configuration error: {0}")]
    Trust(#[from] crate::trust::TrustError),

    /// The request itself is malformed.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Admission control rejected the payload.
    #[error("Payload of {length} bytes exceeds estimated maximum handleable size of {max_handleable} bytes")]
    PayloadTooLarge {
        /// Declared or materialized payload size.
        length: u64,
        /// Estimated maximum handleable size at admission time.
        max_handleable: u64,
    },

    /// Remote fetch requested but no storage base URI is configured.
    #[error("Storage base URI is not configured")]
    StorageUnconfigured,

    /// The storage upstream answered with a non-success status.
    #[error("Upstream returned status {0}")]
    UpstreamStatus(u16),

    /// The storage upstream could not be reached.
    #[error("Upstream request failed: {0}")]
    UpstreamTransport(String),

    /// The per-request deadline elapsed.
    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    /// The analysis admission queue is full.
    #[error("Analysis queue is full, try again later")]
    Overloaded,

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type using the server Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The single HTTP status this error resolves to.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Config(_) | Error::Trust(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::StorageUnconfigured
            | Error::UpstreamStatus(_)
            | Error::UpstreamTransport(_) => StatusCode::BAD_GATEWAY,
            Error::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Error::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            Error::Io(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        eprintln!("DEBUG into_response: {self}");
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
