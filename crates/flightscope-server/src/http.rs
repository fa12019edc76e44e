// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP surface: router, handlers, multipart parsing.

use std::sync::Arc;

use axum::extract::multipart::{Field, Multipart};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use flightscope_analysis::pool::AnalysisPool;
use flightscope_analysis::result::ResultMap;
use tokio::io::AsyncWriteExt;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::admission::{ResourceMonitor, check_admissible};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::fetch_remote;
use crate::ingest::{Recording, new_temp_file};
use crate::report::{Budget, run_analysis};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Config>,
    /// Shared analysis worker pool.
    pub pool: Arc<AnalysisPool>,
    /// Host memory statistics for admission control.
    pub monitor: Arc<dyn ResourceMonitor>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/report", post(report))
        .route("/remote_report", post(remote_report))
        // Recordings routinely run to hundreds of megabytes; admission
        // control is the size gate, not the framework's default body cap.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe. Always succeeds; checks no dependencies.
async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Generate a report for an uploaded recording.
async fn report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ResultMap>> {
    let budget = Budget::new(state.config.timeout);
    let form = read_report_form(multipart).await?;
    info!(
        file_name = %form.file_name,
        bytes = form.recording.byte_len(),
        "Received report request"
    );

    check_admissible(
        Some(form.recording.byte_len()),
        state.config.memory_factor,
        state.monitor.as_ref(),
    )?;

    let map = run_analysis(
        &state,
        form.recording,
        form.filter.as_deref(),
        &budget,
        &form.file_name,
    )
    .await;
    eprintln!("DEBUG report handler: run_analysis returned, ok={}", map.is_ok());
    let map = map?;
    Ok(Json(map))
}

/// Generate a report for a recording fetched from presigned storage.
async fn remote_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ResultMap>> {
    let budget = Budget::new(state.config.timeout);
    let form = read_remote_form(multipart).await?;

    let recording = fetch_remote(
        &state.config.storage,
        &form.path,
        form.query.as_deref(),
        budget.remaining(),
        state.config.memory_factor,
        state.monitor.as_ref(),
    )
    .await?;

    let map = run_analysis(
        &state,
        recording,
        form.filter.as_deref(),
        &budget,
        &form.path,
    )
    .await?;
    Ok(Json(map))
}

struct ReportForm {
    recording: Recording,
    file_name: String,
    filter: Option<String>,
}

struct RemoteForm {
    path: String,
    query: Option<String>,
    filter: Option<String>,
}

async fn read_report_form(mut multipart: Multipart) -> Result<ReportForm> {
    let mut recording = None;
    let mut file_name = "recording".to_string();
    let mut filter = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                if let Some(upload_name) = field.file_name() {
                    file_name = upload_name.to_string();
                }
                recording = Some(spool_field(field).await?);
            }
            Some("filter") => filter = Some(field.text().await.map_err(bad_request)?),
            _ => {}
        }
    }

    let recording =
        recording.ok_or_else(|| Error::BadRequest("missing required part: file".to_string()))?;
    Ok(ReportForm {
        recording,
        file_name,
        filter,
    })
}

async fn read_remote_form(mut multipart: Multipart) -> Result<RemoteForm> {
    let mut path = None;
    let mut query = None;
    let mut filter = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().map(str::to_string);
        let value = field.text().await.map_err(bad_request)?;
        match name.as_deref() {
            Some("path") => path = Some(value),
            Some("query") => query = Some(value),
            Some("filter") => filter = Some(value),
            _ => {}
        }
    }

    let path = path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::BadRequest("missing required field: path".to_string()))?;
    Ok(RemoteForm {
        path,
        query,
        filter,
    })
}

/// Stream a multipart field into a request-owned temp file.
async fn spool_field(mut field: Field<'_>) -> Result<Recording> {
    let temp = new_temp_file()?;
    let mut out = tokio::fs::File::create(temp.path()).await?;
    while let Some(chunk) = field.chunk().await.map_err(bad_request)? {
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    drop(out);
    Recording::from_temp_file(temp).map_err(Error::Io)
}

fn bad_request(e: axum::extract::multipart::MultipartError) -> Error {
    Error::BadRequest(e.to_string())
}
