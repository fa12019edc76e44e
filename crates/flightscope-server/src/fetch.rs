// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Presigned recording download.
//!
//! Resolves a request-supplied path and query against the configured
//! storage base URI, fetches the recording with the per-request trust
//! context, and materializes the body into a request-owned temp file. The
//! upstream-declared content length is checked against admission control
//! before any body bytes are streamed. The whole fetch runs under the
//! request's remaining deadline; a stalled upstream cannot hold a request
//! open past its budget.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::admission::{ResourceMonitor, check_admissible};
use crate::config::StorageSettings;
use crate::error::Error;
use crate::ingest::{Recording, new_temp_file};

/// Resolve the download URL for a request-supplied path and query.
///
/// Traversal segments are rejected outright rather than normalized away, so
/// a crafted path can never escape the configured base.
pub(crate) fn build_download_url(
    base: &Url,
    path: &str,
    query: Option<&str>,
) -> Result<Url, Error> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| Error::BadRequest("storage base URI cannot carry paths".to_string()))?;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(Error::BadRequest(
                    "recording path must not contain traversal segments".to_string(),
                ));
            }
            segments.push(segment);
        }
    }
    url.set_query(query.filter(|q| !q.is_empty()));
    Ok(url)
}

/// Fetch a presigned recording into a request-owned temp file.
///
/// `remaining` bounds the whole fetch, connection through last body byte;
/// exceeding it is reported as a deadline error, not an upstream fault.
pub async fn fetch_remote(
    storage: &StorageSettings,
    path: &str,
    query: Option<&str>,
    remaining: Duration,
    memory_factor: i64,
    monitor: &dyn ResourceMonitor,
) -> Result<Recording, Error> {
    let base = storage.base_uri.as_ref().ok_or(Error::StorageUnconfigured)?;
    let url = build_download_url(base, path, query)?;

    // Built per request: pinned certificate files may rotate between requests.
    let client = storage.trust.build_client()?;

    info!(url = %url, "Downloading presigned recording");
    let mut request = client.get(url).timeout(remaining);
    if let (Some(method), Some(credential)) = (&storage.auth_method, &storage.auth) {
        request = request.header(
            reqwest::header::AUTHORIZATION,
            format!("{method} {credential}"),
        );
    }

    let mut response = request.send().await.map_err(upstream_error)?;
    if !response.status().is_success() {
        return Err(Error::UpstreamStatus(response.status().as_u16()));
    }

    check_admissible(response.content_length(), memory_factor, monitor)?;

    let temp = new_temp_file()?;
    let mut out = tokio::fs::File::create(temp.path()).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = response.chunk().await.map_err(upstream_error)? {
        written += chunk.len() as u64;
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    drop(out);
    debug!(bytes = written, "Presigned recording materialized");

    Recording::from_temp_file(temp).map_err(Error::Io)
}

fn upstream_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::DeadlineExceeded
    } else {
        Error::UpstreamTransport(e.to_string())
    }
}
