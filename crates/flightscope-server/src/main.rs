// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flightscope Server - recording report sidecar
//!
//! An HTTP service that turns flight recordings into rule-analysis reports:
//! - Direct multipart upload or presigned remote fetch
//! - Transparent gzip/zip unwrapping
//! - Memory-based admission control
//! - Deadline-bounded, cooperatively cancellable analysis

use std::sync::Arc;

use tracing::{info, warn};

use flightscope_analysis::checks::default_checks;
use flightscope_analysis::engine::RuleEngine;
use flightscope_analysis::pool::{AnalysisPool, PoolConfig};
use flightscope_server::admission::{ResourceMonitor, SystemResourceMonitor};
use flightscope_server::config::Config;
use flightscope_server::http::{AppState, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flightscope_server=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;

    let monitor: Arc<dyn ResourceMonitor> = Arc::new(SystemResourceMonitor::new());
    let engine = Arc::new(RuleEngine::new(default_checks()));
    let pool = Arc::new(AnalysisPool::new(
        engine,
        PoolConfig::detect(config.single_threaded, config.queue_capacity),
    ));

    info!(
        cpus = num_cpus::get(),
        single_threaded = config.single_threaded,
        max_memory_mb = monitor.max_memory() / (1024 * 1024),
        memory_factor = config.memory_factor,
        timeout_ms = config.timeout.as_millis() as u64,
        "Starting Flightscope report server"
    );

    let bind_addr = config.bind_addr;
    let state = AppState {
        config: Arc::new(config),
        pool,
        monitor,
    };

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "Report server ready");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    info!("Flightscope report server shut down");

    Ok(())
}
