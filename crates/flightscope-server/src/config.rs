// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for flightscope-server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::trust::{TlsVersion, TrustSettings};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address.
    pub bind_addr: SocketAddr,
    /// Total per-request deadline.
    pub timeout: Duration,
    /// Admission-control divisor; `<= 0` disables the check.
    pub memory_factor: i64,
    /// Capacity of the bounded analysis admission queue.
    pub queue_capacity: usize,
    /// Force the analysis pool to a single worker.
    pub single_threaded: bool,
    /// Presigned storage fetch settings.
    pub storage: StorageSettings,
}

/// Presigned storage target, credential and transport trust.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Base URI recording paths are resolved against. Unset means the
    /// remote-report endpoint answers 502 without attempting any fetch.
    pub base_uri: Option<Url>,
    /// Authorization scheme (e.g. `Bearer`); applied only together with
    /// [`auth`](Self::auth).
    pub auth_method: Option<String>,
    /// Authorization credential.
    pub auth: Option<String>,
    /// Transport trust configuration.
    pub trust: TrustSettings,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = env_parse("FLIGHTSCOPE_PORT", 8080)?;
        let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let timeout_ms: u64 = env_parse("FLIGHTSCOPE_TIMEOUT_MS", 29_000)?;
        let memory_factor: i64 = env_parse("FLIGHTSCOPE_MEMORY_FACTOR", 0)?;
        let queue_capacity: usize = env_parse("FLIGHTSCOPE_QUEUE_CAPACITY", 8)?;
        let single_threaded = env_bool("FLIGHTSCOPE_SINGLETHREADED", false);

        let base_uri = match env_opt("FLIGHTSCOPE_STORAGE_BASE_URI") {
            Some(raw) => Some(Url::parse(&raw).map_err(|_| ConfigError::InvalidBaseUri(raw))?),
            None => None,
        };

        let min_tls_version = match env_opt("FLIGHTSCOPE_STORAGE_TLS_VERSION") {
            Some(raw) => raw
                .parse::<TlsVersion>()
                .map_err(|_| ConfigError::InvalidTlsVersion(raw))?,
            None => TlsVersion::default(),
        };

        let trust = TrustSettings {
            ignore_tls: env_bool("FLIGHTSCOPE_STORAGE_IGNORE_TLS", false),
            verify_hostname: env_bool("FLIGHTSCOPE_STORAGE_VERIFY_HOSTNAME", true),
            min_tls_version,
            ca_path: env_opt("FLIGHTSCOPE_STORAGE_TLS_CA_PATH").map(PathBuf::from),
            cert_path: env_opt("FLIGHTSCOPE_STORAGE_TLS_CERT_PATH").map(PathBuf::from),
        };

        Ok(Self {
            bind_addr,
            timeout: Duration::from_millis(timeout_ms),
            memory_factor,
            queue_capacity,
            single_threaded,
            storage: StorageSettings {
                base_uri,
                auth_method: env_opt("FLIGHTSCOPE_STORAGE_AUTH_METHOD"),
                auth: env_opt("FLIGHTSCOPE_STORAGE_AUTH"),
                trust,
            },
        })
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env_opt(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(name)),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A numeric environment variable failed to parse.
    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),
    /// The storage base URI is not a valid URI.
    #[error("Invalid storage base URI: {0}")]
    InvalidBaseUri(String),
    /// The minimum TLS version is not recognized.
    #[error("Invalid TLS version: {0}")]
    InvalidTlsVersion(String),
}
