// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transport trust configuration for presigned storage fetches.
//!
//! The trust context is built fresh for every request rather than cached:
//! the pinned-certificate case reads files that an operator may rotate
//! between requests. A misconfigured trust context is always reported as a
//! server-side fault, never silently downgraded to default trust.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use reqwest::Certificate;
use thiserror::Error;

/// Minimum TLS protocol version for storage connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsVersion {
    /// TLS 1.2.
    #[default]
    Tls12,
    /// TLS 1.3.
    Tls13,
}

impl FromStr for TlsVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.2" | "TLSv1.2" => Ok(TlsVersion::Tls12),
            "1.3" | "TLSv1.3" => Ok(TlsVersion::Tls13),
            _ => Err(()),
        }
    }
}

impl From<TlsVersion> for reqwest::tls::Version {
    fn from(version: TlsVersion) -> Self {
        match version {
            TlsVersion::Tls12 => reqwest::tls::Version::TLS_1_2,
            TlsVersion::Tls13 => reqwest::tls::Version::TLS_1_3,
        }
    }
}

/// Trust configuration for outbound storage connections.
#[derive(Debug, Clone, Default)]
pub struct TrustSettings {
    /// Accept any server certificate. Explicitly insecure; only honored
    /// when the operator opted in via configuration.
    pub ignore_tls: bool,
    /// Verify the server hostname against its certificate.
    pub verify_hostname: bool,
    /// Minimum TLS protocol version.
    pub min_tls_version: TlsVersion,
    /// Pinned CA certificate path. Must be set together with
    /// [`cert_path`](Self::cert_path) or not at all.
    pub ca_path: Option<PathBuf>,
    /// Pinned leaf certificate path.
    pub cert_path: Option<PathBuf>,
}

/// Trust configuration errors. All of these are configuration faults of the
/// server, reported to clients as internal errors.
#[derive(Debug, Error)]
pub enum TrustError {
    /// Exactly one of the two pinned-certificate paths is set.
    #[error(
        "FLIGHTSCOPE_STORAGE_TLS_CA_PATH and FLIGHTSCOPE_STORAGE_TLS_CERT_PATH must be both set or both unset"
    )]
    PartialPinning,

    /// A pinned certificate file could not be read.
    #[error("Failed to read certificate {path}: {source}")]
    CertificateRead {
        /// Path of the unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A pinned certificate file is not valid PEM.
    #[error("Invalid certificate {path}: {source}")]
    CertificateParse {
        /// Path of the invalid file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build storage HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl TrustSettings {
    /// Build an HTTP client honoring these trust settings.
    ///
    /// Reads the pinned certificate files when pinning is configured; does
    /// no network I/O.
    pub fn build_client(&self) -> Result<reqwest::Client, TrustError> {
        let mut builder =
            reqwest::Client::builder().min_tls_version(self.min_tls_version.into());

        if self.ignore_tls {
            builder = builder.danger_accept_invalid_certs(true);
        } else {
            match (&self.ca_path, &self.cert_path) {
                (Some(ca), Some(cert)) => {
                    builder = builder
                        .add_root_certificate(load_certificate(ca)?)
                        .add_root_certificate(load_certificate(cert)?);
                }
                (None, None) => {}
                // Validated invariant, not a default fallback.
                _ => return Err(TrustError::PartialPinning),
            }
        }

        if !self.verify_hostname {
            builder = builder.danger_accept_invalid_hostnames(true);
        }

        builder.build().map_err(TrustError::Client)
    }
}

fn load_certificate(path: &Path) -> Result<Certificate, TrustError> {
    let pem = std::fs::read(path).map_err(|source| TrustError::CertificateRead {
        path: path.to_path_buf(),
        source,
    })?;
    Certificate::from_pem(&pem).map_err(|source| TrustError::CertificateParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_version_parses_both_spellings() {
        assert_eq!("1.2".parse::<TlsVersion>().unwrap(), TlsVersion::Tls12);
        assert_eq!("TLSv1.3".parse::<TlsVersion>().unwrap(), TlsVersion::Tls13);
        assert!("1.1".parse::<TlsVersion>().is_err());
    }

    #[test]
    fn default_settings_build_a_client() {
        let settings = TrustSettings {
            verify_hostname: true,
            ..TrustSettings::default()
        };
        assert!(settings.build_client().is_ok());
    }

    #[test]
    fn accept_all_builds_a_client() {
        let settings = TrustSettings {
            ignore_tls: true,
            verify_hostname: false,
            ..TrustSettings::default()
        };
        assert!(settings.build_client().is_ok());
    }

    #[test]
    fn partial_pinning_is_rejected() {
        let settings = TrustSettings {
            verify_hostname: true,
            ca_path: Some(PathBuf::from("/etc/flightscope/ca.pem")),
            ..TrustSettings::default()
        };
        assert!(matches!(
            settings.build_client(),
            Err(TrustError::PartialPinning)
        ));

        let settings = TrustSettings {
            verify_hostname: true,
            cert_path: Some(PathBuf::from("/etc/flightscope/tls.pem")),
            ..TrustSettings::default()
        };
        assert!(matches!(
            settings.build_client(),
            Err(TrustError::PartialPinning)
        ));
    }

    #[test]
    fn unreadable_pinned_certificate_is_a_read_error() {
        let settings = TrustSettings {
            verify_hostname: true,
            ca_path: Some(PathBuf::from("/nonexistent/ca.pem")),
            cert_path: Some(PathBuf::from("/nonexistent/tls.pem")),
            ..TrustSettings::default()
        };
        assert!(matches!(
            settings.build_client(),
            Err(TrustError::CertificateRead { .. })
        ));
    }

    #[test]
    fn ignore_tls_skips_pinning_validation() {
        // Accept-all short-circuits before the pinned paths are touched,
        // matching the precedence of the ignore-tls operator switch.
        let settings = TrustSettings {
            ignore_tls: true,
            verify_hostname: true,
            ca_path: Some(PathBuf::from("/nonexistent/ca.pem")),
            ..TrustSettings::default()
        };
        assert!(settings.build_client().is_ok());
    }
}
