// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Memory-based request admission control.
//!
//! Analyzing a recording requires materializing it (and usually a parsed
//! event model) at several times its raw size. The memory factor is an
//! operator-tuned multiplier, not a measured value: a request is rejected
//! up front when its byte length exceeds `available_memory / factor`.

use tracing::{debug, warn};

use crate::error::Error;

/// Host memory statistics, injectable so tests can fake them instead of
/// depending on live process introspection.
pub trait ResourceMonitor: Send + Sync {
    /// Upper bound of memory available to this process.
    fn max_memory(&self) -> u64;
    /// Memory currently in use.
    fn used_memory(&self) -> u64;
    /// Memory already committed but free for reuse.
    fn free_memory(&self) -> u64;

    /// Estimated bytes available to new work.
    fn available_memory(&self) -> u64 {
        self.max_memory()
            .saturating_sub(self.used_memory())
            .saturating_add(self.free_memory())
    }
}

/// Live host statistics via sysinfo.
pub struct SystemResourceMonitor {
    system: std::sync::Mutex<sysinfo::System>,
}

impl SystemResourceMonitor {
    /// Create a monitor sampling the host's memory.
    pub fn new() -> Self {
        Self {
            system: std::sync::Mutex::new(sysinfo::System::new()),
        }
    }

    fn sample(&self, read: impl Fn(&sysinfo::System) -> u64) -> u64 {
        match self.system.lock() {
            Ok(mut system) => {
                system.refresh_memory();
                read(&system)
            }
            Err(_) => 0,
        }
    }
}

impl Default for SystemResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceMonitor for SystemResourceMonitor {
    fn max_memory(&self) -> u64 {
        self.sample(|s| s.total_memory())
    }

    fn used_memory(&self) -> u64 {
        // sysinfo's used figure already nets out reclaimable pages, so no
        // separate free term is reported.
        self.sample(|s| s.used_memory())
    }

    fn free_memory(&self) -> u64 {
        0
    }

    fn available_memory(&self) -> u64 {
        self.sample(|s| s.total_memory().saturating_sub(s.used_memory()))
    }
}

/// Fixed statistics, for tests and for operators who want admission bounds
/// decoupled from live host readings.
#[derive(Debug, Clone, Copy)]
pub struct FixedResourceMonitor {
    /// Reported maximum memory.
    pub max: u64,
    /// Reported used memory.
    pub used: u64,
    /// Reported free memory.
    pub free: u64,
}

impl ResourceMonitor for FixedResourceMonitor {
    fn max_memory(&self) -> u64 {
        self.max
    }

    fn used_memory(&self) -> u64 {
        self.used
    }

    fn free_memory(&self) -> u64 {
        self.free
    }
}

/// Check whether a payload of `byte_len` bytes may be admitted.
///
/// A factor of zero or less disables the check entirely. An unknown length
/// (`None`, e.g. chunked transfer without a declared size) is admitted
/// optimistically; callers re-check once the payload is materialized.
pub fn check_admissible(
    byte_len: Option<u64>,
    memory_factor: i64,
    monitor: &dyn ResourceMonitor,
) -> Result<(), Error> {
    if memory_factor <= 0 {
        return Ok(());
    }
    let Some(length) = byte_len.filter(|len| *len > 0) else {
        debug!("Request payload has indeterminate length, admitting optimistically");
        return Ok(());
    };
    debug!(bytes = length, "Checking payload admission");
    let available = monitor.available_memory();
    let max_handleable = available / memory_factor as u64;
    if length > max_handleable {
        warn!(
            bytes = length,
            max_handleable, "Rejecting payload over estimated maximum handleable size"
        );
        return Err(Error::PayloadTooLarge {
            length,
            max_handleable,
        });
    }
    Ok(())
}
