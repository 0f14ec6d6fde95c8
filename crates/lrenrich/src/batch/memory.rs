//! Memory-pressure valve run between batches.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use sysinfo::{Pid, System};
use tracing::{debug, info, warn};

use crate::preview::PreviewLocator;

const MIB: f64 = 1024.0 * 1024.0;

/// Source of the process's resident memory, in bytes.
pub trait MemoryProbe: Send + Sync {
    fn resident_bytes(&self) -> Option<u64>;
}

/// Reads the current process's resident set size through `sysinfo`.
pub struct ProcessMemoryProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl ProcessMemoryProbe {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| warn!("Cannot determine current pid, memory valve disabled: {}", e))
            .ok();
        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }
}

impl Default for ProcessMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_process(pid);
        system.process(pid).map(|p| p.memory())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryRelief {
    pub before_bytes: u64,
    pub after_bytes: u64,
    pub cleared_entries: usize,
}

impl MemoryRelief {
    pub fn freed_bytes(&self) -> u64 {
        self.before_bytes.saturating_sub(self.after_bytes)
    }
}

pub struct MemoryGuard {
    probe: Box<dyn MemoryProbe>,
    limit_bytes: u64,
    pressure_ratio: f64,
}

impl MemoryGuard {
    /// `limit_bytes == 0` disables the valve.
    pub fn new(probe: Box<dyn MemoryProbe>, limit_bytes: u64, pressure_ratio: f64) -> Self {
        Self {
            probe,
            limit_bytes,
            pressure_ratio,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Box::new(ProcessMemoryProbe::new()), 0, 1.0)
    }

    pub fn threshold_bytes(&self) -> u64 {
        (self.limit_bytes as f64 * self.pressure_ratio) as u64
    }

    /// Clears the locator cache when resident memory is above the threshold.
    /// Returns what was done, or `None` when no action was needed.
    pub fn check(&self, locator: &PreviewLocator) -> Option<MemoryRelief> {
        if self.limit_bytes == 0 {
            return None;
        }
        let before = self.probe.resident_bytes()?;
        let threshold = self.threshold_bytes();
        if before <= threshold {
            debug!("Memory usage {:.1} MiB within limit", before as f64 / MIB);
            return None;
        }

        warn!(
            "Memory usage {:.1} MiB above {:.1} MiB, clearing preview cache",
            before as f64 / MIB,
            threshold as f64 / MIB
        );
        let cleared_entries = locator.clear_cache();
        let after = self.probe.resident_bytes().unwrap_or(before);
        let relief = MemoryRelief {
            before_bytes: before,
            after_bytes: after,
            cleared_entries,
        };
        info!(
            "Memory after cleanup: {:.1} MiB ({:.1} MiB freed)",
            after as f64 / MIB,
            relief.freed_bytes() as f64 / MIB
        );
        Some(relief)
    }
}
