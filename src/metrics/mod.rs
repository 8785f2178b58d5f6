use std::fmt::Display;
use std::io;
use std::time::Duration;

use sysinfo::{MINIMUM_CPU_UPDATE_INTERVAL, ProcessRefreshKind, ProcessesToUpdate, System};

pub mod sessions;

pub use sessions::Session;

/// System memory usage captured at one instant, in bytes.
///
/// Virtual figures follow the classic accounting: virtual used is physical
/// used plus swap used, virtual total is physical total plus swap total.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemorySnapshot {
    pub physical_used: u64,
    pub physical_total: u64,
    pub virtual_used: u64,
    pub virtual_total: u64,
}

/// Aggregate CPU utilization over one measurement window.
///
/// Values outside [0, 100] can appear transiently when kernel counters wrap;
/// they are rendered as-is rather than treated as errors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CpuSample {
    pub percent: f64,
}

/// Static identity of the host OS, reported once at the end of a run.
#[derive(Clone, Debug)]
pub struct OsIdentity {
    pub name: String,
    pub host: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetricError {
    /// The metric source could not be read.
    Unavailable(String),
    /// A worker terminated without publishing a result; its channel closed
    /// empty.
    WorkerGone,
}

impl Display for MetricError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(why) => write!(f, "metric unavailable: {why}"),
            Self::WorkerGone => write!(f, "worker exited without a result"),
        }
    }
}

impl std::error::Error for MetricError {}

impl From<io::Error> for MetricError {
    fn from(err: io::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// The accessor contract consumed by the sampling workers.
///
/// Each method reads one metric from its OS source and returns a typed
/// value. `cpu` is the only intentionally blocking call: it sleeps `delay`
/// between its two readings. Implementations must not share mutable state
/// across calls, so concurrent workers can invoke them freely.
pub trait MetricSource: Send + Sync + 'static {
    fn memory(&self) -> Result<MemorySnapshot, MetricError>;
    fn cpu(&self, delay: Duration) -> Result<CpuSample, MetricError>;
    fn sessions(&self) -> Result<Vec<Session>, MetricError>;
    /// Resident memory of this process, in kilobytes.
    fn runtime_memory_kb(&self) -> Result<u64, MetricError>;
    fn cores(&self) -> usize;
    fn identity(&self) -> OsIdentity;
}

/// Production accessor backed by `sysinfo`, plus the utmp session reader.
///
/// Every call builds its own `System` and refreshes only what it needs, so
/// calls are independent and safe to run on separate workers.
pub struct SysinfoSource;

impl SysinfoSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for SysinfoSource {
    fn memory(&self) -> Result<MemorySnapshot, MetricError> {
        let mut sys = System::new();
        sys.refresh_memory();

        let physical_total = sys.total_memory();
        if physical_total == 0 {
            return Err(MetricError::Unavailable("no memory data".into()));
        }
        let physical_used = sys.used_memory();

        Ok(MemorySnapshot {
            physical_used,
            physical_total,
            virtual_used: physical_used + sys.used_swap(),
            virtual_total: physical_total + sys.total_swap(),
        })
    }

    fn cpu(&self, delay: Duration) -> Result<CpuSample, MetricError> {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        // sysinfo needs a minimum spacing between the two readings for the
        // delta to be meaningful, even when tdelay is zero.
        std::thread::sleep(delay.max(MINIMUM_CPU_UPDATE_INTERVAL));
        sys.refresh_cpu_usage();

        Ok(CpuSample {
            percent: f64::from(sys.global_cpu_usage()),
        })
    }

    fn sessions(&self) -> Result<Vec<Session>, MetricError> {
        sessions::read_sessions()
    }

    fn runtime_memory_kb(&self) -> Result<u64, MetricError> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| MetricError::Unavailable(e.to_string()))?;
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        sys.process(pid)
            .map(|p| p.memory() / 1024)
            .ok_or_else(|| MetricError::Unavailable("own process not visible".into()))
    }

    fn cores(&self) -> usize {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.cpus().len()
    }

    fn identity(&self) -> OsIdentity {
        let unknown = || "unknown".to_string();
        OsIdentity {
            name: System::name().unwrap_or_else(unknown),
            host: System::host_name().unwrap_or_else(unknown),
            version: System::os_version().unwrap_or_else(unknown),
            release: System::kernel_version().unwrap_or_else(unknown),
            arch: System::cpu_arch(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_error_displays_cause() {
        let err = MetricError::Unavailable("no such file".into());
        assert_eq!(err.to_string(), "metric unavailable: no such file");
        assert_eq!(
            MetricError::WorkerGone.to_string(),
            "worker exited without a result"
        );
    }

    #[test]
    fn io_error_converts_to_unavailable() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        match MetricError::from(io_err) {
            MetricError::Unavailable(msg) => assert!(msg.contains("gone")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
