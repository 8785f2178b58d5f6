use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sysglance::metrics::{
    CpuSample, MemorySnapshot, MetricError, MetricSource, OsIdentity, Session,
};

/// Deterministic metric source for engine tests. Optional per-accessor
/// latency exercises the concurrency properties; `active` counts accessor
/// calls currently in flight so tests can prove workers are reaped.
pub struct MockSource {
    pub memory_latency: Duration,
    pub session_latency: Duration,
    pub fail_memory: bool,
    pub active: Arc<AtomicUsize>,
}

impl Default for MockSource {
    fn default() -> Self {
        MockSource {
            memory_latency: Duration::ZERO,
            session_latency: Duration::ZERO,
            fail_memory: false,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MetricSource for MockSource {
    fn memory(&self) -> Result<MemorySnapshot, MetricError> {
        let _guard = InFlight::enter(&self.active);
        std::thread::sleep(self.memory_latency);
        if self.fail_memory {
            return Err(MetricError::Unavailable("mock meminfo".into()));
        }
        Ok(MemorySnapshot {
            physical_used: 2_500_000_000,
            physical_total: 8_000_000_000,
            virtual_used: 2_500_000_000,
            virtual_total: 10_000_000_000,
        })
    }

    fn cpu(&self, delay: Duration) -> Result<CpuSample, MetricError> {
        let _guard = InFlight::enter(&self.active);
        std::thread::sleep(delay);
        Ok(CpuSample { percent: 12.5 })
    }

    fn sessions(&self) -> Result<Vec<Session>, MetricError> {
        let _guard = InFlight::enter(&self.active);
        std::thread::sleep(self.session_latency);
        Ok(vec![
            Session {
                user: "alice".into(),
                terminal: "pts/0".into(),
                remote_host: Some("10.0.0.5".into()),
            },
            Session {
                user: "bob".into(),
                terminal: "tty1".into(),
                remote_host: None,
            },
        ])
    }

    fn runtime_memory_kb(&self) -> Result<u64, MetricError> {
        Ok(3664)
    }

    fn cores(&self) -> usize {
        8
    }

    fn identity(&self) -> OsIdentity {
        OsIdentity {
            name: "Linux".into(),
            host: "testbox".into(),
            version: "24.04".into(),
            release: "6.8.0-generic".into(),
            arch: "x86_64".into(),
        }
    }
}
