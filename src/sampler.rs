//! Sampling coordinator and worker plumbing.
//!
//! Each iteration fans the active metrics out to isolated blocking workers,
//! one accessor call per worker, publishing on one-shot channels. The
//! coordinator joins them in a fixed order, assembles a [`Frame`], hands it
//! to the renderer, and carries only [`PriorState`] into the next iteration.

use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::RunConfig;
use crate::metrics::{CpuSample, MemorySnapshot, MetricError, MetricSource, Session};
use crate::render::Renderer;

/// The merged result of one iteration, ready for rendering. Each sampled
/// field carries its own error so one failing metric degrades only its own
/// line.
#[derive(Clone, Debug)]
pub struct Frame {
    pub index: u32,
    pub runtime_kb: Result<u64, MetricError>,
    pub memory: Result<MemorySnapshot, MetricError>,
    pub cpu: Result<CpuSample, MetricError>,
    pub sessions: Result<Vec<Session>, MetricError>,
    pub cores: usize,
}

/// The only state that crosses iterations: the previous used-physical
/// figure for the delta graph and the previous session-row count for
/// cursor repositioning. Passed by value in, returned updated.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PriorState {
    pub physical_used_gb: Option<f64>,
    pub session_rows: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Interrupted,
}

/// One isolated unit of concurrent execution: runs a single accessor call
/// on the blocking pool and publishes its result on a dedicated one-shot
/// channel, then terminates.
pub struct Worker<T> {
    rx: Option<oneshot::Receiver<Result<T, MetricError>>>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Worker<T> {
    pub fn spawn<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, MetricError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::task::spawn_blocking(move || {
            // The receiver may already be gone on the interrupt path.
            let _ = tx.send(f());
        });
        Self {
            rx: Some(rx),
            handle: Some(handle),
        }
    }

    /// Receives the worker's single result and reaps it. A channel that
    /// closed without a value reports as [`MetricError::WorkerGone`] rather
    /// than hanging; so does a second call.
    pub async fn outcome(&mut self) -> Result<T, MetricError> {
        let result = match self.rx.take() {
            Some(rx) => rx.await.unwrap_or(Err(MetricError::WorkerGone)),
            None => Err(MetricError::WorkerGone),
        };
        self.reap().await;
        result
    }

    /// Waits for the underlying task so no spawned unit outlives the run.
    async fn reap(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            // Join errors only mean the accessor panicked; the result
            // channel already reported that as WorkerGone.
            let _ = handle.await;
            self.handle = None;
        }
    }
}

/// The workers of one iteration. Inactive metrics hold no worker and
/// resolve to a not-sampled error the renderer never reads.
struct PendingWorkers {
    memory: Option<Worker<MemorySnapshot>>,
    sessions: Option<Worker<Vec<Session>>>,
    cpu: Option<Worker<CpuSample>>,
}

impl PendingWorkers {
    fn spawn(config: &RunConfig, source: &Arc<dyn MetricSource>) -> Self {
        let memory = config.show_system.then(|| {
            let source = Arc::clone(source);
            Worker::spawn(move || source.memory())
        });
        let sessions = config.show_users.then(|| {
            let source = Arc::clone(source);
            Worker::spawn(move || source.sessions())
        });
        // The cpu accessor blocks for the sample delay internally; spawned
        // last, joined last, it overlaps the reads above so an iteration
        // costs max(delay, other accessors), not the sum.
        let cpu = config.show_system.then(|| {
            let source = Arc::clone(source);
            let delay = config.delay();
            Worker::spawn(move || source.cpu(delay))
        });
        Self {
            memory,
            sessions,
            cpu,
        }
    }

    /// Joins the active workers in fixed order (memory, sessions, cpu).
    /// The order is for output determinism only; the channels are
    /// independent.
    async fn collect(
        &mut self,
    ) -> (
        Result<MemorySnapshot, MetricError>,
        Result<Vec<Session>, MetricError>,
        Result<CpuSample, MetricError>,
    ) {
        let memory = Self::join(&mut self.memory).await;
        let sessions = Self::join(&mut self.sessions).await;
        let cpu = Self::join(&mut self.cpu).await;
        (memory, sessions, cpu)
    }

    async fn join<T: Send + 'static>(slot: &mut Option<Worker<T>>) -> Result<T, MetricError> {
        match slot.as_mut() {
            Some(worker) => {
                let result = worker.outcome().await;
                *slot = None;
                result
            }
            None => Err(MetricError::Unavailable("not sampled".into())),
        }
    }

    /// Reaps whatever is still outstanding. Used on the interrupt path so
    /// no worker leaks past the end of the run.
    async fn drain(&mut self) {
        if let Some(worker) = self.memory.as_mut() {
            worker.reap().await;
        }
        if let Some(worker) = self.sessions.as_mut() {
            worker.reap().await;
        }
        if let Some(worker) = self.cpu.as_mut() {
            worker.reap().await;
        }
    }
}

/// Runs the full sampling loop: `samples` iterations, then the trailing
/// OS-identity block. `shutdown` resolving stops the run at the next
/// opportunity, after outstanding workers are reaped and the cursor is
/// moved to a clean line.
pub async fn run<W, S>(
    config: &RunConfig,
    source: Arc<dyn MetricSource>,
    renderer: &mut Renderer<W>,
    shutdown: S,
) -> io::Result<Outcome>
where
    W: Write,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    renderer.begin()?;

    let mut prior = PriorState::default();
    for index in 0..config.samples {
        let mut pending = PendingWorkers::spawn(config, &source);
        let joined = tokio::select! {
            results = pending.collect() => Some(results),
            _ = &mut shutdown => None,
        };
        let Some((memory, sessions, cpu)) = joined else {
            pending.drain().await;
            renderer.finish_line()?;
            return Ok(Outcome::Interrupted);
        };

        let frame = {
            #[cfg(feature = "sample-tracing")]
            let _span = tracing::debug_span!("sampler.assemble", index).entered();
            Frame {
                index,
                runtime_kb: source.runtime_memory_kb(),
                memory,
                cpu,
                sessions,
                cores: source.cores(),
            }
        };
        prior = match renderer.draw(&frame, prior) {
            Ok(next) => next,
            Err(err) => {
                // Never bail out mid-frame with the cursor inside the report.
                let _ = renderer.finish_line();
                return Err(err);
            }
        };

        // Without a cpu worker nothing holds the sample spacing.
        if !config.show_system && index + 1 < config.samples {
            tokio::select! {
                _ = tokio::time::sleep(config.delay()) => {}
                _ = &mut shutdown => {
                    renderer.finish_line()?;
                    return Ok(Outcome::Interrupted);
                }
            }
        }
    }

    renderer.finish(&source.identity())?;
    Ok(Outcome::Completed)
}
