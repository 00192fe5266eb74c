//! Batch scheduler.
//!
//! Admits at most N movies at a time, in scan order, and polls their
//! statuses on a fixed interval to drive aggregate progress and detect
//! completion. Per-movie failures never stop the batch; cancellation is a
//! cooperative flag every orchestrator checks.

use crate::scan::ScannedMovie;
use deinterlace_media::MovieIoRegistry;
use deinterlace_pipeline::{MovieOrchestrator, MovieStatus};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// The admission limit when none is given: half the CPUs.
///
/// Full saturation degrades throughput here; the writer and codec threads
/// contend with the per-movie pumps.
pub fn default_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);
    (cpus / 2).max(1)
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum movies processed at once.
    pub concurrency: usize,
    /// Delay between admission/progress passes.
    pub poll_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// One movie job: paths plus the orchestrator that owns its status.
pub struct MovieJob {
    /// The input movie path.
    pub input: PathBuf,
    /// The output movie path.
    pub output: PathBuf,
    orchestrator: MovieOrchestrator,
    status: Arc<MovieStatus>,
}

impl MovieJob {
    /// The job's shared status.
    pub fn status(&self) -> &MovieStatus {
        &self.status
    }
}

/// A snapshot handed to the progress callback on every poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchProgress {
    /// Mean progress across all jobs.
    pub progress: f64,
    /// Jobs currently running.
    pub running: usize,
    /// Jobs in a terminal state.
    pub completed: usize,
    /// All jobs.
    pub total: usize,
}

/// Final tally of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// All jobs.
    pub total: usize,
    /// Jobs that completed successfully.
    pub succeeded: usize,
    /// Jobs that completed unsuccessfully (failed or cancelled).
    pub failed: usize,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// Wall time of the run.
    pub elapsed: Duration,
}

/// The batch: a job vector and the loop that drains it.
pub struct Batch {
    jobs: Vec<MovieJob>,
    config: BatchConfig,
    cancel: Arc<AtomicBool>,
}

impl Batch {
    /// Build jobs from scanned movies.
    pub fn new(
        movies: Vec<ScannedMovie>,
        registry: Arc<MovieIoRegistry>,
        config: BatchConfig,
    ) -> Self {
        let jobs = movies
            .into_iter()
            .map(|movie| {
                // Resolve the backend lazily inside the orchestrator via a
                // registry view, so an unhandled container fails its own
                // movie at setup instead of the whole batch.
                let provider = RegistryProvider {
                    registry: Arc::clone(&registry),
                };
                let orchestrator = MovieOrchestrator::new(
                    movie.input.clone(),
                    movie.output.clone(),
                    Arc::new(provider),
                );
                let status = orchestrator.status();
                MovieJob {
                    input: movie.input,
                    output: movie.output,
                    orchestrator,
                    status,
                }
            })
            .collect();
        Self {
            jobs,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The jobs in scan order.
    pub fn jobs(&self) -> &[MovieJob] {
        &self.jobs
    }

    /// Token a signal handler can set to request cancellation.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Cancel every job: running movies stop cooperatively, never-started
    /// movies complete immediately as unsuccessful.
    pub fn cancel_all(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        for job in &self.jobs {
            if job.status.has_started() {
                job.orchestrator.cancel();
            } else if job.status.mark_started() {
                job.status.complete(false);
            }
        }
    }

    /// Run the batch to completion, invoking `on_progress` every poll.
    pub fn run(&mut self, mut on_progress: impl FnMut(BatchProgress)) -> BatchReport {
        let started_at = Instant::now();
        info!(
            jobs = self.jobs.len(),
            concurrency = self.config.concurrency,
            "batch starting"
        );

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                self.cancel_all();
            } else {
                self.admit();
            }

            on_progress(self.progress());

            if self.jobs.iter().all(|j| j.status.has_completed()) {
                break;
            }
            std::thread::sleep(self.config.poll_interval);
        }

        let succeeded = self
            .jobs
            .iter()
            .filter(|j| j.status.succeeded())
            .count();
        let report = BatchReport {
            total: self.jobs.len(),
            succeeded,
            failed: self.jobs.len() - succeeded,
            cancelled: self.cancel.load(Ordering::Relaxed),
            elapsed: started_at.elapsed(),
        };
        info!(?report, "batch finished");
        report
    }

    /// Start not-yet-started jobs, in scan order, up to the admission
    /// limit.
    fn admit(&self) {
        let running = self
            .jobs
            .iter()
            .filter(|j| j.status.is_running())
            .count();
        let mut admit = self.config.concurrency.saturating_sub(running);
        if admit == 0 {
            return;
        }
        for job in &self.jobs {
            if admit == 0 {
                break;
            }
            if !job.status.has_started() {
                debug!(input = %job.input.display(), "admitting movie");
                job.orchestrator.start();
                admit -= 1;
            }
        }
    }

    fn progress(&self) -> BatchProgress {
        let total = self.jobs.len();
        let completed = self
            .jobs
            .iter()
            .filter(|j| j.status.has_completed())
            .count();
        let running = self
            .jobs
            .iter()
            .filter(|j| j.status.is_running())
            .count();
        let progress = if total == 0 {
            1.0
        } else {
            self.jobs.iter().map(|j| j.status.progress()).sum::<f64>() / total as f64
        };
        BatchProgress {
            progress,
            running,
            completed,
            total,
        }
    }
}

/// A `MovieIo` view over a registry: resolves the real backend per path.
struct RegistryProvider {
    registry: Arc<MovieIoRegistry>,
}

impl deinterlace_media::MovieIo for RegistryProvider {
    fn name(&self) -> &str {
        "registry"
    }

    fn handles_extension(&self, extension: &str) -> bool {
        self.registry.handles_extension(extension)
    }

    fn output_extension(&self) -> &str {
        "mov"
    }

    fn open(
        &self,
        path: &std::path::Path,
    ) -> deinterlace_media::Result<Box<dyn deinterlace_media::MovieReader>> {
        self.registry.for_path(path)?.open(path)
    }

    fn create(
        &self,
        path: &std::path::Path,
    ) -> deinterlace_media::Result<Box<dyn deinterlace_media::MovieWriter>> {
        self.registry.for_path(path)?.create(path)
    }
}
