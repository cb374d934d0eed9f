// src/local/pool.rs

//! Bounded in-process worker pool.
//!
//! A single coordinator loop owns the [`DependencyTracker`]. Each dispatched
//! job runs in its own Tokio task and reports back over an mpsc channel, so
//! counter updates are serialised and a completion wakes exactly the jobs it
//! unblocks. At most `workers` jobs are in flight at any instant.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::{ensure_unique_names, flatten, JobRef};
use crate::errors::{JobDagError, Result};
use crate::exec::{JobOutcome, JobRunner, RunReport, ShellRunner};
use crate::local::tracker::DependencyTracker;

/// Host parallelism, falling back to a single worker if it can't be read.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

struct Completion {
    job: JobRef,
    outcome: JobOutcome,
}

pub struct LocalPool<R: JobRunner = ShellRunner> {
    workers: usize,
    runner: Arc<R>,
}

impl<R: JobRunner> fmt::Debug for LocalPool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalPool")
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl LocalPool<ShellRunner> {
    /// Pool running real `sh -c` processes. `None` means host parallelism.
    pub fn new(workers: Option<usize>) -> Result<Self> {
        Self::with_runner(workers.unwrap_or_else(default_workers), ShellRunner)
    }
}

impl<R: JobRunner + 'static> LocalPool<R> {
    pub fn with_runner(workers: usize, runner: R) -> Result<Self> {
        if workers == 0 {
            return Err(JobDagError::InvalidWorkerCount);
        }
        Ok(Self {
            workers,
            runner: Arc::new(runner),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every job reachable from `roots`, never starting a job before all
    /// of its dependencies have completed successfully.
    ///
    /// Jobs downstream of a failure are not run and are listed in
    /// [`RunReport::blocked`]. `RunReport::failures` counts jobs that ran
    /// and failed.
    pub async fn run_dependency_graph(&self, roots: &[JobRef]) -> Result<RunReport> {
        let jobs = flatten(roots)?;
        ensure_unique_names(&jobs)?;

        let mut tracker = DependencyTracker::new(&jobs)?;
        let mut ready: VecDeque<JobRef> = tracker.start().into();

        info!(
            jobs = jobs.len(),
            workers = self.workers,
            "running jobs with local worker pool"
        );

        let (tx, mut rx) = mpsc::channel::<Completion>(self.workers);
        let mut report = RunReport::default();
        let mut in_flight = 0usize;

        loop {
            let mut batch = Vec::new();
            while in_flight < self.workers {
                let Some(job) = ready.pop_front() else {
                    break;
                };
                tracker.mark_running(job.index());
                batch.push(job.name().to_string());
                self.dispatch(job, tx.clone());
                in_flight += 1;
            }
            if !batch.is_empty() {
                debug!(?batch, in_flight, "dispatched jobs");
                report.waves.push(batch);
            }

            if in_flight == 0 {
                break;
            }

            // The coordinator holds `tx`, so the channel cannot close here.
            let Some(Completion { job, outcome }) = rx.recv().await else {
                break;
            };
            in_flight -= 1;

            let step = tracker.complete(job.index(), outcome.is_success());
            if let JobOutcome::Failed { exit_code, .. } = &outcome {
                warn!(
                    job = %job.name(),
                    exit_code,
                    blocked = step.newly_blocked.len(),
                    "job failed; dependents will not run"
                );
            }
            report.record(&job, outcome);
            ready.extend(step.newly_ready);
        }

        report.blocked = tracker
            .blocked()
            .iter()
            .map(|j| j.name().to_string())
            .collect();

        if report.failures > 0 {
            warn!(
                failures = report.failures,
                blocked = report.blocked.len(),
                "local run finished with failures"
            );
        } else {
            info!(jobs = report.outcomes.len(), "local run completed without error");
        }

        Ok(report)
    }

    fn dispatch(&self, job: JobRef, tx: mpsc::Sender<Completion>) {
        job.mark_submitted();
        let fut = self.runner.run(Arc::clone(&job));

        tokio::spawn(async move {
            // A panicking runner must still free its slot.
            let outcome = match tokio::spawn(fut).await {
                Ok(outcome) => outcome,
                Err(e) => JobOutcome::failed(-1, format!("job task aborted: {e}")),
            };
            if tx.send(Completion { job, outcome }).await.is_err() {
                debug!("coordinator gone before completion could be reported");
            }
        });
    }
}
