// src/cluster/client.rs

//! Talking to the cluster's submit and status commands.
//!
//! The adapter talks to a `ClusterClient` instead of spawning `qsub`
//! directly, so tests can substitute a client that records invocations.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::cluster::submit::SubmitInvocation;
use crate::exec::outcome::tail;
use crate::exec::JobOutcome;

/// Default status program.
pub const DEFAULT_QSTAT: &str = "qstat";

const DIAGNOSTIC_BYTES: usize = 4096;

/// Backoff for completion polling: start at `initial`, double after every
/// check that still finds the job queued, never exceed `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

impl PollPolicy {
    pub fn next_interval(&self, current: Duration) -> Duration {
        (current * 2).min(self.max)
    }
}

pub trait ClusterClient: Send {
    /// Run one submission and report whether the submitter accepted it.
    fn submit<'a>(
        &'a mut self,
        invocation: &'a SubmitInvocation,
    ) -> Pin<Box<dyn Future<Output = JobOutcome> + Send + 'a>>;

    /// Block until the named job has left the cluster queue.
    ///
    /// Returns a failed outcome only when completion could not be observed.
    fn wait_for<'a>(
        &'a mut self,
        job_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = JobOutcome> + Send + 'a>>;
}

/// Grid Engine client: `qsub` to submit, `qstat -j <name>` to poll.
#[derive(Debug, Clone)]
pub struct GridEngineClient {
    qstat: String,
    poll: PollPolicy,
}

impl GridEngineClient {
    pub fn new(qstat: impl Into<String>, poll: PollPolicy) -> Self {
        Self {
            qstat: qstat.into(),
            poll,
        }
    }
}

impl Default for GridEngineClient {
    fn default() -> Self {
        Self::new(DEFAULT_QSTAT, PollPolicy::default())
    }
}

impl ClusterClient for GridEngineClient {
    fn submit<'a>(
        &'a mut self,
        invocation: &'a SubmitInvocation,
    ) -> Pin<Box<dyn Future<Output = JobOutcome> + Send + 'a>> {
        Box::pin(async move {
            debug!(job = %invocation.job_name, cmd = %invocation, "submitting job");

            let output = Command::new(&invocation.program)
                .args(invocation.args())
                .stdin(Stdio::null())
                .output()
                .await;

            match output {
                Ok(out) if out.status.success() => {
                    let response = String::from_utf8_lossy(&out.stdout);
                    info!(
                        job = %invocation.job_name,
                        response = %response.trim(),
                        "job submitted"
                    );
                    JobOutcome::Success
                }
                Ok(out) => {
                    let code = out.status.code().unwrap_or(-1);
                    let mut diagnostic = tail(&out.stderr, DIAGNOSTIC_BYTES);
                    if diagnostic.is_empty() {
                        diagnostic = tail(&out.stdout, DIAGNOSTIC_BYTES);
                    }
                    warn!(
                        job = %invocation.job_name,
                        exit_code = code,
                        %diagnostic,
                        "submission command failed"
                    );
                    JobOutcome::failed(code, diagnostic)
                }
                Err(e) => {
                    warn!(
                        job = %invocation.job_name,
                        program = %invocation.program,
                        error = %e,
                        "could not run submission command"
                    );
                    JobOutcome::failed(-1, format!("spawning '{}': {e}", invocation.program))
                }
            }
        })
    }

    fn wait_for<'a>(
        &'a mut self,
        job_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = JobOutcome> + Send + 'a>> {
        Box::pin(async move {
            let mut interval = self.poll.initial;

            loop {
                tokio::time::sleep(interval).await;

                let status = Command::new(&self.qstat)
                    .arg("-j")
                    .arg(job_name)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;

                match status {
                    // qstat knows the job: still queued or running.
                    Ok(s) if s.success() => {
                        interval = self.poll.next_interval(interval);
                        debug!(job = %job_name, next_check = ?interval, "job still in queue");
                    }
                    Ok(_) => {
                        debug!(job = %job_name, "job left the queue");
                        return JobOutcome::Success;
                    }
                    Err(e) => {
                        warn!(job = %job_name, error = %e, "could not run status command");
                        return JobOutcome::failed(
                            -1,
                            format!("spawning '{}': {e}", self.qstat),
                        );
                    }
                }
            }
        })
    }
}
