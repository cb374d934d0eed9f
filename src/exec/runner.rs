// src/exec/runner.rs

//! Running a job's command(s) as local processes.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::dag::JobRef;
use crate::exec::outcome::{tail, JobOutcome};

/// How much trailing stderr to keep in a failed outcome.
const DIAGNOSTIC_BYTES: usize = 4096;

/// Trait abstracting how a dispatched job is executed.
///
/// Production code uses [`ShellRunner`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait JobRunner: Send + Sync {
    /// Run `job` to completion and report how it went.
    ///
    /// The returned future must not borrow `self`: the pool moves it into
    /// its own Tokio task.
    fn run(&self, job: JobRef) -> Pin<Box<dyn Future<Output = JobOutcome> + Send + 'static>>;
}

/// Runs each command with `sh -c`.
///
/// Both output pipes are streamed line by line into the log while the
/// process runs; only a bounded stderr tail is kept for the outcome. The
/// commands of a job group are independent, so all of them run and the
/// first failure is reported.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl JobRunner for ShellRunner {
    fn run(&self, job: JobRef) -> Pin<Box<dyn Future<Output = JobOutcome> + Send + 'static>> {
        Box::pin(async move { run_job(&job).await })
    }
}

async fn run_job(job: &JobRef) -> JobOutcome {
    let commands = job.payload().commands();
    let mut first_failure: Option<JobOutcome> = None;

    for (i, cmd_line) in commands.iter().enumerate() {
        let task = i + 1;
        let outcome = match run_command(job, task, cmd_line).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(job = %job.name(), task, error = %err, "job execution error");
                JobOutcome::failed(-1, format!("{err:#}"))
            }
        };

        if !outcome.is_success() && first_failure.is_none() {
            if commands.len() > 1 {
                warn!(job = %job.name(), task, "grouped command failed; running the rest");
            }
            first_failure = Some(outcome);
        }
    }

    first_failure.unwrap_or(JobOutcome::Success)
}

async fn run_command(job: &JobRef, task: usize, cmd_line: &str) -> Result<JobOutcome> {
    info!(
        job = %job.name(),
        index = job.index(),
        task,
        cmd = %cmd_line,
        "starting job process"
    );

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(cmd_line)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for job '{}'", job.name()))?;

    // Drain both pipes concurrently so a chatty child never blocks on a
    // full pipe buffer.
    let stdout = child
        .stdout
        .take()
        .map(|pipe| tokio::spawn(drain(pipe, job.name().to_string(), "stdout")));
    let stderr = child
        .stderr
        .take()
        .map(|pipe| tokio::spawn(drain(pipe, job.name().to_string(), "stderr")));

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of job '{}'", job.name()))?;

    if let Some(handle) = stdout {
        let _ = handle.await;
    }
    let diagnostic = match stderr {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };

    let code = status.code().unwrap_or(-1);
    info!(
        job = %job.name(),
        task,
        exit_code = code,
        success = status.success(),
        "job process exited"
    );

    if status.success() {
        Ok(JobOutcome::Success)
    } else {
        Ok(JobOutcome::failed(code, diagnostic))
    }
}

/// Log every line of `pipe` at debug and return the last
/// `DIAGNOSTIC_BYTES` of it.
async fn drain<R>(pipe: R, job: String, stream: &'static str) -> String
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut tail = LineTail::new(DIAGNOSTIC_BYTES);
    // Split on raw bytes: a non-UTF-8 line must not stop the draining.
    let mut segments = BufReader::new(pipe).split(b'\n');

    loop {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let line = String::from_utf8_lossy(&bytes);
                let line = line.trim_end_matches('\r');
                debug!(job = %job, stream, "{}", line);
                tail.push(line);
            }
            Ok(None) => break,
            Err(e) => {
                debug!(job = %job, stream, error = %e, "stopped reading process output");
                break;
            }
        }
    }

    tail.finish()
}

/// Most recent lines of a stream, holding roughly `max` bytes.
struct LineTail {
    lines: VecDeque<String>,
    bytes: usize,
    max: usize,
}

impl LineTail {
    fn new(max: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            max,
        }
    }

    fn push(&mut self, line: &str) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line.to_string());
        while self.bytes > self.max && self.lines.len() > 1 {
            if let Some(old) = self.lines.pop_front() {
                self.bytes -= old.len() + 1;
            }
        }
    }

    fn finish(self) -> String {
        let joined = Vec::from(self.lines).join("\n");
        tail(joined.as_bytes(), self.max)
    }
}
