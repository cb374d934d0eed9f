// src/cluster/submit.rs

//! Cluster submission invocations, built as argument vectors.
//!
//! Every field becomes one or more discrete argv entries. Nothing is ever
//! joined into a shell string, so names and paths containing spaces or shell
//! metacharacters reach the submitter unchanged.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use crate::cluster::layout::SchedulerLayout;
use crate::dag::{Job, JobPayload};

/// Default submission program.
pub const DEFAULT_QSUB: &str = "qsub";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitInvocation {
    pub program: String,
    pub job_name: String,
    /// `-V`: export the submitting environment to the job.
    pub propagate_env: bool,
    /// `-cwd`: run in the current working directory.
    pub use_cwd: bool,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    /// `-t start:end` for array jobs.
    pub task_range: Option<(usize, usize)>,
    /// `-hold_jid a,b`: names of jobs the cluster must finish first.
    pub hold: Vec<String>,
    /// Caller-supplied arguments, inserted before the script path.
    pub extra_args: Vec<String>,
    pub script: PathBuf,
}

impl SubmitInvocation {
    pub fn for_job(
        program: impl Into<String>,
        job: &Job,
        layout: &SchedulerLayout,
        extra_args: &[String],
    ) -> Self {
        let task_range = match job.payload() {
            JobPayload::Single(_) => None,
            JobPayload::Grouped { commands } => Some((1, commands.len())),
        };

        Self {
            program: program.into(),
            job_name: job.name().to_string(),
            propagate_env: true,
            use_cwd: true,
            stdout: layout.stdout_dir_for(job),
            stderr: layout.stderr_dir_for(job),
            task_range,
            hold: job
                .dependencies()
                .iter()
                .map(|d| d.name().to_string())
                .collect(),
            extra_args: extra_args.to_vec(),
            script: layout.script_path(job),
        }
    }

    /// Arguments to pass to `program`, in order.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        if self.propagate_env {
            args.push("-V".into());
        }
        args.push("-N".into());
        args.push(self.job_name.clone().into());
        if self.use_cwd {
            args.push("-cwd".into());
        }
        args.push("-o".into());
        args.push(self.stdout.clone().into());
        args.push("-e".into());
        args.push(self.stderr.clone().into());

        if let Some((start, end)) = self.task_range {
            args.push("-t".into());
            args.push(format!("{start}:{end}").into());
        }

        if !self.hold.is_empty() {
            args.push("-hold_jid".into());
            args.push(self.hold.join(",").into());
        }

        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(self.script.clone().into());
        args
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<OsString> {
        let mut argv = vec![OsString::from(&self.program)];
        argv.extend(self.args());
        argv
    }
}

/// Human-readable rendering for logs only; never executed.
impl fmt::Display for SubmitInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .argv()
            .iter()
            .map(|a| format!("{:?}", a.to_string_lossy()))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}
