// src/cluster/layout.rs

//! On-disk layout for cluster scripts and captured output.
//!
//! ```text
//! <output_root>/sge/jobs/<index>/<name>   job script
//! <output_root>/sge/stdout/<index>/       scheduler stdout
//! <output_root>/sge/stderr/<index>/       scheduler stderr
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::dag::{Job, JobRef};
use crate::errors::{JobDagError, Result};

/// Name of the scheduler-owned subtree under the output root.
pub const SCHEDULER_DIR: &str = "sge";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerLayout {
    root: PathBuf,
}

impl SchedulerLayout {
    /// Describe the layout without touching the filesystem.
    pub fn new(output_root: impl AsRef<Path>) -> Self {
        Self {
            root: output_root.as_ref().join(SCHEDULER_DIR),
        }
    }

    /// Create the full directory tree for `jobs`.
    ///
    /// Runs to completion before anything is submitted; each job then owns
    /// only its own index-keyed directories. Existing directories are reused.
    pub fn build(output_root: impl AsRef<Path>, jobs: &[JobRef]) -> Result<Self> {
        let layout = Self::new(output_root);

        for dir in [layout.jobs_dir(), layout.stdout_dir(), layout.stderr_dir()] {
            create_dir(&dir)?;
        }
        for job in jobs {
            create_dir(&layout.job_dir(job))?;
            create_dir(&layout.stdout_dir_for(job))?;
            create_dir(&layout.stderr_dir_for(job))?;
        }

        debug!(root = ?layout.root, jobs = jobs.len(), "built scheduler directories");
        Ok(layout)
    }

    pub fn scheduler_dir(&self) -> &Path {
        &self.root
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join("jobs")
    }

    pub fn stdout_dir(&self) -> PathBuf {
        self.root.join("stdout")
    }

    pub fn stderr_dir(&self) -> PathBuf {
        self.root.join("stderr")
    }

    pub fn job_dir(&self, job: &Job) -> PathBuf {
        self.jobs_dir().join(job.index().to_string())
    }

    pub fn stdout_dir_for(&self, job: &Job) -> PathBuf {
        self.stdout_dir().join(job.index().to_string())
    }

    pub fn stderr_dir_for(&self, job: &Job) -> PathBuf {
        self.stderr_dir().join(job.index().to_string())
    }

    /// Script location: the job's directory plus its name, with path
    /// separators replaced so a name can never escape the directory.
    pub fn script_path(&self, job: &Job) -> PathBuf {
        let file_name: String = job
            .name()
            .chars()
            .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
            .collect();
        self.job_dir(job).join(file_name)
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| JobDagError::DirectoryCreation {
        path: path.to_path_buf(),
        source,
    })
}
