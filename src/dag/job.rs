// src/dag/job.rs

//! The unit of work: a named command (or bundle of commands) plus the jobs it
//! depends on, and the scheduler-owned state that adapters fill in.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::errors::{JobDagError, Result};

/// Shared handle to a job. A job may be depended upon by many others.
pub type JobRef = Arc<Job>;

/// Process-unique job index; keys the job's on-disk directories.
pub type JobIndex = u64;

static NEXT_JOB_INDEX: AtomicU64 = AtomicU64::new(1);

/// What a job actually runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPayload {
    /// One shell command line.
    Single(String),
    /// Independent commands bundled into one array submission. The task
    /// count is the number of commands.
    Grouped { commands: Vec<String> },
}

impl JobPayload {
    /// Number of array tasks this payload expands to.
    pub fn task_count(&self) -> usize {
        match self {
            JobPayload::Single(_) => 1,
            JobPayload::Grouped { commands } => commands.len(),
        }
    }

    /// All command lines carried by this payload, in order.
    pub fn commands(&self) -> &[String] {
        match self {
            JobPayload::Single(cmd) => std::slice::from_ref(cmd),
            JobPayload::Grouped { commands } => commands,
        }
    }
}

/// Mutable state populated by the scheduler adapters, never by callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobState {
    pub submitted: bool,
    pub script_path: Option<PathBuf>,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
}

pub struct Job {
    name: String,
    index: JobIndex,
    payload: JobPayload,
    dependencies: Mutex<Vec<JobRef>>,
    state: Mutex<JobState>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Job {
    /// Create a single-command job with no dependencies.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> JobRef {
        Self::with_payload(name.into(), JobPayload::Single(command.into()))
    }

    /// Create a job group bundling independent commands. A group needs at
    /// least one command: its array range is `1..=commands.len()`.
    pub fn group(name: impl Into<String>, commands: Vec<String>) -> Result<JobRef> {
        let name = name.into();
        if commands.is_empty() {
            return Err(JobDagError::EmptyGroup(name));
        }
        Ok(Self::with_payload(name, JobPayload::Grouped { commands }))
    }

    fn with_payload(name: String, payload: JobPayload) -> JobRef {
        let index = NEXT_JOB_INDEX.fetch_add(1, Ordering::Relaxed);
        Arc::new(Self {
            name,
            index,
            payload,
            dependencies: Mutex::new(Vec::new()),
            state: Mutex::new(JobState::default()),
        })
    }

    /// Record that `dep` must finish before this job may start.
    ///
    /// Job groups are always leaves, so they reject dependencies. Adding the
    /// same dependency twice is a no-op.
    pub fn add_dependency(&self, dep: &JobRef) -> Result<()> {
        if self.is_group() {
            return Err(JobDagError::GroupedDependency(self.name.clone()));
        }

        let mut deps = lock(&self.dependencies);
        if deps.iter().any(|d| d.index == dep.index) {
            return Ok(());
        }
        debug!(job = %self.name, dep = %dep.name, "adding dependency");
        deps.push(Arc::clone(dep));
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> JobIndex {
        self.index
    }

    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    pub fn is_group(&self) -> bool {
        matches!(self.payload, JobPayload::Grouped { .. })
    }

    pub fn task_count(&self) -> usize {
        self.payload.task_count()
    }

    /// Snapshot of the direct dependencies.
    pub fn dependencies(&self) -> Vec<JobRef> {
        lock(&self.dependencies).clone()
    }

    pub fn dependency_count(&self) -> usize {
        lock(&self.dependencies).len()
    }

    /// Snapshot of the scheduler-owned state.
    pub fn state(&self) -> JobState {
        lock(&self.state).clone()
    }

    pub fn is_submitted(&self) -> bool {
        lock(&self.state).submitted
    }

    /// Flip `submitted` to true. It never reverts.
    pub fn mark_submitted(&self) {
        lock(&self.state).submitted = true;
    }

    pub fn set_script_path(&self, path: impl AsRef<Path>) {
        lock(&self.state).script_path = Some(path.as_ref().to_path_buf());
    }

    pub fn set_output_paths(&self, stdout: impl AsRef<Path>, stderr: impl AsRef<Path>) {
        let mut state = lock(&self.state);
        state.stdout_path = Some(stdout.as_ref().to_path_buf());
        state.stderr_path = Some(stderr.as_ref().to_path_buf());
    }
}

// Dependencies are printed by name only: a cyclic graph would otherwise
// recurse forever.
impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deps: Vec<String> = lock(&self.dependencies)
            .iter()
            .map(|d| d.name.clone())
            .collect();
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("payload", &self.payload)
            .field("dependencies", &deps)
            .field("state", &*lock(&self.state))
            .finish()
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Job {}

impl Hash for Job {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

/// Reject runs where two distinct jobs share a name. Hold directives refer
/// to jobs by name.
pub fn ensure_unique_names(jobs: &[JobRef]) -> Result<()> {
    let mut seen = std::collections::HashMap::new();
    for job in jobs {
        if let Some(prev) = seen.insert(job.name(), job.index()) {
            if prev != job.index() {
                return Err(JobDagError::DuplicateJobName(job.name().to_string()));
            }
        }
    }
    Ok(())
}
