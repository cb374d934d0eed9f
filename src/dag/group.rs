// src/dag/group.rs

//! Repacking dependency-free workloads into array job groups.
//!
//! Cluster schedulers charge per submission and cap the number of queued
//! entries, so many small independent commands are bundled into array
//! submissions of at most `group_size` tasks. Array tasks cannot express
//! per-task ordering, so this only applies when no job has dependencies.

use tracing::debug;

use crate::dag::job::{Job, JobRef};
use crate::errors::{JobDagError, Result};

/// Default maximum number of tasks per array submission.
pub const DEFAULT_GROUP_SIZE: usize = 10_000;

/// Default name prefix for compiled job groups.
pub const DEFAULT_GROUP_PREFIX: &str = "jobdag_JG";

/// Bundle `commands` into ⌈N/G⌉ job groups named `<prefix>_1`, `<prefix>_2`, …
///
/// Concatenating the groups' command lists in order reproduces `commands`
/// exactly.
pub fn compile_job_groups(
    commands: &[String],
    prefix: &str,
    group_size: usize,
) -> Result<Vec<JobRef>> {
    if group_size == 0 {
        return Err(JobDagError::InvalidGroupSize);
    }

    let groups: Vec<JobRef> = commands
        .chunks(group_size)
        .enumerate()
        .map(|(i, chunk)| Job::group(format!("{prefix}_{}", i + 1), chunk.to_vec()))
        .collect::<Result<_>>()?;

    debug!(
        commands = commands.len(),
        group_size,
        groups = groups.len(),
        "compiled job groups"
    );

    Ok(groups)
}

/// Compile already-built, dependency-free jobs into job groups.
///
/// Command lines are taken in the order the jobs are given; grouped inputs
/// contribute all of their commands in order.
pub fn compile_job_groups_from_jobs(
    jobs: &[JobRef],
    prefix: &str,
    group_size: usize,
) -> Result<Vec<JobRef>> {
    let mut commands = Vec::new();
    for job in jobs {
        if job.dependency_count() > 0 {
            return Err(JobDagError::DependenciesPresent(job.name().to_string()));
        }
        commands.extend(job.payload().commands().iter().cloned());
    }

    compile_job_groups(&commands, prefix, group_size)
}
