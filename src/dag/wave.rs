// src/dag/wave.rs

//! Submission waves for the cluster backend.
//!
//! A job is submittable once every one of its dependencies has been
//! *submitted* (not completed); the cluster's hold directive takes care of
//! execution order from there.

use std::collections::HashSet;
use std::sync::Arc;

use crate::dag::job::{JobIndex, JobRef};
use crate::errors::{JobDagError, Result};

/// Jobs in `all` that are not yet submitted and whose dependencies all are.
///
/// Pure: neither `all` nor the jobs' own state is consulted beyond their
/// dependency lists. Order follows `all`.
pub fn next_wave(all: &[JobRef], submitted: &HashSet<JobIndex>) -> Vec<JobRef> {
    all.iter()
        .filter(|job| !submitted.contains(&job.index()))
        .filter(|job| {
            job.dependencies()
                .iter()
                .all(|dep| submitted.contains(&dep.index()))
        })
        .map(Arc::clone)
        .collect()
}

/// Split `all` into successive submission waves.
///
/// The number of waves equals the depth of the dependency graph. Fails
/// instead of spinning if some job can never become submittable (its
/// dependency is outside `all`, or the graph has a cycle).
pub fn plan_waves(all: &[JobRef]) -> Result<Vec<Vec<JobRef>>> {
    let mut submitted: HashSet<JobIndex> = HashSet::with_capacity(all.len());
    let mut waves = Vec::new();

    while submitted.len() < all.len() {
        let wave = next_wave(all, &submitted);
        if wave.is_empty() {
            let stuck: Vec<&str> = all
                .iter()
                .filter(|j| !submitted.contains(&j.index()))
                .map(|j| j.name())
                .collect();
            return Err(JobDagError::UnsatisfiableDependencies(format!(
                "no job can be submitted; still waiting: {}",
                stuck.join(", ")
            )));
        }

        submitted.extend(wave.iter().map(|j| j.index()));
        waves.push(wave);
    }

    Ok(waves)
}
