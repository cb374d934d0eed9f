// src/config/jobs.rs

//! Turning a validated job file into a job graph.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::config::model::ConfigFile;
use crate::dag::{Job, JobRef};
use crate::errors::{JobDagError, Result};

/// Build one job per `[job.<name>]` section, wired to its `after` list.
pub fn build_job_map(cfg: &ConfigFile) -> Result<BTreeMap<String, JobRef>> {
    let jobs: BTreeMap<String, JobRef> = cfg
        .job
        .iter()
        .map(|(name, jc)| (name.clone(), Job::new(name.clone(), jc.cmd.clone())))
        .collect();

    for (name, jc) in cfg.job.iter() {
        let job = &jobs[name];
        for dep_name in jc.after.iter() {
            let dep = jobs.get(dep_name).ok_or_else(|| {
                JobDagError::ConfigError(format!(
                    "job '{name}' has unknown dependency '{dep_name}' in `after`"
                ))
            })?;
            job.add_dependency(dep)?;
        }
    }

    Ok(jobs)
}

/// Root jobs of the file: those no other job lists in `after`, in name
/// order. Every job is reachable from these.
pub fn build_jobs(cfg: &ConfigFile) -> Result<Vec<JobRef>> {
    let jobs = build_job_map(cfg)?;

    let depended_on: HashSet<&str> = cfg
        .job
        .values()
        .flat_map(|jc| jc.after.iter().map(String::as_str))
        .collect();

    Ok(jobs
        .iter()
        .filter(|(name, _)| !depended_on.contains(name.as_str()))
        .map(|(_, job)| Arc::clone(job))
        .collect())
}
