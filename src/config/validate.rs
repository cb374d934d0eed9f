// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{JobDagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = JobDagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.job))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_global_config(cfg)?;
    validate_job_dependencies(cfg)?;
    validate_acyclic(cfg)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(JobDagError::ConfigError(
            "job file must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.workers == Some(0) {
        return Err(JobDagError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.group_size == 0 {
        return Err(JobDagError::ConfigError(
            "[config].group_size must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.qsub.trim().is_empty() {
        return Err(JobDagError::ConfigError(
            "[config].qsub must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_job_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        if job.cmd.trim().is_empty() {
            return Err(JobDagError::ConfigError(format!(
                "job '{name}' has an empty `cmd`"
            )));
        }
        for dep in job.after.iter() {
            if dep == name {
                return Err(JobDagError::ConfigError(format!(
                    "job '{name}' cannot depend on itself in `after`"
                )));
            }
            if !cfg.job.contains_key(dep) {
                return Err(JobDagError::ConfigError(format!(
                    "job '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

/// Edge direction is dependency -> dependent: `after = ["A"]` on B adds A -> B.
fn validate_acyclic(cfg: &RawConfigFile) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.job.keys() {
        graph.add_node(name.as_str());
    }
    for (name, job) in cfg.job.iter() {
        for dep in job.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_) => Ok(()),
        Err(cycle) => Err(JobDagError::CyclicDependency(format!(
            "cycle detected in job file involving job '{}'",
            cycle.node_id()
        ))),
    }
}
