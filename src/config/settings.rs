// src/config/settings.rs

//! Effective run settings: job-file `[config]` values with command-line
//! overrides applied on top.

use std::path::PathBuf;

use crate::cluster::ClusterConfig;
use crate::config::model::ConfigSection;
use crate::errors::{JobDagError, Result};
use crate::types::SchedulerBackend;

/// Values that take precedence over the job file when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub scheduler: Option<SchedulerBackend>,
    pub workers: Option<usize>,
    pub outdir: Option<PathBuf>,
    pub group_size: Option<usize>,
    pub group_prefix: Option<String>,
    /// Replaces `[config].sge_args` when non-empty.
    pub sge_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub scheduler: SchedulerBackend,
    /// Local pool width; `None` means host parallelism.
    pub workers: Option<usize>,
    pub cluster: ClusterConfig,
}

impl RunSettings {
    pub fn resolve(section: &ConfigSection, overrides: &SettingsOverrides) -> Result<Self> {
        let workers = overrides.workers.or(section.workers);
        if workers == Some(0) {
            return Err(JobDagError::InvalidWorkerCount);
        }

        let group_size = overrides.group_size.unwrap_or(section.group_size);
        if group_size == 0 {
            return Err(JobDagError::InvalidGroupSize);
        }

        let mut cluster = ClusterConfig::new(
            overrides
                .outdir
                .clone()
                .unwrap_or_else(|| section.outdir.clone()),
        );
        cluster.qsub_program = section.qsub.clone();
        cluster.qstat_program = section.qstat.clone();
        cluster.group_size = group_size;
        cluster.group_prefix = overrides
            .group_prefix
            .clone()
            .unwrap_or_else(|| section.group_prefix.clone());
        cluster.extra_args = if overrides.sge_args.is_empty() {
            section.sge_args.clone()
        } else {
            overrides.sge_args.clone()
        };

        Ok(Self {
            scheduler: overrides.scheduler.unwrap_or(section.scheduler),
            workers,
            cluster,
        })
    }
}
