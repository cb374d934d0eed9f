// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::dag::group::{DEFAULT_GROUP_PREFIX, DEFAULT_GROUP_SIZE};
use crate::types::SchedulerBackend;

/// Job file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// scheduler = "sge"
/// sge_args = ["-q", "all.q"]
///
/// [job.nucmer_000001]
/// cmd = "nucmer --mum -p out/a_vs_b a.fna b.fna"
///
/// [job.filter_000001]
/// cmd = "delta-filter -1 out/a_vs_b.delta > out/a_vs_b.filter"
/// after = ["nucmer_000001"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Jobs keyed by name.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// A validated job file: every `after` reference resolves and the graph is
/// acyclic. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub job: BTreeMap<String, JobConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, job: BTreeMap<String, JobConfig>) -> Self {
        Self { config, job }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigSection {
    #[serde(default)]
    pub scheduler: SchedulerBackend,

    /// Local pool width; host parallelism when unset.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Output root for scheduler scripts and captured output.
    #[serde(default = "default_outdir")]
    pub outdir: PathBuf,

    #[serde(default = "default_group_prefix")]
    pub group_prefix: String,

    /// Maximum tasks per array submission.
    #[serde(default = "default_group_size")]
    pub group_size: usize,

    #[serde(default = "default_qsub")]
    pub qsub: String,

    #[serde(default = "default_qstat")]
    pub qstat: String,

    /// Extra arguments handed to every `qsub` call.
    #[serde(default)]
    pub sge_args: Vec<String>,
}

fn default_outdir() -> PathBuf {
    PathBuf::from("jobdag_out")
}

fn default_group_prefix() -> String {
    DEFAULT_GROUP_PREFIX.to_string()
}

fn default_group_size() -> usize {
    DEFAULT_GROUP_SIZE
}

fn default_qsub() -> String {
    crate::cluster::submit::DEFAULT_QSUB.to_string()
}

fn default_qstat() -> String {
    crate::cluster::client::DEFAULT_QSTAT.to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            scheduler: SchedulerBackend::default(),
            workers: None,
            outdir: default_outdir(),
            group_prefix: default_group_prefix(),
            group_size: default_group_size(),
            qsub: default_qsub(),
            qstat: default_qstat(),
            sge_args: Vec::new(),
        }
    }
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobConfig {
    /// Shell command line to run.
    pub cmd: String,

    /// Jobs that must finish before this one starts.
    #[serde(default)]
    pub after: Vec<String>,
}
