use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which execution backend drives a job graph.
///
/// - `Local`: bounded in-process worker pool; a job starts only once all of
///   its dependencies have completed.
/// - `Sge`: Grid Engine style cluster; jobs are submitted in waves and the
///   cluster's hold mechanism orders execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerBackend {
    #[default]
    Local,
    Sge,
}

impl FromStr for SchedulerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "multiprocessing" => Ok(SchedulerBackend::Local),
            "sge" | "cluster" => Ok(SchedulerBackend::Sge),
            other => Err(format!(
                "invalid scheduler: {other} (expected \"local\" or \"sge\")"
            )),
        }
    }
}

impl fmt::Display for SchedulerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerBackend::Local => write!(f, "local"),
            SchedulerBackend::Sge => write!(f, "sge"),
        }
    }
}
