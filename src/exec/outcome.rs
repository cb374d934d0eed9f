// src/exec/outcome.rs

//! Per-job outcomes and the aggregate report both backends return.

use crate::dag::{JobIndex, JobRef};
use crate::errors::{JobDagError, Result};

/// Outcome of one external process (a submission for the cluster backend,
/// the job itself for the local backend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failed {
        exit_code: i32,
        /// Captured diagnostic output (usually stderr), possibly truncated.
        diagnostic: String,
    },
}

impl JobOutcome {
    pub fn failed(exit_code: i32, diagnostic: impl Into<String>) -> Self {
        JobOutcome::Failed {
            exit_code,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job: String,
    pub index: JobIndex,
    pub outcome: JobOutcome,
}

/// What a scheduling run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One entry per job that was submitted or executed, in completion order.
    pub outcomes: Vec<JobReport>,
    /// Job names per submission wave (cluster) or dispatch batch (local).
    pub waves: Vec<Vec<String>>,
    /// Jobs never dispatched because an upstream job failed.
    pub blocked: Vec<String>,
    /// Cumulative number of failed jobs.
    pub failures: usize,
}

impl RunReport {
    pub fn record(&mut self, job: &JobRef, outcome: JobOutcome) {
        if !outcome.is_success() {
            self.failures += 1;
        }
        self.outcomes.push(JobReport {
            job: job.name().to_string(),
            index: job.index(),
            outcome,
        });
    }

    pub fn is_success(&self) -> bool {
        self.failures == 0 && self.blocked.is_empty()
    }

    pub fn outcome_of(&self, job: &str) -> Option<&JobOutcome> {
        self.outcomes
            .iter()
            .find(|r| r.job == job)
            .map(|r| &r.outcome)
    }

    /// Turn a report with failures into a hard error.
    pub fn into_result(self) -> Result<Self> {
        if self.failures > 0 {
            return Err(JobDagError::JobsFailed {
                failures: self.failures,
                total: self.outcomes.len() + self.blocked.len(),
            });
        }
        Ok(self)
    }
}

/// Keep at most `max` trailing bytes of process output, on a char boundary.
pub(crate) fn tail(output: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(output);
    let text = text.trim_end();
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
