// src/local/tracker.rs

//! Dependency-satisfaction bookkeeping for the local worker pool.
//!
//! This is a synchronous, deterministic core: no Tokio, channels or
//! processes. The pool feeds it completions one at a time and dispatches
//! whatever it reports as newly ready.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dag::{JobIndex, JobRef};
use crate::errors::{JobDagError, Result};

/// Per-job state as seen by the local pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Some dependency has not completed yet.
    Waiting,
    /// All dependencies succeeded; waiting for a free worker.
    Ready,
    Running,
    Succeeded,
    Failed,
    /// An upstream job failed; this job will never run.
    Blocked,
}

impl TrackState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TrackState::Succeeded | TrackState::Failed | TrackState::Blocked
        )
    }
}

#[derive(Debug)]
struct Node {
    job: JobRef,
    /// Dependencies that have not yet succeeded.
    remaining: usize,
    dependents: Vec<JobIndex>,
    state: TrackState,
}

/// Result of feeding one completion into the tracker.
#[derive(Debug, Clone, Default)]
pub struct TrackerStep {
    /// Jobs whose last outstanding dependency just succeeded.
    pub newly_ready: Vec<JobRef>,
    /// Jobs that can no longer run because of this failure.
    pub newly_blocked: Vec<JobRef>,
}

#[derive(Debug)]
pub struct DependencyTracker {
    nodes: HashMap<JobIndex, Node>,
    /// Input order, for deterministic iteration.
    order: Vec<JobIndex>,
}

impl DependencyTracker {
    /// Build a tracker over a flattened job set.
    ///
    /// Every dependency must itself be in `jobs`, otherwise the dependent
    /// could never start.
    pub fn new(jobs: &[JobRef]) -> Result<Self> {
        let mut nodes: HashMap<JobIndex, Node> = HashMap::with_capacity(jobs.len());
        let mut order = Vec::with_capacity(jobs.len());

        for job in jobs {
            if nodes.contains_key(&job.index()) {
                continue;
            }
            order.push(job.index());
            nodes.insert(
                job.index(),
                Node {
                    job: Arc::clone(job),
                    remaining: job.dependency_count(),
                    dependents: Vec::new(),
                    state: TrackState::Waiting,
                },
            );
        }

        for &index in &order {
            let job = Arc::clone(&nodes[&index].job);
            for dep in job.dependencies() {
                let Some(dep_node) = nodes.get_mut(&dep.index()) else {
                    return Err(JobDagError::UnsatisfiableDependencies(format!(
                        "job '{}' depends on '{}', which is not part of this run",
                        job.name(),
                        dep.name()
                    )));
                };
                dep_node.dependents.push(index);
            }
        }

        Ok(Self { nodes, order })
    }

    /// Mark every dependency-free job `Ready` and return them.
    pub fn start(&mut self) -> Vec<JobRef> {
        let mut ready = Vec::new();
        for index in &self.order {
            if let Some(node) = self.nodes.get_mut(index) {
                if node.state == TrackState::Waiting && node.remaining == 0 {
                    node.state = TrackState::Ready;
                    ready.push(Arc::clone(&node.job));
                }
            }
        }
        debug!(ready = ready.len(), total = self.order.len(), "initial ready jobs");
        ready
    }

    /// Record that a `Ready` job was handed to a worker.
    pub fn mark_running(&mut self, index: JobIndex) {
        match self.nodes.get_mut(&index) {
            Some(node) if node.state == TrackState::Ready => node.state = TrackState::Running,
            Some(node) => warn!(
                job = %node.job.name(),
                state = ?node.state,
                "mark_running on a job that is not Ready; ignoring"
            ),
            None => warn!(index, "mark_running for unknown job; ignoring"),
        }
    }

    /// Feed the completion of a running job.
    ///
    /// On success, dependents whose last outstanding dependency this was
    /// become `Ready`. On failure, every job downstream that has not run yet
    /// becomes `Blocked`.
    pub fn complete(&mut self, index: JobIndex, success: bool) -> TrackerStep {
        let mut step = TrackerStep::default();

        let dependents = match self.nodes.get_mut(&index) {
            Some(node) if node.state == TrackState::Running => {
                node.state = if success {
                    TrackState::Succeeded
                } else {
                    TrackState::Failed
                };
                node.dependents.clone()
            }
            Some(node) => {
                warn!(
                    job = %node.job.name(),
                    state = ?node.state,
                    "completion for a job that is not Running; ignoring"
                );
                return step;
            }
            None => {
                warn!(index, "completion for unknown job; ignoring");
                return step;
            }
        };

        if success {
            for dep_index in dependents {
                if let Some(node) = self.nodes.get_mut(&dep_index) {
                    node.remaining = node.remaining.saturating_sub(1);
                    if node.remaining == 0 && node.state == TrackState::Waiting {
                        debug!(job = %node.job.name(), "dependencies completed; marking Ready");
                        node.state = TrackState::Ready;
                        step.newly_ready.push(Arc::clone(&node.job));
                    }
                }
            }
        } else {
            let mut stack = dependents;
            while let Some(dep_index) = stack.pop() {
                if let Some(node) = self.nodes.get_mut(&dep_index) {
                    if node.state == TrackState::Waiting {
                        debug!(
                            job = %node.job.name(),
                            "marking dependent Blocked due to upstream failure"
                        );
                        node.state = TrackState::Blocked;
                        step.newly_blocked.push(Arc::clone(&node.job));
                        stack.extend(node.dependents.iter().copied());
                    }
                }
            }
        }

        step
    }

    pub fn state_of(&self, index: JobIndex) -> Option<TrackState> {
        self.nodes.get(&index).map(|n| n.state)
    }

    /// True once every job is terminal.
    pub fn is_finished(&self) -> bool {
        self.nodes.values().all(|n| n.state.is_terminal())
    }

    /// Number of jobs that ran and failed.
    pub fn failures(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| n.state == TrackState::Failed)
            .count()
    }

    /// Jobs blocked by an upstream failure, in input order.
    pub fn blocked(&self) -> Vec<JobRef> {
        self.order
            .iter()
            .filter_map(|i| self.nodes.get(i))
            .filter(|n| n.state == TrackState::Blocked)
            .map(|n| Arc::clone(&n.job))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
