// src/dag/resolver.rs

//! Flattening a set of root jobs into every job that has to run.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::dag::job::{JobIndex, JobRef};
use crate::errors::{JobDagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the current traversal path.
    InProgress,
    /// Fully explored, including all transitive dependencies.
    Done,
}

struct Frame {
    job: JobRef,
    deps: Vec<JobRef>,
    next: usize,
}

impl Frame {
    fn enter(job: &JobRef) -> Self {
        Self {
            job: Arc::clone(job),
            deps: job.dependencies(),
            next: 0,
        }
    }
}

/// Return the roots plus all of their transitive dependencies, each distinct
/// job exactly once.
///
/// The walk is an explicit-stack depth-first traversal, so deep graphs do not
/// grow the call stack. Jobs come back in first-discovery order; callers
/// should treat the result as a set. Revisiting a job that is still on the
/// current path yields [`JobDagError::CyclicDependency`].
pub fn flatten(roots: &[JobRef]) -> Result<Vec<JobRef>> {
    let mut marks: HashMap<JobIndex, Mark> = HashMap::new();
    let mut jobs: Vec<JobRef> = Vec::new();
    let mut max_depth = 0usize;

    for root in roots {
        if marks.contains_key(&root.index()) {
            continue;
        }

        marks.insert(root.index(), Mark::InProgress);
        jobs.push(Arc::clone(root));
        let mut stack = vec![Frame::enter(root)];

        loop {
            let depth = stack.len();
            max_depth = max_depth.max(depth);

            let Some(frame) = stack.last_mut() else {
                break;
            };

            if frame.next < frame.deps.len() {
                let dep = Arc::clone(&frame.deps[frame.next]);
                frame.next += 1;

                match marks.get(&dep.index()) {
                    Some(Mark::Done) => {}
                    Some(Mark::InProgress) => {
                        return Err(cycle_error(&stack, &dep));
                    }
                    None => {
                        trace!(job = %dep.name(), depth, "discovered dependency");
                        marks.insert(dep.index(), Mark::InProgress);
                        jobs.push(Arc::clone(&dep));
                        stack.push(Frame::enter(&dep));
                    }
                }
            } else {
                marks.insert(frame.job.index(), Mark::Done);
                stack.pop();
            }
        }
    }

    debug!(
        roots = roots.len(),
        jobs = jobs.len(),
        max_depth,
        "flattened job graph"
    );

    Ok(jobs)
}

fn cycle_error(stack: &[Frame], revisited: &JobRef) -> JobDagError {
    let start = stack
        .iter()
        .position(|f| f.job.index() == revisited.index())
        .unwrap_or(0);

    let mut path: Vec<&str> = stack[start..].iter().map(|f| f.job.name()).collect();
    path.push(revisited.name());

    JobDagError::CyclicDependency(format!(
        "cycle detected in job graph: {}",
        path.join(" -> ")
    ))
}

/// Total number of dependency edges across `jobs`.
pub fn dependency_count(jobs: &[JobRef]) -> usize {
    jobs.iter().map(|j| j.dependency_count()).sum()
}
