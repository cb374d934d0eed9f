// src/dag/mod.rs

//! Job graph model and the backend-independent algorithms over it.
//!
//! - [`job`] holds the `Job` record and its tagged payload.
//! - [`resolver`] flattens root jobs into the full set that must run.
//! - [`group`] repacks dependency-free workloads into array job groups.
//! - [`wave`] extracts cluster submission waves.

pub mod group;
pub mod job;
pub mod resolver;
pub mod wave;

pub use group::{compile_job_groups, compile_job_groups_from_jobs};
pub use job::{ensure_unique_names, Job, JobIndex, JobPayload, JobRef, JobState};
pub use resolver::{dependency_count, flatten};
pub use wave::{next_wave, plan_waves};
