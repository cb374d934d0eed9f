// src/cluster/mod.rs

//! Cluster batch-scheduler backend (Grid Engine style).
//!
//! - [`layout`] builds the index-keyed script/stdout/stderr directories.
//! - [`script`] writes job scripts with the command text embedded verbatim.
//! - [`submit`] renders submission invocations as argument vectors.
//! - [`client`] runs the submit/status programs behind a trait.
//! - [`adapter`] drives flattening, grouping, wave submission and waiting.

pub mod adapter;
pub mod client;
pub mod layout;
pub mod script;
pub mod submit;

pub use adapter::{ClusterConfig, ClusterScheduler, PreparedRun};
pub use client::{ClusterClient, GridEngineClient, PollPolicy};
pub use layout::SchedulerLayout;
pub use script::{render_script, script_body, write_job_scripts};
pub use submit::SubmitInvocation;
