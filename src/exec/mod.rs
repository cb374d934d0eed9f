// src/exec/mod.rs

//! Process execution layer shared by both backends.
//!
//! - [`outcome`] defines per-job outcomes and the aggregate [`RunReport`].
//! - [`runner`] provides the `JobRunner` trait and the production
//!   `ShellRunner` used by the local worker pool; tests can swap in a fake.

pub mod outcome;
pub mod runner;

pub use outcome::{JobOutcome, JobReport, RunReport};
pub use runner::{JobRunner, ShellRunner};
