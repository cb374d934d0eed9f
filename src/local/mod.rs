// src/local/mod.rs

//! Local worker pool backend.
//!
//! - [`tracker`] is the pure dependency-satisfaction core.
//! - [`pool`] is the async shell that runs jobs with bounded parallelism.

pub mod pool;
pub mod tracker;

pub use pool::{default_workers, LocalPool};
pub use tracker::{DependencyTracker, TrackState, TrackerStep};
