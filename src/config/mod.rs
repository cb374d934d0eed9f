// src/config/mod.rs

//! TOML job files: model, loading, validation, and conversion into a job
//! graph plus effective run settings.

pub mod jobs;
pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use jobs::{build_job_map, build_jobs};
pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigFile, ConfigSection, JobConfig, RawConfigFile};
pub use settings::{RunSettings, SettingsOverrides};
