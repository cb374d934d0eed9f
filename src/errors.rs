// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobDagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to create scheduler directory {path:?}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write job script {path:?}: {source}")]
    ScriptWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cyclic dependency: {0}")]
    CyclicDependency(String),

    #[error("Unsatisfiable dependencies: {0}")]
    UnsatisfiableDependencies(String),

    #[error("Duplicate job name in one run: {0}")]
    DuplicateJobName(String),

    #[error("Job group '{0}' cannot take dependencies")]
    GroupedDependency(String),

    #[error("Job group '{0}' has no commands")]
    EmptyGroup(String),

    #[error("Cannot compile job groups: job '{0}' has dependencies")]
    DependenciesPresent(String),

    #[error("Group size must be >= 1")]
    InvalidGroupSize,

    #[error("Worker count must be >= 1")]
    InvalidWorkerCount,

    #[error("{failures} of {total} jobs failed")]
    JobsFailed { failures: usize, total: usize },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobDagError>;
