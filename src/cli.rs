// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::SettingsOverrides;
use crate::types::SchedulerBackend;

/// Command-line arguments for `jobdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobdag",
    version,
    about = "Run a dependency graph of shell commands on a local worker pool or a Grid Engine cluster.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the job file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Jobdag.toml")]
    pub config: PathBuf,

    /// Execution backend (local or sge). Overrides `[config].scheduler`.
    #[arg(long, value_name = "BACKEND")]
    pub scheduler: Option<SchedulerBackend>,

    /// Local worker pool width. Defaults to host parallelism.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Output root for cluster scripts and captured output.
    #[arg(long, value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Maximum tasks per array submission when no job has dependencies.
    #[arg(long, value_name = "N")]
    pub group_size: Option<usize>,

    /// Name prefix for compiled job groups.
    #[arg(long, value_name = "PREFIX")]
    pub group_prefix: Option<String>,

    /// Extra argument passed to every qsub call (repeatable).
    #[arg(long = "sge-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub sge_args: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate and print jobs plus planned submission waves; run nothing.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            scheduler: self.scheduler,
            workers: self.workers,
            outdir: self.outdir.clone(),
            group_size: self.group_size,
            group_prefix: self.group_prefix.clone(),
            sge_args: self.sge_args.clone(),
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
