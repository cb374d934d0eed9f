// src/lib.rs

pub mod cli;
pub mod cluster;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod local;
pub mod logging;
pub mod types;

use anyhow::Result;
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::cluster::ClusterScheduler;
use crate::config::{build_jobs, load_and_validate, RunSettings};
use crate::dag::{flatten, plan_waves, JobRef};
use crate::exec::RunReport;
use crate::local::LocalPool;
use crate::types::SchedulerBackend;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the job file, builds the job graph, runs it on the
/// selected backend, and turns any failed job into an error so the process
/// exits non-zero.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;
    let settings = RunSettings::resolve(&cfg.config, &args.overrides())?;
    let roots = build_jobs(&cfg)?;

    if args.dry_run {
        print_dry_run(&settings, &roots)?;
        return Ok(());
    }

    info!(
        scheduler = %settings.scheduler,
        jobs = cfg.job.len(),
        roots = roots.len(),
        "passing jobs to scheduler"
    );

    let report = run_with_settings(&settings, &roots).await?;

    match report.into_result() {
        Ok(report) => {
            info!(jobs = report.outcomes.len(), "all jobs completed without error");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "at least one job failed; please investigate");
            Err(e.into())
        }
    }
}

/// Run `roots` on whichever backend `settings` selects.
pub async fn run_with_settings(
    settings: &RunSettings,
    roots: &[JobRef],
) -> errors::Result<RunReport> {
    match settings.scheduler {
        SchedulerBackend::Local => {
            let pool = LocalPool::new(settings.workers)?;
            pool.run_dependency_graph(roots).await
        }
        SchedulerBackend::Sge => {
            let mut scheduler = ClusterScheduler::grid_engine(settings.cluster.clone());
            scheduler.run_dependency_graph(roots).await
        }
    }
}

/// Print jobs and the planned submission waves without running anything.
fn print_dry_run(settings: &RunSettings, roots: &[JobRef]) -> errors::Result<()> {
    let jobs = match settings.scheduler {
        SchedulerBackend::Local => flatten(roots)?,
        SchedulerBackend::Sge => {
            ClusterScheduler::grid_engine(settings.cluster.clone())
                .prepare(roots)?
                .jobs()
                .to_vec()
        }
    };
    let waves = plan_waves(&jobs)?;

    println!("jobdag dry-run");
    println!("  scheduler = {}", settings.scheduler);
    match settings.scheduler {
        SchedulerBackend::Local => match settings.workers {
            Some(n) => println!("  workers = {n}"),
            None => println!("  workers = {} (host)", local::default_workers()),
        },
        SchedulerBackend::Sge => {
            println!("  outdir = {}", settings.cluster.output_root.display());
            if !settings.cluster.extra_args.is_empty() {
                println!("  sge_args = {:?}", settings.cluster.extra_args);
            }
        }
    }
    println!();

    println!("jobs ({}):", jobs.len());
    for job in &jobs {
        println!("  - {}", job.name());
        for cmd in job.payload().commands() {
            println!("      cmd: {cmd}");
        }
        let deps: Vec<String> = job
            .dependencies()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
    }
    println!();

    println!("waves ({}):", waves.len());
    for (i, wave) in waves.iter().enumerate() {
        let names: Vec<&str> = wave.iter().map(|j| j.name()).collect();
        println!("  {}: {}", i + 1, names.join(", "));
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
