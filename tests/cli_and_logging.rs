// tests/cli_and_logging.rs

use std::path::PathBuf;

use clap::Parser;
use jobdag::cli::{CliArgs, LogLevel};
use jobdag::logging::resolve_level;
use jobdag::types::SchedulerBackend;
use tracing::Level;

#[test]
fn defaults_when_no_flags() {
    let args = CliArgs::try_parse_from(["jobdag"]).unwrap();

    assert_eq!(args.config, PathBuf::from("Jobdag.toml"));
    assert!(args.scheduler.is_none());
    assert!(!args.dry_run);
    assert_eq!(args.overrides(), Default::default());
}

#[test]
fn flags_become_overrides() {
    let args = CliArgs::try_parse_from([
        "jobdag",
        "--config",
        "jobs/anim.toml",
        "--scheduler",
        "sge",
        "--workers",
        "8",
        "--outdir",
        "/scratch/out",
        "--group-size",
        "100",
        "--group-prefix",
        "anim",
        "--sge-arg",
        "-q",
        "--sge-arg",
        "all.q",
        "--dry-run",
    ])
    .unwrap();

    assert_eq!(args.config, PathBuf::from("jobs/anim.toml"));
    assert!(args.dry_run);

    let o = args.overrides();
    assert_eq!(o.scheduler, Some(SchedulerBackend::Sge));
    assert_eq!(o.workers, Some(8));
    assert_eq!(o.outdir, Some(PathBuf::from("/scratch/out")));
    assert_eq!(o.group_size, Some(100));
    assert_eq!(o.group_prefix.as_deref(), Some("anim"));
    assert_eq!(o.sge_args, vec!["-q".to_string(), "all.q".to_string()]);
}

#[test]
fn unknown_scheduler_flag_is_rejected() {
    assert!(CliArgs::try_parse_from(["jobdag", "--scheduler", "slurm"]).is_err());
}

#[test]
fn cli_level_beats_environment() {
    assert_eq!(resolve_level(Some(LogLevel::Debug), Some("error")), Level::DEBUG);
}

#[test]
fn environment_level_is_used_without_flag() {
    assert_eq!(resolve_level(None, Some("warning")), Level::WARN);
    assert_eq!(resolve_level(None, Some(" TRACE ")), Level::TRACE);
}

#[test]
fn unparseable_or_missing_level_falls_back_to_info() {
    assert_eq!(resolve_level(None, Some("loud")), Level::INFO);
    assert_eq!(resolve_level(None, None), Level::INFO);
}
