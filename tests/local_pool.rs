// tests/local_pool.rs

use std::error::Error;
use std::fs;
use std::time::Duration;

use jobdag::dag::Job;
use jobdag::errors::JobDagError;
use jobdag::exec::JobOutcome;
use jobdag::local::LocalPool;
use jobdag_test_utils::builders::{chain, independent_jobs, Diamond};
use jobdag_test_utils::fake_runner::FakeRunner;
use jobdag_test_utils::{init_tracing, with_timeout};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn diamond_runs_dependencies_first() -> TestResult {
    init_tracing();
    let runner = FakeRunner::new().with_delay(Duration::from_millis(5));
    let pool = LocalPool::with_runner(4, runner.clone())?;
    let g = Diamond::new();

    let report = with_timeout(pool.run_dependency_graph(&g.roots())).await?;

    let started = runner.started();
    assert_eq!(started.len(), 4);
    assert_eq!(started[0], "A");
    assert_eq!(started[3], "D");

    let finished = runner.finished();
    assert_eq!(finished[0], "A");
    assert_eq!(finished[3], "D");

    assert_eq!(report.failures, 0);
    assert!(report.blocked.is_empty());
    assert!(report.is_success());
    assert_eq!(report.outcomes.len(), 4);
    for job in [&g.a, &g.b, &g.c, &g.d] {
        assert!(job.is_submitted());
    }
    Ok(())
}

#[tokio::test]
async fn siblings_are_dispatched_together() -> TestResult {
    let runner = FakeRunner::new().with_delay(Duration::from_millis(10));
    let pool = LocalPool::with_runner(4, runner.clone())?;
    let g = Diamond::new();

    let report = with_timeout(pool.run_dependency_graph(&g.roots())).await?;

    assert_eq!(report.waves.first(), Some(&vec!["A".to_string()]));
    let mut second = report.waves[1].clone();
    second.sort();
    assert_eq!(second, vec!["B".to_string(), "C".to_string()]);
    assert_eq!(report.waves.last(), Some(&vec!["D".to_string()]));
    Ok(())
}

#[tokio::test]
async fn failure_blocks_downstream_jobs() -> TestResult {
    let runner = FakeRunner::new().failing(&["B"]);
    let pool = LocalPool::with_runner(2, runner.clone())?;
    let g = Diamond::new();

    let report = with_timeout(pool.run_dependency_graph(&g.roots())).await?;

    assert!(!runner.started().contains(&"D".to_string()));
    assert!(runner.started().contains(&"C".to_string()));
    assert_eq!(report.failures, 1);
    assert_eq!(report.blocked, vec!["D".to_string()]);
    assert!(matches!(
        report.outcome_of("B"),
        Some(JobOutcome::Failed { exit_code: 1, .. })
    ));
    assert_eq!(report.outcome_of("C"), Some(&JobOutcome::Success));
    assert!(report.outcome_of("D").is_none());
    assert!(!g.d.is_submitted());

    match report.into_result() {
        Err(JobDagError::JobsFailed { failures, total }) => {
            assert_eq!(failures, 1);
            assert_eq!(total, 4);
        }
        other => panic!("expected JobsFailed, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn failure_blocks_the_whole_chain_below_it() -> TestResult {
    let runner = FakeRunner::new().failing(&["link_1"]);
    let pool = LocalPool::with_runner(3, runner.clone())?;
    let jobs = chain("link", 5);

    let report = with_timeout(pool.run_dependency_graph(&[jobs[4].clone()])).await?;

    assert_eq!(runner.started(), vec!["link_0".to_string(), "link_1".to_string()]);
    let mut blocked = report.blocked.clone();
    blocked.sort();
    assert_eq!(
        blocked,
        vec!["link_2".to_string(), "link_3".to_string(), "link_4".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn concurrency_never_exceeds_worker_count() -> TestResult {
    let runner = FakeRunner::new().with_delay(Duration::from_millis(20));
    let pool = LocalPool::with_runner(3, runner.clone())?;
    let jobs = independent_jobs("par", 12);

    let report = with_timeout(pool.run_dependency_graph(&jobs)).await?;

    assert_eq!(runner.finished().len(), 12);
    assert!(runner.max_in_flight() <= 3, "max in flight: {}", runner.max_in_flight());
    assert!(runner.max_in_flight() >= 2);
    assert_eq!(report.waves[0].len(), 3);
    assert!(report.waves.iter().all(|w| w.len() <= 3));
    Ok(())
}

#[tokio::test]
async fn single_worker_runs_jobs_one_at_a_time() -> TestResult {
    let runner = FakeRunner::new().with_delay(Duration::from_millis(2));
    let pool = LocalPool::with_runner(1, runner.clone())?;
    let g = Diamond::new();

    with_timeout(pool.run_dependency_graph(&g.roots())).await?;

    assert_eq!(runner.max_in_flight(), 1);
    Ok(())
}

#[test]
fn zero_workers_is_rejected() {
    let err = LocalPool::with_runner(0, FakeRunner::new()).unwrap_err();
    assert!(matches!(err, JobDagError::InvalidWorkerCount));

    let err = LocalPool::new(Some(0)).unwrap_err();
    assert!(matches!(err, JobDagError::InvalidWorkerCount));
}

#[test]
fn default_pool_uses_host_parallelism() {
    let pool = LocalPool::new(None).unwrap();
    assert_eq!(pool.workers(), jobdag::local::default_workers());
    assert!(pool.workers() >= 1);
}

#[tokio::test]
async fn cycle_is_rejected_before_anything_runs() -> TestResult {
    let runner = FakeRunner::new();
    let pool = LocalPool::with_runner(2, runner.clone())?;
    let a = Job::new("A", "true");
    let b = Job::new("B", "true");
    a.add_dependency(&b)?;
    b.add_dependency(&a)?;

    let err = with_timeout(pool.run_dependency_graph(&[a])).await.unwrap_err();

    assert!(matches!(err, JobDagError::CyclicDependency(_)));
    assert!(runner.started().is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_graph_completes_immediately() -> TestResult {
    let pool = LocalPool::with_runner(2, FakeRunner::new())?;

    let report = with_timeout(pool.run_dependency_graph(&[])).await?;

    assert!(report.outcomes.is_empty());
    assert!(report.is_success());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn shell_jobs_run_in_dependency_order() -> TestResult {
    let tmp = tempdir()?;
    let log = tmp.path().join("order.log");
    let append = |name: &str| format!("echo {name} >> '{}'", log.display());
    let g = Diamond::with_commands(&append("A"), &append("B"), &append("C"), &append("D"));
    let pool = LocalPool::new(Some(4))?;

    let report = with_timeout(pool.run_dependency_graph(&g.roots())).await?;

    assert!(report.is_success());
    let lines: Vec<String> = fs::read_to_string(&log)?
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "A");
    assert_eq!(lines[3], "D");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn shell_failure_keeps_exit_code_and_stderr() -> TestResult {
    let job = Job::new("broken", "echo boom >&2; exit 3");
    let pool = LocalPool::new(Some(1))?;

    let report = with_timeout(pool.run_dependency_graph(&[job])).await?;

    assert_eq!(report.failures, 1);
    match report.outcome_of("broken") {
        Some(JobOutcome::Failed { exit_code, diagnostic }) => {
            assert_eq!(*exit_code, 3);
            assert!(diagnostic.contains("boom"), "{diagnostic}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn shell_runner_runs_every_command_of_a_group() -> TestResult {
    let tmp = tempdir()?;
    let log = tmp.path().join("group.log");
    let commands: Vec<String> = (1..=3)
        .map(|i| format!("echo {i} >> '{}'", log.display()))
        .collect();
    let group = Job::group("bundle", commands)?;
    let pool = LocalPool::new(Some(2))?;

    let report = with_timeout(pool.run_dependency_graph(&[group])).await?;

    assert!(report.is_success());
    assert_eq!(fs::read_to_string(&log)?, "1\n2\n3\n");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn failing_group_command_does_not_skip_the_rest() -> TestResult {
    let tmp = tempdir()?;
    let log = tmp.path().join("group.log");
    let commands = vec![
        "exit 2".to_string(),
        format!("echo two >> '{}'", log.display()),
        "exit 3".to_string(),
    ];
    let group = Job::group("bundle", commands)?;
    let pool = LocalPool::new(Some(1))?;

    let report = with_timeout(pool.run_dependency_graph(&[group])).await?;

    assert_eq!(report.failures, 1);
    assert_eq!(fs::read_to_string(&log)?, "two\n");
    assert!(matches!(
        report.outcome_of("bundle"),
        Some(JobOutcome::Failed { exit_code: 2, .. })
    ));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn output_larger_than_a_pipe_buffer_is_drained() -> TestResult {
    // About 5 MB of stdout in 100-byte lines.
    let job = Job::new("chatty", "yes \"$(printf '%099d' 0)\" | head -c 5000000");
    let pool = LocalPool::new(Some(1))?;

    let report = with_timeout(pool.run_dependency_graph(&[job])).await?;

    assert!(report.is_success(), "{report:?}");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn failure_diagnostic_keeps_only_the_stderr_tail() -> TestResult {
    let job = Job::new(
        "noisy",
        "i=0; while [ $i -lt 2000 ]; do echo \"noise line $i\" >&2; i=$((i+1)); done; \
         echo last words >&2; exit 1",
    );
    let pool = LocalPool::new(Some(1))?;

    let report = with_timeout(pool.run_dependency_graph(&[job])).await?;

    match report.outcome_of("noisy") {
        Some(JobOutcome::Failed { exit_code, diagnostic }) => {
            assert_eq!(*exit_code, 1);
            assert!(diagnostic.len() <= 4096, "{} bytes", diagnostic.len());
            assert!(diagnostic.ends_with("last words"), "{diagnostic}");
            assert!(!diagnostic.contains("noise line 0\n"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn non_utf8_output_is_read_through() -> TestResult {
    let job = Job::new("binary", "printf '\\377\\376\\n' >&2; echo after >&2; exit 4");
    let pool = LocalPool::new(Some(1))?;

    let report = with_timeout(pool.run_dependency_graph(&[job])).await?;

    match report.outcome_of("binary") {
        Some(JobOutcome::Failed { exit_code, diagnostic }) => {
            assert_eq!(*exit_code, 4);
            assert!(diagnostic.ends_with("after"), "{diagnostic}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    Ok(())
}
