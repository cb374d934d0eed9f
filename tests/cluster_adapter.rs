// tests/cluster_adapter.rs

use std::error::Error;
use std::fs;

use jobdag::cluster::{ClusterConfig, ClusterScheduler, SchedulerLayout};
use jobdag::dag::Job;
use jobdag::errors::JobDagError;
use jobdag_test_utils::builders::{chain, independent_jobs, Diamond};
use jobdag_test_utils::fake_cluster::FakeClusterClient;
use jobdag_test_utils::{init_tracing, with_timeout};
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

fn scheduler(root: &std::path::Path, client: FakeClusterClient) -> ClusterScheduler<FakeClusterClient> {
    ClusterScheduler::new(ClusterConfig::new(root), client)
}

#[tokio::test]
async fn diamond_is_submitted_in_dependency_waves() -> TestResult {
    init_tracing();
    let tmp = tempdir()?;
    let client = FakeClusterClient::new();
    let mut sched = scheduler(tmp.path(), client.clone());
    let g = Diamond::new();

    let report = with_timeout(sched.run_dependency_graph(&g.roots())).await?;

    let submitted = client.submitted_names();
    assert_eq!(submitted.len(), 4);
    assert_eq!(submitted[0], "A");
    assert_eq!(submitted[3], "D");

    assert_eq!(report.waves.len(), 3);
    assert_eq!(report.waves[0], vec!["A".to_string()]);
    let mut middle = report.waves[1].clone();
    middle.sort();
    assert_eq!(middle, vec!["B".to_string(), "C".to_string()]);
    assert_eq!(report.waves[2], vec!["D".to_string()]);

    assert_eq!(report.failures, 0);
    assert!(report.is_success());
    for job in [&g.a, &g.b, &g.c, &g.d] {
        assert!(job.is_submitted(), "{} not submitted", job.name());
    }
    Ok(())
}

#[tokio::test]
async fn dependents_hold_on_their_dependencies_by_name() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::new();
    let mut sched = scheduler(tmp.path(), client.clone());
    let g = Diamond::new();

    with_timeout(sched.run_dependency_graph(&g.roots())).await?;

    let d = client.submission("D").expect("D submitted");
    assert_eq!(d.hold, vec!["B".to_string(), "C".to_string()]);
    let args: Vec<String> = d
        .args()
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    let pos = args.iter().position(|a| a == "-hold_jid").expect("hold flag");
    assert_eq!(args[pos + 1], "B,C");

    let a = client.submission("A").expect("A submitted");
    assert!(a.hold.is_empty());
    assert!(!a.args().iter().any(|x| x == "-hold_jid"));
    Ok(())
}

#[tokio::test]
async fn directories_and_scripts_are_written_per_job() -> TestResult {
    let tmp = tempdir()?;
    let mut sched = scheduler(tmp.path(), FakeClusterClient::new());
    let g = Diamond::with_commands("echo 'a b'", "echo B", "echo C", "cat \"$HOME\" | wc -l");

    with_timeout(sched.run_dependency_graph(&g.roots())).await?;

    let layout = SchedulerLayout::new(tmp.path());
    assert!(layout.jobs_dir().is_dir());
    assert!(layout.stdout_dir().is_dir());
    assert!(layout.stderr_dir().is_dir());

    for job in [&g.a, &g.b, &g.c, &g.d] {
        assert!(layout.job_dir(job).is_dir());
        assert!(layout.stdout_dir_for(job).is_dir());
        assert!(layout.stderr_dir_for(job).is_dir());

        let state = job.state();
        let script = state.script_path.expect("script path recorded");
        assert_eq!(script, layout.script_path(job));
        assert_eq!(state.stdout_path, Some(layout.stdout_dir_for(job)));
        assert_eq!(state.stderr_path, Some(layout.stderr_dir_for(job)));
    }

    let d_script = fs::read_to_string(layout.script_path(&g.d))?;
    assert_eq!(
        d_script,
        "#!/bin/sh\n#$ -S /bin/bash\ncat \"$HOME\" | wc -l\n"
    );
    Ok(())
}

#[tokio::test]
async fn waits_follow_submission_order() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::new();
    let mut sched = scheduler(tmp.path(), client.clone());
    let g = Diamond::new();

    let report = with_timeout(sched.run_dependency_graph(&g.roots())).await?;

    assert_eq!(client.waited_names(), client.submitted_names());
    assert_eq!(report.outcomes.len(), 4);
    Ok(())
}

#[tokio::test]
async fn rejected_submission_blocks_its_dependents() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::rejecting(&["B"]);
    let mut sched = scheduler(tmp.path(), client.clone());
    let g = Diamond::new();

    let report = with_timeout(sched.run_dependency_graph(&g.roots())).await?;

    assert_eq!(report.failures, 1);
    assert!(!report.is_success());
    assert!(matches!(
        report.outcome_of("B"),
        Some(jobdag::exec::JobOutcome::Failed { exit_code: 1, .. })
    ));
    assert!(g.b.is_submitted());

    // D would hold on a name the cluster never accepted; it must not go out.
    let mut submitted = client.submitted_names();
    submitted.sort();
    assert_eq!(submitted, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    assert!(client.submission("D").is_none());
    assert!(!g.d.is_submitted());
    assert_eq!(report.blocked, vec!["D".to_string()]);

    let mut waited = client.waited_names();
    waited.sort();
    assert_eq!(waited, vec!["A".to_string(), "C".to_string()]);

    let err = report.into_result().unwrap_err();
    assert!(matches!(err, JobDagError::JobsFailed { failures: 1, total: 4 }));
    Ok(())
}

#[tokio::test]
async fn rejection_blocks_the_whole_chain_below_it() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::rejecting(&["link_1"]);
    let mut sched = scheduler(tmp.path(), client.clone());
    let jobs = chain("link", 4);

    let report = with_timeout(sched.run_dependency_graph(&[jobs[3].clone()])).await?;

    assert_eq!(
        client.submitted_names(),
        vec!["link_0".to_string(), "link_1".to_string()]
    );
    let mut blocked = report.blocked.clone();
    blocked.sort();
    assert_eq!(blocked, vec!["link_2".to_string(), "link_3".to_string()]);
    assert_eq!(report.failures, 1);
    assert_eq!(client.waited_names(), vec!["link_0".to_string()]);
    Ok(())
}

#[tokio::test]
async fn blocked_job_stays_blocked_while_other_chains_advance() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::rejecting(&["short_1"]);
    let mut sched = scheduler(tmp.path(), client.clone());
    let short = chain("short", 3);
    let long = chain("long", 5);

    let report = with_timeout(
        sched.run_dependency_graph(&[short[2].clone(), long[4].clone()]),
    )
    .await?;

    assert!(client.submission("short_2").is_none());
    assert!(client.submission("long_4").is_some());
    assert_eq!(report.blocked, vec!["short_2".to_string()]);
    assert_eq!(report.waves.len(), 5);
    assert!(report.waves.iter().flatten().all(|name| name != "short_2"));
    Ok(())
}

#[tokio::test]
async fn rejected_group_does_not_stop_other_groups() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::rejecting(&["cmp_1"]);
    let mut config = ClusterConfig::new(tmp.path());
    config.group_size = 2;
    config.group_prefix = "cmp".to_string();
    let mut sched = ClusterScheduler::new(config, client.clone());

    let report = with_timeout(sched.run_dependency_graph(&independent_jobs("x", 4))).await?;

    assert_eq!(report.failures, 1);
    assert!(report.blocked.is_empty());
    assert_eq!(client.waited_names(), vec!["cmp_2".to_string()]);
    Ok(())
}

#[tokio::test]
async fn independent_jobs_are_submitted_as_array_groups() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::new();
    let mut config = ClusterConfig::new(tmp.path());
    config.group_size = 2;
    config.group_prefix = "cmp".to_string();
    let mut sched = ClusterScheduler::new(config, client.clone());
    let jobs = independent_jobs("pair", 5);

    let report = with_timeout(sched.run_dependency_graph(&jobs)).await?;

    assert_eq!(
        client.submitted_names(),
        vec!["cmp_1".to_string(), "cmp_2".to_string(), "cmp_3".to_string()]
    );
    let ranges: Vec<Option<(usize, usize)>> = client
        .log()
        .lock()
        .unwrap()
        .submissions
        .iter()
        .map(|s| s.task_range)
        .collect();
    assert_eq!(ranges, vec![Some((1, 2)), Some((1, 2)), Some((1, 1))]);
    assert_eq!(report.waves.len(), 1);

    let first = client.submission("cmp_1").expect("group submitted");
    let script = fs::read_to_string(&first.script)?;
    assert!(script.contains("case \"$SGE_TASK_ID\" in"));
    assert!(script.contains("1)\necho 0\n;;"));
    assert!(script.contains("2)\necho 1\n;;"));
    Ok(())
}

#[tokio::test]
async fn grouped_run_fills_in_caller_job_state() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::new();
    let mut config = ClusterConfig::new(tmp.path());
    config.group_size = 2;
    config.group_prefix = "cmp".to_string();
    let mut sched = ClusterScheduler::new(config, client.clone());
    let jobs = independent_jobs("pair", 3);

    let prepared = sched.prepare(&jobs)?;
    let members: Vec<Vec<String>> = prepared
        .jobs()
        .iter()
        .map(|g| {
            prepared
                .members_of(g)
                .iter()
                .map(|m| m.name().to_string())
                .collect()
        })
        .collect();
    assert_eq!(
        members,
        vec![
            vec!["pair_0".to_string(), "pair_1".to_string()],
            vec!["pair_2".to_string()],
        ]
    );

    let report = with_timeout(sched.run_prepared(&prepared)).await?;
    assert!(report.is_success());

    let layout = SchedulerLayout::new(tmp.path());
    let groups = prepared.jobs();
    for (job, group) in [(&jobs[0], &groups[0]), (&jobs[1], &groups[0]), (&jobs[2], &groups[1])] {
        let state = job.state();
        assert!(state.submitted, "{} not marked submitted", job.name());
        assert_eq!(state.script_path, Some(layout.script_path(group)));
        assert_eq!(state.stdout_path, Some(layout.stdout_dir_for(group)));
        assert_eq!(state.stderr_path, Some(layout.stderr_dir_for(group)));
    }
    Ok(())
}

#[tokio::test]
async fn repeated_jobs_are_submitted_once() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::new();
    let mut sched = scheduler(tmp.path(), client.clone());
    let a = Job::new("A", "true");
    let b = Job::new("B", "true");
    b.add_dependency(&a)?;

    let report = with_timeout(sched.build_and_submit(&[a.clone(), b, a])).await?;

    assert_eq!(client.submitted_names(), vec!["A".to_string(), "B".to_string()]);
    assert_eq!(report.outcomes.len(), 2);
    Ok(())
}

#[tokio::test]
async fn prepare_leaves_dependent_graphs_ungrouped() -> TestResult {
    let tmp = tempdir()?;
    let sched = scheduler(tmp.path(), FakeClusterClient::new());
    let g = Diamond::new();

    let prepared = sched.prepare(&g.roots())?;

    assert_eq!(prepared.jobs().len(), 4);
    assert!(!prepared.is_grouped());
    assert!(prepared.jobs().iter().all(|j| !j.is_group()));
    assert!(!tmp.path().join("sge").exists());
    Ok(())
}

#[tokio::test]
async fn extra_submitter_args_come_before_the_script() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::new();
    let mut config = ClusterConfig::new(tmp.path());
    config.extra_args = vec!["-q".to_string(), "all.q".to_string()];
    let mut sched = ClusterScheduler::new(config, client.clone());
    let g = Diamond::new();

    with_timeout(sched.run_dependency_graph(&g.roots())).await?;

    let a = client.submission("A").expect("A submitted");
    let args = a.args();
    let n = args.len();
    assert_eq!(args[n - 3], "-q");
    assert_eq!(args[n - 2], "all.q");
    assert_eq!(args[n - 1], a.script.as_os_str());
    Ok(())
}

#[tokio::test]
async fn cycle_is_rejected_before_touching_disk() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::new();
    let mut sched = scheduler(tmp.path(), client.clone());
    let a = Job::new("A", "true");
    let b = Job::new("B", "true");
    a.add_dependency(&b)?;
    b.add_dependency(&a)?;

    let err = with_timeout(sched.run_dependency_graph(&[a])).await.unwrap_err();

    assert!(matches!(err, JobDagError::CyclicDependency(_)));
    assert!(!tmp.path().join("sge").exists());
    assert!(client.submitted_names().is_empty());
    Ok(())
}

#[tokio::test]
async fn duplicate_names_are_rejected() -> TestResult {
    let tmp = tempdir()?;
    let mut sched = scheduler(tmp.path(), FakeClusterClient::new());
    let top = Job::new("top", "true");
    top.add_dependency(&Job::new("same", "true"))?;
    top.add_dependency(&Job::new("same", "false"))?;

    let err = with_timeout(sched.run_dependency_graph(&[top])).await.unwrap_err();

    assert!(matches!(err, JobDagError::DuplicateJobName(name) if name == "same"));
    Ok(())
}

#[tokio::test]
async fn unwritable_output_root_is_a_directory_error() -> TestResult {
    let tmp = tempdir()?;
    let blocker = tmp.path().join("not_a_dir");
    fs::write(&blocker, "file in the way")?;
    let client = FakeClusterClient::new();
    let mut sched = scheduler(&blocker, client.clone());
    let g = Diamond::new();

    let err = with_timeout(sched.run_dependency_graph(&g.roots())).await.unwrap_err();

    assert!(matches!(err, JobDagError::DirectoryCreation { .. }));
    assert!(client.submitted_names().is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_graph_submits_nothing() -> TestResult {
    let tmp = tempdir()?;
    let client = FakeClusterClient::new();
    let mut sched = scheduler(tmp.path(), client.clone());

    let report = with_timeout(sched.run_dependency_graph(&[])).await?;

    assert!(report.outcomes.is_empty());
    assert!(report.waves.is_empty());
    assert!(client.submitted_names().is_empty());
    Ok(())
}
