// src/cluster/adapter.rs

//! Driving a job graph through a cluster batch scheduler.
//!
//! Everything here runs on one control task: submissions go out one at a
//! time in dependency-respecting waves, then completion is awaited job by
//! job in submission order. Parallelism is the cluster's business.
//!
//! A job is submitted once its dependencies have been submitted; the hold
//! directive orders execution from there. A hold on a name the cluster
//! never accepted holds nothing, so dependents of a rejected submission are
//! not submitted at all.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cluster::client::{ClusterClient, GridEngineClient, PollPolicy, DEFAULT_QSTAT};
use crate::cluster::layout::SchedulerLayout;
use crate::cluster::script::write_job_scripts;
use crate::cluster::submit::{SubmitInvocation, DEFAULT_QSUB};
use crate::dag::group::{DEFAULT_GROUP_PREFIX, DEFAULT_GROUP_SIZE};
use crate::dag::{
    compile_job_groups_from_jobs, dependency_count, ensure_unique_names, flatten, next_wave, Job,
    JobIndex, JobRef,
};
use crate::errors::{JobDagError, Result};
use crate::exec::{JobOutcome, RunReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Root under which the `sge/` tree is created.
    pub output_root: PathBuf,
    pub qsub_program: String,
    pub qstat_program: String,
    /// Extra submitter arguments, e.g. a queue selection.
    pub extra_args: Vec<String>,
    pub group_prefix: String,
    pub group_size: usize,
    pub poll: PollPolicy,
}

impl ClusterConfig {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            qsub_program: DEFAULT_QSUB.to_string(),
            qstat_program: DEFAULT_QSTAT.to_string(),
            extra_args: Vec::new(),
            group_prefix: DEFAULT_GROUP_PREFIX.to_string(),
            group_size: DEFAULT_GROUP_SIZE,
            poll: PollPolicy::default(),
        }
    }
}

pub struct ClusterScheduler<C: ClusterClient> {
    config: ClusterConfig,
    client: C,
}

impl<C: ClusterClient> fmt::Debug for ClusterScheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterScheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClusterScheduler<GridEngineClient> {
    pub fn grid_engine(config: ClusterConfig) -> Self {
        let client = GridEngineClient::new(config.qstat_program.clone(), config.poll);
        Self::new(config, client)
    }
}

impl<C: ClusterClient> ClusterScheduler<C> {
    pub fn new(config: ClusterConfig, client: C) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Flatten `roots`, validate, and repack into job groups when no job has
    /// dependencies. Touches neither the filesystem nor the cluster.
    pub fn prepare(&self, roots: &[JobRef]) -> Result<PreparedRun> {
        let jobs = flatten(roots)?;
        ensure_unique_names(&jobs)?;

        info!(jobs = jobs.len(), "jobs to run with scheduler");
        for job in &jobs {
            debug!(job = %job.name(), commands = ?job.payload().commands(), "job");
            for dep in job.dependencies() {
                debug!(job = %job.name(), depends_on = %dep.name(), "dependency");
            }
        }

        let deps = dependency_count(&jobs);
        info!(dependencies = deps, "counted job dependencies");

        if deps > 0 || jobs.is_empty() {
            return Ok(PreparedRun::ungrouped(jobs));
        }

        info!(
            group_size = self.config.group_size,
            prefix = %self.config.group_prefix,
            "no dependencies; compiling jobs into job groups"
        );
        let groups = compile_job_groups_from_jobs(
            &jobs,
            &self.config.group_prefix,
            self.config.group_size,
        )?;

        // Commands were packed in job order, so each group's members are the
        // owners of its slice of that sequence.
        let mut owners = jobs
            .iter()
            .flat_map(|j| std::iter::repeat_n(j, j.task_count()));
        let mut members = HashMap::with_capacity(groups.len());
        for group in &groups {
            let mut these: Vec<JobRef> = Vec::new();
            for owner in owners.by_ref().take(group.task_count()) {
                if these.last().is_none_or(|last| last.index() != owner.index()) {
                    these.push(Arc::clone(owner));
                }
            }
            debug!(group = %group.name(), members = these.len(), "compiled job group");
            members.insert(group.index(), these);
        }

        Ok(PreparedRun {
            jobs: groups,
            members,
        })
    }

    /// Run every job reachable from `roots` on the cluster and wait for all
    /// of them to leave the queue.
    ///
    /// A cyclic graph is rejected before any directory is created.
    pub async fn run_dependency_graph(&mut self, roots: &[JobRef]) -> Result<RunReport> {
        let prepared = self.prepare(roots)?;
        self.run_prepared(&prepared).await
    }

    /// Build directories and scripts for a closed job set, submit it in
    /// waves, then wait for completion. Repeated entries are submitted once.
    pub async fn build_and_submit(&mut self, jobs: &[JobRef]) -> Result<RunReport> {
        self.run_prepared(&PreparedRun::ungrouped(jobs.to_vec())).await
    }

    /// Submit a prepared run.
    ///
    /// A rejected submission is recorded and counted; its transitive
    /// dependents are never submitted and are listed in
    /// [`RunReport::blocked`]. Everything else is still submitted.
    pub async fn run_prepared(&mut self, prepared: &PreparedRun) -> Result<RunReport> {
        let jobs = prepared.jobs();
        let layout = SchedulerLayout::build(&self.config.output_root, jobs)?;
        write_job_scripts(&layout, jobs)?;

        let mut report = RunReport::default();
        let accepted = self
            .submit_jobs(&layout, prepared, &mut report)
            .await?;

        info!(jobs = accepted.len(), "waiting for submitted jobs to finish (polling)");
        for job in &accepted {
            let outcome = self.client.wait_for(job.name()).await;
            if !outcome.is_success() {
                warn!(job = %job.name(), "could not observe job completion");
            }
            report.record(job, outcome);
        }

        if report.failures > 0 {
            warn!(
                failures = report.failures,
                blocked = report.blocked.len(),
                "cluster run finished with failures"
            );
        } else {
            info!(jobs = report.outcomes.len(), "cluster run completed");
        }

        Ok(report)
    }

    /// Submit in waves; returns the jobs the submitter accepted, in
    /// submission order.
    async fn submit_jobs(
        &mut self,
        layout: &SchedulerLayout,
        prepared: &PreparedRun,
        report: &mut RunReport,
    ) -> Result<Vec<JobRef>> {
        let jobs = prepared.jobs();
        let dependents = dependents_index(jobs);
        let mut submitted: HashSet<JobIndex> = HashSet::with_capacity(jobs.len());
        let mut blocked: HashSet<JobIndex> = HashSet::new();
        let mut accepted = Vec::with_capacity(jobs.len());

        let settled = |submitted: &HashSet<JobIndex>, blocked: &HashSet<JobIndex>, j: &JobRef| {
            submitted.contains(&j.index()) || blocked.contains(&j.index())
        };

        while jobs.iter().any(|j| !settled(&submitted, &blocked, j)) {
            let mut wave = next_wave(jobs, &submitted);
            wave.retain(|j| !blocked.contains(&j.index()));
            if wave.is_empty() {
                let stuck: Vec<&str> = jobs
                    .iter()
                    .filter(|j| !settled(&submitted, &blocked, j))
                    .map(|j| j.name())
                    .collect();
                return Err(JobDagError::UnsatisfiableDependencies(format!(
                    "no job can be submitted; still waiting: {}",
                    stuck.join(", ")
                )));
            }

            let wave_no = report.waves.len() + 1;
            info!(wave = wave_no, jobs = wave.len(), "submitting wave");

            for job in &wave {
                job.set_output_paths(layout.stdout_dir_for(job), layout.stderr_dir_for(job));
                let invocation = SubmitInvocation::for_job(
                    self.config.qsub_program.clone(),
                    job,
                    layout,
                    &self.config.extra_args,
                );

                let outcome = self.client.submit(&invocation).await;
                // The attempt happened, whatever the submitter said.
                job.mark_submitted();
                prepared.sync_members(job);

                match outcome {
                    JobOutcome::Success => accepted.push(Arc::clone(job)),
                    failed => {
                        let newly = block_downstream(job, &dependents, &mut blocked);
                        warn!(
                            job = %job.name(),
                            blocked = newly,
                            "submission rejected; dependents will not be submitted"
                        );
                        report.record(job, failed);
                    }
                }
            }

            submitted.extend(wave.iter().map(|j| j.index()));
            report
                .waves
                .push(wave.iter().map(|j| j.name().to_string()).collect());
        }

        report.blocked = jobs
            .iter()
            .filter(|j| blocked.contains(&j.index()))
            .map(|j| j.name().to_string())
            .collect();

        Ok(accepted)
    }
}

/// A flattened, validated job set ready for submission.
///
/// When dependency-free jobs were packed into job groups, each group keeps
/// the caller jobs it stands for; those receive the group's submission
/// state.
#[derive(Debug, Clone, Default)]
pub struct PreparedRun {
    jobs: Vec<JobRef>,
    members: HashMap<JobIndex, Vec<JobRef>>,
}

impl PreparedRun {
    /// Submit `jobs` as they are; repeated entries are kept once.
    pub fn ungrouped(jobs: Vec<JobRef>) -> Self {
        let mut seen = HashSet::with_capacity(jobs.len());
        let jobs = jobs.into_iter().filter(|j| seen.insert(j.index())).collect();
        Self {
            jobs,
            members: HashMap::new(),
        }
    }

    /// Jobs that will actually be submitted.
    pub fn jobs(&self) -> &[JobRef] {
        &self.jobs
    }

    /// Caller jobs packed into `group`; empty for anything not a compiled
    /// group.
    pub fn members_of(&self, group: &Job) -> &[JobRef] {
        self.members
            .get(&group.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_grouped(&self) -> bool {
        !self.members.is_empty()
    }

    /// Copy a submitted group's state onto the jobs it stands for.
    fn sync_members(&self, group: &Job) {
        let members = self.members_of(group);
        if members.is_empty() {
            return;
        }
        let state = group.state();
        for member in members {
            if let (Some(out), Some(err)) = (&state.stdout_path, &state.stderr_path) {
                member.set_output_paths(out, err);
            }
            if let Some(script) = &state.script_path {
                member.set_script_path(script);
            }
            if state.submitted {
                member.mark_submitted();
            }
        }
    }
}

fn dependents_index(jobs: &[JobRef]) -> HashMap<JobIndex, Vec<JobRef>> {
    let mut index: HashMap<JobIndex, Vec<JobRef>> = HashMap::new();
    for job in jobs {
        for dep in job.dependencies() {
            index.entry(dep.index()).or_default().push(Arc::clone(job));
        }
    }
    index
}

/// Mark everything downstream of `failed` as blocked; returns how many jobs
/// were newly blocked.
fn block_downstream(
    failed: &Job,
    dependents: &HashMap<JobIndex, Vec<JobRef>>,
    blocked: &mut HashSet<JobIndex>,
) -> usize {
    let mut newly = 0;
    let mut stack: Vec<JobIndex> = vec![failed.index()];
    while let Some(index) = stack.pop() {
        for dependent in dependents.get(&index).into_iter().flatten() {
            if blocked.insert(dependent.index()) {
                debug!(job = %dependent.name(), "blocked by rejected upstream submission");
                newly += 1;
                stack.push(dependent.index());
            }
        }
    }
    newly
}
