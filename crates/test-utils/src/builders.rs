#![allow(dead_code)]

use std::collections::BTreeMap;

use jobdag::config::{ConfigFile, ConfigSection, JobConfig, RawConfigFile};
use jobdag::dag::{Job, JobRef};
use jobdag::types::SchedulerBackend;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                job: BTreeMap::new(),
            },
        }
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn scheduler(mut self, backend: SchedulerBackend) -> Self {
        self.config.config.scheduler = backend;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.config.workers = Some(n);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            job: JobConfig {
                cmd: cmd.to_string(),
                after: vec![],
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.job.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}

/// Diamond graph: B and C depend on A, D depends on B and C.
pub struct Diamond {
    pub a: JobRef,
    pub b: JobRef,
    pub c: JobRef,
    pub d: JobRef,
}

impl Diamond {
    /// Diamond with `echo <name>` commands.
    pub fn new() -> Self {
        Self::with_commands("echo A", "echo B", "echo C", "echo D")
    }

    pub fn with_commands(a: &str, b: &str, c: &str, d: &str) -> Self {
        let a = Job::new("A", a);
        let b = Job::new("B", b);
        let c = Job::new("C", c);
        let d = Job::new("D", d);
        b.add_dependency(&a).expect("B -> A");
        c.add_dependency(&a).expect("C -> A");
        d.add_dependency(&b).expect("D -> B");
        d.add_dependency(&c).expect("D -> C");
        Self { a, b, c, d }
    }

    pub fn roots(&self) -> Vec<JobRef> {
        vec![self.d.clone()]
    }
}

impl Default for Diamond {
    fn default() -> Self {
        Self::new()
    }
}

/// `n` dependency-free jobs named `<prefix>_<i>` running `echo <i>`.
pub fn independent_jobs(prefix: &str, n: usize) -> Vec<JobRef> {
    (0..n)
        .map(|i| Job::new(format!("{prefix}_{i}"), format!("echo {i}")))
        .collect()
}

/// Linear chain `<prefix>_0 <- <prefix>_1 <- ...`; returns jobs in chain
/// order (the last one is the only root).
pub fn chain(prefix: &str, n: usize) -> Vec<JobRef> {
    let jobs = independent_jobs(prefix, n);
    for pair in jobs.windows(2) {
        pair[1].add_dependency(&pair[0]).expect("chain link");
    }
    jobs
}
