use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use jobdag::cluster::{ClusterClient, SubmitInvocation};
use jobdag::exec::JobOutcome;

/// What the fake cluster saw, shared with the test.
#[derive(Debug, Default)]
pub struct ClusterLog {
    pub submissions: Vec<SubmitInvocation>,
    pub waits: Vec<String>,
}

/// A cluster client that:
/// - records every submission invocation and wait call
/// - rejects submissions for the job names it was told to fail
/// - reports every accepted job as finished immediately.
#[derive(Clone, Default)]
pub struct FakeClusterClient {
    log: Arc<Mutex<ClusterLog>>,
    reject: HashSet<String>,
}

impl FakeClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(names: &[&str]) -> Self {
        Self {
            log: Arc::default(),
            reject: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn log(&self) -> Arc<Mutex<ClusterLog>> {
        Arc::clone(&self.log)
    }

    pub fn submitted_names(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .submissions
            .iter()
            .map(|s| s.job_name.clone())
            .collect()
    }

    pub fn waited_names(&self) -> Vec<String> {
        self.log.lock().unwrap().waits.clone()
    }

    pub fn submission(&self, name: &str) -> Option<SubmitInvocation> {
        self.log
            .lock()
            .unwrap()
            .submissions
            .iter()
            .find(|s| s.job_name == name)
            .cloned()
    }
}

impl ClusterClient for FakeClusterClient {
    fn submit<'a>(
        &'a mut self,
        invocation: &'a SubmitInvocation,
    ) -> Pin<Box<dyn Future<Output = JobOutcome> + Send + 'a>> {
        Box::pin(async move {
            self.log
                .lock()
                .unwrap()
                .submissions
                .push(invocation.clone());

            if self.reject.contains(&invocation.job_name) {
                JobOutcome::failed(1, "Unable to run job: rejected by fake cluster")
            } else {
                JobOutcome::Success
            }
        })
    }

    fn wait_for<'a>(
        &'a mut self,
        job_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = JobOutcome> + Send + 'a>> {
        Box::pin(async move {
            self.log.lock().unwrap().waits.push(job_name.to_string());
            JobOutcome::Success
        })
    }
}
