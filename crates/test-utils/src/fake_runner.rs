use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jobdag::dag::JobRef;
use jobdag::exec::{JobOutcome, JobRunner};

#[derive(Debug, Default)]
struct RunLog {
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// A job runner that doesn't spawn processes. It:
/// - records start and finish order
/// - tracks how many jobs are running at once
/// - sleeps for `delay` per job so concurrency is observable
/// - fails the job names it was told to fail (exit code 1).
#[derive(Clone, Default)]
pub struct FakeRunner {
    run_log: Arc<RunLog>,
    fail: HashSet<String>,
    delay: Duration,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, names: &[&str]) -> Self {
        self.fail = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.run_log.started.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<String> {
        self.run_log.finished.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.run_log.max_in_flight.load(Ordering::SeqCst)
    }
}

impl JobRunner for FakeRunner {
    fn run(&self, job: JobRef) -> Pin<Box<dyn Future<Output = JobOutcome> + Send + 'static>> {
        let run_log = Arc::clone(&self.run_log);
        let fails = self.fail.contains(job.name());
        let delay = self.delay;

        Box::pin(async move {
            let now = run_log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            run_log.max_in_flight.fetch_max(now, Ordering::SeqCst);
            run_log.started.lock().unwrap().push(job.name().to_string());

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            run_log.finished.lock().unwrap().push(job.name().to_string());
            run_log.in_flight.fetch_sub(1, Ordering::SeqCst);

            if fails {
                JobOutcome::failed(1, format!("{} failed on purpose", job.name()))
            } else {
                JobOutcome::Success
            }
        })
    }
}
