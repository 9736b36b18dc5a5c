//! Scriptable mock session
//!
//! Configurable in-memory [`SchedulerSession`] for testing the monitoring
//! loop without a scheduler. Submit and status responses are scripted as
//! queues, control calls are recorded, and submit/status/release call
//! counts are tracked so tests can assert on exact interaction sequences.

use async_trait::async_trait;
use gantry_core::{ControlAction, JobHandle, JobStatus};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;
use crate::{JobTemplate, SchedulerSession};

/// Scriptable scheduler session for tests
///
/// Empty queues fall back to permissive defaults: submits hand out fresh
/// `mock-<n>` handles and status polls report `Done`, so a test only
/// scripts the part of the interaction it cares about.
#[derive(Debug, Default)]
pub struct MockSession {
    submit_queue: Mutex<VecDeque<Result<JobHandle>>>,
    status_queue: Mutex<VecDeque<Result<JobStatus>>>,
    control_log: Mutex<Vec<(JobHandle, ControlAction)>>,
    usage: Mutex<HashMap<String, String>>,
    job_output: Mutex<Option<(String, String)>>,
    submit_count: AtomicUsize,
    status_count: AtomicUsize,
    release_count: AtomicUsize,
}

impl MockSession {
    /// Creates a mock session with empty scripts
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one submit response
    pub fn enqueue_submit(&self, result: Result<JobHandle>) {
        self.submit_queue.lock().unwrap().push_back(result);
    }

    /// Queues one status response
    pub fn enqueue_status(&self, result: Result<JobStatus>) {
        self.status_queue.lock().unwrap().push_back(result);
    }

    /// Queues a sequence of successful status responses
    pub fn enqueue_statuses(&self, statuses: impl IntoIterator<Item = JobStatus>) {
        let mut queue = self.status_queue.lock().unwrap();
        queue.extend(statuses.into_iter().map(Ok));
    }

    /// Sets the output the "scheduler" writes to the template's stdout and
    /// stderr paths on submission, standing in for output redirection
    pub fn set_job_output(&self, stdout: &str, stderr: &str) {
        *self.job_output.lock().unwrap() = Some((stdout.to_string(), stderr.to_string()));
    }

    /// Sets the resource-usage figures reported for any job
    pub fn set_resource_usage(&self, usage: HashMap<String, String>) {
        *self.usage.lock().unwrap() = usage;
    }

    /// Number of submit calls received
    pub fn submit_calls(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }

    /// Number of status calls received
    pub fn status_calls(&self) -> usize {
        self.status_count.load(Ordering::SeqCst)
    }

    /// Number of release calls received
    pub fn release_calls(&self) -> usize {
        self.release_count.load(Ordering::SeqCst)
    }

    /// All control calls received, in order
    pub fn control_calls(&self) -> Vec<(JobHandle, ControlAction)> {
        self.control_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl SchedulerSession for MockSession {
    async fn submit(&self, template: &JobTemplate) -> Result<JobHandle> {
        let n = self.submit_count.fetch_add(1, Ordering::SeqCst) + 1;

        let result = self
            .submit_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(JobHandle::new(format!("mock-{}", n))));

        if result.is_ok() {
            if let Some((stdout, stderr)) = self.job_output.lock().unwrap().as_ref() {
                fs::write(&template.stdout_path, stdout).expect("mock stdout write");
                fs::write(&template.stderr_path, stderr).expect("mock stderr write");
            }
        }

        result
    }

    async fn status(&self, _handle: &JobHandle) -> Result<JobStatus> {
        self.status_count.fetch_add(1, Ordering::SeqCst);

        self.status_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(JobStatus::Done))
    }

    async fn control(&self, handle: &JobHandle, action: ControlAction) -> Result<()> {
        self.control_log
            .lock()
            .unwrap()
            .push((handle.clone(), action));
        Ok(())
    }

    async fn resource_usage(&self, _handle: &JobHandle) -> Result<HashMap<String, String>> {
        Ok(self.usage.lock().unwrap().clone())
    }

    async fn release(&self, _template: &JobTemplate) -> Result<()> {
        self.release_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
