//! Submission monitor
//!
//! Owns one job from submission to its terminal state: submits the
//! template, polls status on a timer, retries transient scheduler
//! communication failures up to a ceiling, applies externally requested
//! suspend/resume transitions, and reacts to cancellation at every sleep.
//!
//! A communication failure is never interpreted as a job failure: the two
//! leave the loop as distinct error variants so the resubmission policy
//! can treat them differently.

use gantry_client::{JobTemplate, SchedulerSession, SessionError};
use gantry_core::{ControlAction, JobHandle, JobStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::JobError;
use crate::suspend::SuspendSignal;

/// Drives one submission attempt to its terminal state
pub struct SubmissionMonitor {
    session: Arc<dyn SchedulerSession>,
    suspend: Arc<dyn SuspendSignal>,
    config: Config,
    cancel: CancellationToken,
}

impl SubmissionMonitor {
    /// Creates a monitor bound to a session and suspend signal
    pub fn new(
        session: Arc<dyn SchedulerSession>,
        suspend: Arc<dyn SuspendSignal>,
        config: Config,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            suspend,
            config,
            cancel,
        }
    }

    /// Runs one submission attempt: submit, watch to a terminal state,
    /// release per-job scheduler resources
    ///
    /// Returns the handle of the finished job on success. Resources are
    /// released exactly once per attempt, on every exit path; a release
    /// failure is logged and ignored.
    pub async fn run(&self, template: &JobTemplate, command: &str) -> Result<JobHandle, JobError> {
        let result = self.submit_and_watch(template, command).await;

        if let Err(e) = self.session.release(template).await {
            warn!("could not release scheduler resources: {}", e);
        }

        result
    }

    async fn submit_and_watch(
        &self,
        template: &JobTemplate,
        command: &str,
    ) -> Result<JobHandle, JobError> {
        let handle = self
            .session
            .submit(template)
            .await
            .map_err(|source| JobError::Submit { source })?;

        debug!("job has been submitted with handle {}", handle);

        self.watch(&handle, template, command).await?;
        Ok(handle)
    }

    /// Polls the job until it reaches a terminal state
    async fn watch(
        &self,
        handle: &JobHandle,
        template: &JobTemplate,
        command: &str,
    ) -> Result<(), JobError> {
        // Newly submitted jobs are not immediately queryable on some
        // schedulers
        self.sleep_or_cancel(self.config.startup_delay, handle)
            .await?;

        let mut is_suspended = false;
        let mut attempts: u32 = 1;

        loop {
            let status = match self.session.status(handle).await {
                Ok(status) => status,
                Err(SessionError::Communication(message)) => {
                    if attempts < self.config.max_status_attempts {
                        info!(
                            "retrying to obtain status of job {}: attempt {} in {}",
                            handle, attempts, self.config.max_status_attempts
                        );
                        attempts += 1;
                        self.sleep_or_cancel(self.config.status_retry_delay, handle)
                            .await?;
                        continue;
                    }
                    return Err(JobError::Scheduler {
                        handle: handle.clone(),
                        source: SessionError::Communication(message),
                    });
                }
                Err(SessionError::Diagnostic(message))
                    if (self.config.benign_diagnostic)(&message) =>
                {
                    // Some schedulers report a finished job this way; not
                    // a failure, poll again
                    debug!("ignoring scheduler diagnostic for job {}: {}", handle, message);
                    self.sleep_or_cancel(self.config.poll_interval, handle)
                        .await?;
                    continue;
                }
                Err(source) => {
                    return Err(JobError::Scheduler {
                        handle: handle.clone(),
                        source,
                    });
                }
            };

            debug!("status of job {}: {:?}", handle, status);

            match status {
                JobStatus::Done => return Ok(()),
                JobStatus::Failed => {
                    return Err(JobError::JobFailed {
                        handle: handle.clone(),
                        script: template.command_path.clone(),
                        command: command.to_string(),
                        stdout: Vec::new(),
                        stderr: Vec::new(),
                    });
                }
                _ => {}
            }

            self.sleep_or_cancel(self.config.poll_interval, handle)
                .await?;

            self.reconcile_suspension(handle, status, &mut is_suspended)
                .await?;
        }
    }

    /// Applies the externally requested suspend state to the job
    ///
    /// Only edges issue control calls: repeated polls while the external
    /// state is unchanged are no-ops.
    async fn reconcile_suspension(
        &self,
        handle: &JobHandle,
        status: JobStatus,
        is_suspended: &mut bool,
    ) -> Result<(), JobError> {
        if !*is_suspended && self.suspend.is_job_suspended() {
            debug!("job {} will be suspended", handle);
            match status {
                JobStatus::Running => self.control(handle, ControlAction::Suspend).await?,
                JobStatus::QueuedActive => self.control(handle, ControlAction::Hold).await?,
                _ => {}
            }
            *is_suspended = true;
        } else if *is_suspended && !self.suspend.is_job_suspended() {
            debug!("job {} will be resumed", handle);
            match status {
                JobStatus::UserSuspended => self.control(handle, ControlAction::Resume).await?,
                JobStatus::UserOnHold => self.control(handle, ControlAction::Release).await?,
                _ => {}
            }
            *is_suspended = false;
        }

        Ok(())
    }

    async fn control(&self, handle: &JobHandle, action: ControlAction) -> Result<(), JobError> {
        self.session
            .control(handle, action)
            .await
            .map_err(|source| JobError::Scheduler {
                handle: handle.clone(),
                source,
            })
    }

    /// Sleeps for the given duration; the sleep is the attempt's
    /// cancellation point
    ///
    /// A cancellation observed here terminates the live job (best effort;
    /// a terminate failure never suppresses the cancellation outcome)
    /// before propagating.
    async fn sleep_or_cancel(
        &self,
        duration: Duration,
        handle: &JobHandle,
    ) -> Result<(), JobError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("job {} will be terminated", handle);
                if let Err(e) = self
                    .session
                    .control(handle, ControlAction::Terminate)
                    .await
                {
                    warn!("could not terminate job {} during cancellation: {}", handle, e);
                }
                Err(JobError::Cancelled {
                    handle: Some(handle.clone()),
                })
            }
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_client::mock::MockSession;
    use crate::suspend::{NeverSuspended, SuspendFlag};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn make_template() -> JobTemplate {
        JobTemplate::new(
            Some("toy"),
            "/tmp/toy_job",
            "/tmp/toy_job.stdout",
            "/tmp/toy_job.stderr",
        )
    }

    fn make_monitor(session: &Arc<MockSession>) -> SubmissionMonitor {
        SubmissionMonitor::new(
            Arc::clone(session) as Arc<dyn SchedulerSession>,
            Arc::new(NeverSuspended),
            Config::immediate(),
            CancellationToken::new(),
        )
    }

    fn comm_error() -> SessionError {
        SessionError::Communication(
            "code 2: slurm_load_jobs error: Socket timed out on send/recv operation".to_string(),
        )
    }

    /// Suspend signal that replays a scripted sequence, repeating the
    /// final value
    struct ScriptedSuspend(Mutex<VecDeque<bool>>);

    impl ScriptedSuspend {
        fn new(states: impl IntoIterator<Item = bool>) -> Self {
            Self(Mutex::new(states.into_iter().collect()))
        }
    }

    impl SuspendSignal for ScriptedSuspend {
        fn is_job_suspended(&self) -> bool {
            let mut states = self.0.lock().unwrap();
            if states.len() > 1 {
                states.pop_front().unwrap()
            } else {
                states.front().copied().unwrap_or(false)
            }
        }
    }

    #[tokio::test]
    async fn test_running_then_done() {
        let session = Arc::new(MockSession::new());
        session.enqueue_statuses([JobStatus::Running, JobStatus::Done]);

        let monitor = make_monitor(&session);
        let handle = monitor.run(&make_template(), "echo 5*5").await.unwrap();

        assert_eq!(handle, JobHandle::new("mock-1"));
        assert_eq!(session.submit_calls(), 1);
        assert_eq!(session.status_calls(), 2);
        assert_eq!(session.release_calls(), 1);
        assert!(session.control_calls().is_empty());
    }

    #[tokio::test]
    async fn test_communication_errors_below_ceiling() {
        let session = Arc::new(MockSession::new());
        session.enqueue_status(Err(comm_error()));
        session.enqueue_status(Err(comm_error()));
        session.enqueue_statuses([JobStatus::Running, JobStatus::Done]);

        let monitor = make_monitor(&session);
        let handle = monitor.run(&make_template(), "echo hello").await.unwrap();

        assert_eq!(handle, JobHandle::new("mock-1"));
        assert_eq!(session.submit_calls(), 1);
        assert_eq!(session.status_calls(), 4);
    }

    #[tokio::test]
    async fn test_communication_errors_at_ceiling() {
        let session = Arc::new(MockSession::new());
        for _ in 0..5 {
            session.enqueue_status(Err(comm_error()));
        }
        session.enqueue_statuses([JobStatus::Running, JobStatus::Done]);

        let monitor = make_monitor(&session);
        let err = monitor.run(&make_template(), "echo hello").await.unwrap_err();

        assert!(err.is_communication());
        assert!(!err.is_job_failure());
        assert_eq!(session.submit_calls(), 1);
        assert_eq!(session.status_calls(), 5);
        assert_eq!(session.release_calls(), 1);
    }

    #[tokio::test]
    async fn test_job_failure_is_distinct_from_communication() {
        let session = Arc::new(MockSession::new());
        session.enqueue_statuses([JobStatus::Running, JobStatus::Failed]);

        let monitor = make_monitor(&session);
        let err = monitor.run(&make_template(), "exit 1").await.unwrap_err();

        assert!(err.is_job_failure());
        assert!(!err.is_communication());
        assert_eq!(session.release_calls(), 1);
    }

    #[tokio::test]
    async fn test_submit_failure_releases_resources() {
        let session = Arc::new(MockSession::new());
        session.enqueue_submit(Err(comm_error()));

        let monitor = make_monitor(&session);
        let err = monitor.run(&make_template(), "echo hello").await.unwrap_err();

        assert!(matches!(err, JobError::Submit { .. }));
        assert_eq!(session.status_calls(), 0);
        assert_eq!(session.release_calls(), 1);
    }

    #[tokio::test]
    async fn test_benign_diagnostic_is_ignored() {
        let session = Arc::new(MockSession::new());
        session.enqueue_status(Err(SessionError::Diagnostic(
            "code 24: drmaa: Job finished but resource usage information could not be provided"
                .to_string(),
        )));
        session.enqueue_statuses([JobStatus::Done]);

        let monitor = make_monitor(&session);
        let handle = monitor.run(&make_template(), "echo hello").await.unwrap();

        assert_eq!(handle, JobHandle::new("mock-1"));
        assert_eq!(session.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_other_diagnostic_escalates() {
        let session = Arc::new(MockSession::new());
        session.enqueue_status(Err(SessionError::Diagnostic(
            "code 1: something is wrong".to_string(),
        )));

        let monitor = make_monitor(&session);
        let err = monitor.run(&make_template(), "echo hello").await.unwrap_err();

        assert!(matches!(err, JobError::Scheduler { .. }));
        assert!(!err.is_communication());
        assert_eq!(session.status_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_terminates_live_job() {
        let session = Arc::new(MockSession::new());
        session.enqueue_statuses([JobStatus::Running, JobStatus::Running]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let monitor = SubmissionMonitor::new(
            Arc::clone(&session) as Arc<dyn SchedulerSession>,
            Arc::new(NeverSuspended),
            Config::immediate(),
            cancel,
        );

        let err = monitor.run(&make_template(), "sleep 60").await.unwrap_err();

        assert!(err.is_cancelled());
        // The job was submitted, then terminated at the first sleep
        assert_eq!(session.submit_calls(), 1);
        let controls = session.control_calls();
        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].1, ControlAction::Terminate);
        assert_eq!(session.release_calls(), 1);
    }

    #[tokio::test]
    async fn test_constant_suspend_issues_one_control_call() {
        let session = Arc::new(MockSession::new());
        session.enqueue_statuses([
            JobStatus::Running,
            JobStatus::Running,
            JobStatus::Running,
            JobStatus::Done,
        ]);

        let flag = Arc::new(SuspendFlag::new());
        flag.set_suspended(true);

        let monitor = SubmissionMonitor::new(
            Arc::clone(&session) as Arc<dyn SchedulerSession>,
            Arc::clone(&flag) as Arc<dyn SuspendSignal>,
            Config::immediate(),
            CancellationToken::new(),
        );

        monitor.run(&make_template(), "sleep 60").await.unwrap();

        let controls = session.control_calls();
        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].1, ControlAction::Suspend);
    }

    #[tokio::test]
    async fn test_suspend_then_resume_edges() {
        let session = Arc::new(MockSession::new());
        session.enqueue_statuses([
            JobStatus::Running,
            JobStatus::UserSuspended,
            JobStatus::Done,
        ]);

        let monitor = SubmissionMonitor::new(
            Arc::clone(&session) as Arc<dyn SchedulerSession>,
            Arc::new(ScriptedSuspend::new([true, false])),
            Config::immediate(),
            CancellationToken::new(),
        );

        monitor.run(&make_template(), "sleep 60").await.unwrap();

        let actions: Vec<_> = session.control_calls().iter().map(|(_, a)| *a).collect();
        assert_eq!(actions, vec![ControlAction::Suspend, ControlAction::Resume]);
    }

    #[tokio::test]
    async fn test_hold_when_queued() {
        let session = Arc::new(MockSession::new());
        session.enqueue_statuses([JobStatus::QueuedActive, JobStatus::Done]);

        let flag = Arc::new(SuspendFlag::new());
        flag.set_suspended(true);

        let monitor = SubmissionMonitor::new(
            Arc::clone(&session) as Arc<dyn SchedulerSession>,
            Arc::clone(&flag) as Arc<dyn SuspendSignal>,
            Config::immediate(),
            CancellationToken::new(),
        );

        monitor.run(&make_template(), "sleep 60").await.unwrap();

        let controls = session.control_calls();
        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].1, ControlAction::Hold);
    }
}
