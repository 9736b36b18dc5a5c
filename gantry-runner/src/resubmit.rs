//! Resubmission policy
//!
//! Wraps the submission monitor with whole-job retries. Each attempt is a
//! fresh submission with a fresh scheduler handle; a handle is never
//! reused across attempts.
//!
//! Budget semantics are deliberately asymmetric: without a budget,
//! infrastructure errors stay directly visible to the caller; with one,
//! submit-time failures and job failures alike are unified into "attempt
//! used, try again". Communication loss while a submitted job was being
//! monitored, and cancellation, always propagate immediately and never
//! consume an attempt.

use gantry_client::JobTemplate;
use gantry_core::JobHandle;
use tracing::debug;

use crate::error::JobError;
use crate::monitor::SubmissionMonitor;

/// Runs submission attempts until one succeeds or the budget is used up
///
/// A budget of 0 means submit once with no retry. Returns the handle of
/// the finished job.
pub async fn run_with_resubmission(
    monitor: &SubmissionMonitor,
    template: &JobTemplate,
    command: &str,
    budget: u32,
) -> Result<JobHandle, JobError> {
    if budget == 0 {
        return monitor.run(template, command).await;
    }

    let mut attempt = 0;
    while attempt < budget {
        match monitor.run(template, command).await {
            Ok(handle) => return Ok(handle),
            Err(e @ (JobError::Cancelled { .. } | JobError::Scheduler { .. })) => return Err(e),
            Err(e) => {
                attempt += 1;
                debug!("resubmitting job, resubmission count is {}: {}", attempt, e);
            }
        }
    }

    Err(JobError::Exhausted {
        attempts: budget,
        command: command.to_string(),
    })
}
