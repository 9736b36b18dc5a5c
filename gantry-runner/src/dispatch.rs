//! Execution dispatcher
//!
//! Top-level entry point: selects the execution strategy for a job
//! request and, for scheduler execution, owns the resource lifecycle
//! around the monitoring loop — script creation, output capture, and
//! cleanup happen on failure paths too, so a failed job can always be
//! diagnosed from the error alone.

use gantry_client::{JobTemplate, SchedulerSession};
use gantry_core::{ExecutionMode, JobHandle, JobOutcome, JobRequest};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::JobError;
use crate::local::run_job_locally;
use crate::monitor::SubmissionMonitor;
use crate::output::read_job_output;
use crate::resubmit::run_with_resubmission;
use crate::script::write_job_script;
use crate::suspend::{NeverSuspended, SuspendSignal};
use crate::touch::touch_output_files;

/// Everything a job run needs from its environment
///
/// Passed explicitly into [`run_job`] so independent runs (and tests)
/// never share hidden state. The session is shared read-mostly across
/// all jobs monitored against it.
#[derive(Clone)]
pub struct RunContext {
    /// Scheduler session; required only for scheduler execution
    pub session: Option<Arc<dyn SchedulerSession>>,
    /// External suspend state, polled once per monitoring iteration
    pub suspend: Arc<dyn SuspendSignal>,
    /// Engine configuration
    pub config: Config,
    /// Cancellation signal, observed at the monitoring loop's sleeps
    pub cancel: CancellationToken,
}

impl RunContext {
    /// Creates a context with no session, no suspension, and no
    /// cancellation wired up
    pub fn new(config: Config) -> Self {
        Self {
            session: None,
            suspend: Arc::new(NeverSuspended),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the scheduler session
    pub fn with_session(mut self, session: Arc<dyn SchedulerSession>) -> Self {
        self.session = Some(session);
        self
    }

    /// Sets the suspend signal
    pub fn with_suspend_signal(mut self, suspend: Arc<dyn SuspendSignal>) -> Self {
        self.suspend = suspend;
        self
    }

    /// Sets the cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Runs one job request to completion using its execution strategy
///
/// Returns the captured output on success; failures carry command text,
/// handle, and captured output for diagnosis.
pub async fn run_job(request: &JobRequest, context: &RunContext) -> Result<JobOutcome, JobError> {
    match &request.mode {
        ExecutionMode::Touch { output_files } => {
            touch_output_files(output_files)?;
            Ok(JobOutcome::empty())
        }
        ExecutionMode::Local { echo } => run_job_locally(request, *echo).await,
        ExecutionMode::Scheduler => run_via_scheduler(request, context).await,
    }
}

/// The full scheduler chain: script, monitored submission with
/// resubmission, output retrieval, cleanup
async fn run_via_scheduler(
    request: &JobRequest,
    context: &RunContext,
) -> Result<JobOutcome, JobError> {
    // Fail fast before any script or scheduler resource is allocated
    let session = context.session.clone().ok_or(JobError::MissingSession)?;

    let script_directory = match &request.script_directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|source| JobError::Script {
            path: PathBuf::from("."),
            source,
        })?,
    };
    let script = write_job_script(request, &script_directory)?;

    let mut template = JobTemplate::new(
        request.name.as_deref(),
        &script.path,
        &script.stdout_path,
        &script.stderr_path,
    );
    if let Some(options) = &request.native_options {
        template = template.with_native_options(options.clone());
    }
    if let Some(environment) = &request.environment {
        template = template.with_environment(environment.clone());
    }
    if let Some(dir) = &request.working_directory {
        template = template.with_working_directory(dir.clone());
    }

    let monitor = SubmissionMonitor::new(
        session.clone(),
        context.suspend.clone(),
        context.config.clone(),
        context.cancel.clone(),
    );
    let result = run_with_resubmission(&monitor, &template, &request.command, request.resubmit).await;

    // Capture and remove whatever the scheduler wrote, on failure paths too
    let (stdout, stderr) = read_job_output(
        &script.stdout_path,
        &script.stderr_path,
        &request.command,
        &context.config,
    )
    .await;

    script.cleanup(request.retain_script, finished_handle(&result).as_ref());

    match result {
        Ok(handle) => {
            if request.verbose {
                log_resource_usage(session.as_ref(), &handle, &request.command).await;
            }
            Ok(JobOutcome { stdout, stderr })
        }
        Err(JobError::JobFailed {
            handle,
            script,
            command,
            ..
        }) => {
            error!(
                "job {} failed running {} (script {})",
                handle,
                command,
                script.display()
            );
            Err(JobError::JobFailed {
                handle,
                script,
                command,
                stdout,
                stderr,
            })
        }
        Err(e) => Err(e),
    }
}

/// The handle the run finished with, if one was ever obtained
fn finished_handle(result: &Result<JobHandle, JobError>) -> Option<JobHandle> {
    match result {
        Ok(handle) => Some(handle.clone()),
        Err(JobError::JobFailed { handle, .. }) => Some(handle.clone()),
        Err(JobError::Scheduler { handle, .. }) => Some(handle.clone()),
        Err(JobError::Cancelled { handle }) => handle.clone(),
        Err(_) => None,
    }
}

/// Logs a human-readable resource-usage summary for a finished job
///
/// Best effort: a usage fetch failure is only logged.
async fn log_resource_usage(session: &dyn SchedulerSession, handle: &JobHandle, command: &str) {
    match session.resource_usage(handle).await {
        Ok(usage) => {
            let mut parts = Vec::new();

            if let Some(value) = usage.get("maxvmem").or_else(|| usage.get("maxrss")) {
                match value.parse::<f64>() {
                    Ok(bytes) => parts.push(format!("Mem={}", format_mem(bytes))),
                    Err(_) => parts.push(format!("Mem={}", value)),
                }
            }
            if let Some(value) = usage.get("ru_wallclock").or_else(|| usage.get("elapsed")) {
                parts.push(format!("wallclock={}", value));
            }

            if parts.is_empty() {
                info!("job {} successfully ran {}", handle, command);
            } else {
                info!("job {} used {} running {}", handle, parts.join(", "), command);
            }
        }
        Err(e) => debug!("could not fetch resource usage for job {}: {}", handle, e),
    }
}

/// Formats a byte count for the resource-usage summary
fn format_mem(bytes: f64) -> String {
    let mut value = bytes;
    for unit in ["bytes", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1}{}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1}TB", value)
}
