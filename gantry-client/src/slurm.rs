//! SLURM session adapter
//!
//! Drives a SLURM cluster through its command-line tools: `sbatch` for
//! submission, `squeue`/`sacct` for status, `scontrol`/`scancel` for
//! control, and `sacct` accounting fields for resource usage.
//!
//! Command-spawn failures and controller timeouts surface as
//! [`SessionError::Communication`]; answers the adapter cannot map onto a
//! job status surface as [`SessionError::Diagnostic`].

use async_trait::async_trait;
use gantry_core::{ControlAction, JobHandle, JobStatus};
use std::collections::HashMap;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::{JobTemplate, SchedulerSession};

/// Scheduler session backed by the SLURM command-line tools
///
/// Stateless: every operation is a fresh invocation of the cluster's
/// submission-node tooling, so one instance can serve any number of
/// concurrently monitored jobs.
#[derive(Debug, Clone, Default)]
pub struct SlurmSession;

impl SlurmSession {
    /// Creates a new SLURM session
    pub fn new() -> Self {
        Self
    }

    /// Runs one scheduler command, mapping spawn failures to
    /// communication errors
    async fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        debug!("running scheduler command: {} {}", program, args.join(" "));

        Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| SessionError::Communication(format!("failed to run {}: {}", program, e)))
    }
}

#[async_trait]
impl SchedulerSession for SlurmSession {
    async fn submit(&self, template: &JobTemplate) -> Result<JobHandle> {
        let args = sbatch_args(template);
        let output = self.run("sbatch", &args).await?;

        if !output.status.success() {
            return Err(SessionError::Communication(format!(
                "sbatch failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_submit_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus> {
        // While the job is queued or running it is visible to squeue;
        // once it leaves the queue only the accounting database knows it.
        let args = vec![
            "-h".to_string(),
            "-o".to_string(),
            "%T %r".to_string(),
            "-j".to_string(),
            handle.to_string(),
        ];
        let output = self.run("squeue", &args).await?;

        if output.status.success() {
            let line = String::from_utf8_lossy(&output.stdout);
            let line = line.trim();
            if !line.is_empty() {
                return parse_squeue_line(line);
            }
        }

        let args = vec![
            "-n".to_string(),
            "-X".to_string(),
            "-P".to_string(),
            "-o".to_string(),
            "State".to_string(),
            "-j".to_string(),
            handle.to_string(),
        ];
        let output = self.run("sacct", &args).await?;

        if !output.status.success() {
            return Err(SessionError::Communication(format!(
                "sacct failed for job {}: {}",
                handle,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let state = String::from_utf8_lossy(&output.stdout);
        match state.lines().next().map(str::trim).filter(|s| !s.is_empty()) {
            Some(state) => parse_state(state),
            None => Err(SessionError::Diagnostic(format!(
                "no state reported for job {}",
                handle
            ))),
        }
    }

    async fn control(&self, handle: &JobHandle, action: ControlAction) -> Result<()> {
        let (program, args) = control_command(handle, action);
        let output = self.run(program, &args).await?;

        if !output.status.success() {
            return Err(SessionError::Diagnostic(format!(
                "{} of job {} rejected: {}",
                action,
                handle,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }

    async fn resource_usage(&self, handle: &JobHandle) -> Result<HashMap<String, String>> {
        let args = vec![
            "-n".to_string(),
            "-X".to_string(),
            "-P".to_string(),
            "-o".to_string(),
            "MaxRSS,MaxVMSize,Elapsed".to_string(),
            "-j".to_string(),
            handle.to_string(),
        ];
        let output = self.run("sacct", &args).await?;

        if !output.status.success() {
            return Err(SessionError::Communication(format!(
                "sacct failed for job {}: {}",
                handle,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_usage(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn release(&self, _template: &JobTemplate) -> Result<()> {
        // The command-line adapter holds no per-job server state
        Ok(())
    }
}

/// Maps a control action onto the SLURM tool and arguments that apply it
fn control_command(handle: &JobHandle, action: ControlAction) -> (&'static str, Vec<String>) {
    match action {
        ControlAction::Terminate => ("scancel", vec![handle.to_string()]),
        ControlAction::Suspend => ("scontrol", vec!["suspend".to_string(), handle.to_string()]),
        ControlAction::Resume => ("scontrol", vec!["resume".to_string(), handle.to_string()]),
        ControlAction::Hold => ("scontrol", vec!["hold".to_string(), handle.to_string()]),
        ControlAction::Release => ("scontrol", vec!["release".to_string(), handle.to_string()]),
    }
}

/// Builds the sbatch argument list for a template
fn sbatch_args(template: &JobTemplate) -> Vec<String> {
    let mut args = vec![
        "--parsable".to_string(),
        "--job-name".to_string(),
        template.job_name.clone(),
        "--output".to_string(),
        template.stdout_path.to_string_lossy().into_owned(),
        "--error".to_string(),
        template.stderr_path.to_string_lossy().into_owned(),
    ];

    if let Some(dir) = &template.working_directory {
        args.push("--chdir".to_string());
        args.push(dir.to_string_lossy().into_owned());
    }

    if !template.environment.is_empty() {
        let mut pairs: Vec<_> = template
            .environment
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        pairs.sort();
        args.push(format!("--export=ALL,{}", pairs.join(",")));
    }

    if let Some(options) = &template.native_options {
        args.extend(options.split_whitespace().map(str::to_string));
    }

    args.push(template.command_path.to_string_lossy().into_owned());
    args
}

/// Parses `sbatch --parsable` output (`<jobid>` or `<jobid>;<cluster>`)
fn parse_submit_output(stdout: &str) -> Result<JobHandle> {
    let id = stdout.trim().split(';').next().unwrap_or("").trim();

    if id.is_empty() {
        return Err(SessionError::Parse(format!(
            "sbatch reported no job id: {:?}",
            stdout
        )));
    }

    Ok(JobHandle::new(id))
}

/// Maps a squeue `%T %r` line onto a job status
///
/// Held jobs stay PENDING in squeue; the reason column tells them apart.
fn parse_squeue_line(line: &str) -> Result<JobStatus> {
    let mut fields = line.split_whitespace();
    let state = fields.next().unwrap_or(line);
    let reason = fields.next().unwrap_or("");

    if state == "PENDING" && reason.starts_with("JobHeld") {
        return Ok(JobStatus::UserOnHold);
    }

    parse_state(state)
}

/// Maps a SLURM state string onto a job status
fn parse_state(state: &str) -> Result<JobStatus> {
    // sacct suffixes cancelled states with the requesting user
    // ("CANCELLED by 1000"); the leading word carries the state.
    let state = state.split_whitespace().next().unwrap_or(state);

    match state {
        "PENDING" | "CONFIGURING" | "REQUEUED" => Ok(JobStatus::QueuedActive),
        "RUNNING" | "COMPLETING" | "STAGE_OUT" => Ok(JobStatus::Running),
        "SUSPENDED" => Ok(JobStatus::UserSuspended),
        "COMPLETED" => Ok(JobStatus::Done),
        "FAILED" | "CANCELLED" | "TIMEOUT" | "NODE_FAIL" | "PREEMPTED" | "OUT_OF_MEMORY"
        | "BOOT_FAIL" | "DEADLINE" => Ok(JobStatus::Failed),
        other => Err(SessionError::Diagnostic(format!(
            "unrecognized scheduler state: {}",
            other
        ))),
    }
}

/// Parses the pipe-separated `MaxRSS,MaxVMSize,Elapsed` accounting line
fn parse_usage(stdout: &str) -> HashMap<String, String> {
    let mut usage = HashMap::new();

    if let Some(line) = stdout.lines().next() {
        let mut fields = line.trim().split('|');
        for key in ["maxrss", "maxvmsize", "elapsed"] {
            if let Some(value) = fields.next() {
                if !value.is_empty() {
                    usage.insert(key.to_string(), value.to_string());
                }
            }
        }
    }

    usage
}
