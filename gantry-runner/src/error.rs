//! Error types for the job engine
//!
//! The taxonomy separates what the retry machinery must keep apart:
//! configuration errors surface before any resource is allocated,
//! communication errors are retried up to their ceilings and then escalate,
//! job failures count against the resubmission budget, and cleanup errors
//! are only ever logged.

use gantry_client::SessionError;
use gantry_core::JobHandle;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors produced while running a job
#[derive(Debug, Error)]
pub enum JobError {
    /// Scheduler execution was requested without a scheduler session
    #[error("no scheduler session provided; pass one in the run context")]
    MissingSession,

    /// The job script could not be written
    #[error("could not write job script {}: {source}", .path.display())]
    Script { path: PathBuf, source: io::Error },

    /// Submission failed before a handle was obtained
    #[error("job submission failed: {source}")]
    Submit { source: SessionError },

    /// The scheduler became unreachable (or answered unusably) while a
    /// submitted job was being monitored
    #[error("lost contact with the scheduler while monitoring job {handle}: {source}")]
    Scheduler {
        handle: JobHandle,
        source: SessionError,
    },

    /// The scheduler reported the job itself as failed
    #[error("job {handle} failed running: {command}")]
    JobFailed {
        handle: JobHandle,
        script: PathBuf,
        command: String,
        stdout: Vec<String>,
        stderr: Vec<String>,
    },

    /// Every attempt in the resubmission budget was used without success
    #[error("job could not be completed within {attempts} attempts: {command}")]
    Exhausted { attempts: u32, command: String },

    /// The job was cancelled from outside
    #[error("job was cancelled")]
    Cancelled { handle: Option<JobHandle> },

    /// A local command could not be started
    #[error("could not start local command: {command}: {source}")]
    LocalSpawn { command: String, source: io::Error },

    /// A local command finished with a bad exit
    #[error("local command exited with status {}: {command}", display_exit(.exit_code))]
    LocalFailed {
        command: String,
        exit_code: Option<i32>,
        stdout: Vec<String>,
        stderr: Vec<String>,
    },

    /// A declared output file could not be touched
    #[error("could not touch output file {}: {source}", .path.display())]
    Touch { path: PathBuf, source: io::Error },
}

impl JobError {
    /// Check if this error means the scheduler was unreachable
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            Self::Submit { source } | Self::Scheduler { source, .. } if source.is_communication()
        )
    }

    /// Check if this error is the job's own failure (counts against the
    /// resubmission budget)
    pub fn is_job_failure(&self) -> bool {
        matches!(self, Self::JobFailed { .. })
    }

    /// Check if this error reports a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

fn display_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}
