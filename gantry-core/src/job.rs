//! Job domain types
//!
//! A [`JobRequest`] describes one unit of work given to the engine. The
//! scheduler assigns a [`JobHandle`] at submission time and reports a
//! [`JobStatus`] on every poll; the engine produces exactly one
//! [`JobOutcome`] at the terminal transition.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// How a job request is executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Submit to the batch scheduler and monitor to completion
    Scheduler,
    /// Run the command synchronously as a local subprocess
    Local {
        /// Echo captured output lines to the log as they are collected
        echo: bool,
    },
    /// Touch the declared output files without running anything (dry-run)
    Touch {
        /// Files to mark as produced
        output_files: Vec<PathBuf>,
    },
}

/// A single unit of work handed to the engine
///
/// Created once per job by the caller and never mutated. The optional
/// fields mirror what batch schedulers accept at submission time: a job
/// name, a scheduler-native option string (queue, CPUs, memory, walltime),
/// environment overrides, and a working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Shell command to run
    pub command: String,
    /// Job name shown by the scheduler
    pub name: Option<String>,
    /// Scheduler-native option string, passed through uninterpreted
    pub native_options: Option<String>,
    /// Environment variable overrides for the job
    pub environment: Option<HashMap<String, String>>,
    /// Working directory for the job (scheduler default when unset)
    pub working_directory: Option<PathBuf>,
    /// Directory for generated job scripts (current directory when unset)
    pub script_directory: Option<PathBuf>,
    /// Keep the job script after completion, renamed with the job handle
    pub retain_script: bool,
    /// Whole-job retry budget: 0 means submit once, N means up to N attempts
    pub resubmit: u32,
    /// Log a resource-usage summary on success
    pub verbose: bool,
    /// Execution strategy
    pub mode: ExecutionMode,
    /// When this request was created
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl JobRequest {
    /// Creates a request for the given command with scheduler execution
    /// and no retry budget
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            name: None,
            native_options: None,
            environment: None,
            working_directory: None,
            script_directory: None,
            retain_script: false,
            resubmit: 0,
            verbose: false,
            mode: ExecutionMode::Scheduler,
            created_at: chrono::Utc::now(),
        }
    }

    /// Sets the job name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the scheduler-native option string
    pub fn with_native_options(mut self, options: impl Into<String>) -> Self {
        self.native_options = Some(options.into());
        self
    }

    /// Sets environment variable overrides
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Sets the working directory
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Sets the directory for generated job scripts
    pub fn with_script_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_directory = Some(dir.into());
        self
    }

    /// Keeps the job script after completion
    pub fn retain_script(mut self) -> Self {
        self.retain_script = true;
        self
    }

    /// Sets the whole-job retry budget
    pub fn with_resubmit(mut self, attempts: u32) -> Self {
        self.resubmit = attempts;
        self
    }

    /// Enables the resource-usage summary on success
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Sets the execution strategy
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Scheduler-assigned identifier for a submitted job
///
/// Opaque to the engine: used only to address subsequent status and
/// control calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    /// Wraps a scheduler-assigned identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as given by the scheduler
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Job status as reported by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting in the queue, eligible to run
    QueuedActive,
    /// Executing on a node
    Running,
    /// Suspended while running by user request
    UserSuspended,
    /// Held in the queue by user request
    UserOnHold,
    /// Finished successfully
    Done,
    /// Finished with a bad exit, signal termination, or abort
    Failed,
}

impl JobStatus {
    /// Whether this status ends the monitoring loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Whether this status reflects an applied suspend or hold
    pub fn is_suspended_state(&self) -> bool {
        matches!(self, JobStatus::UserSuspended | JobStatus::UserOnHold)
    }
}

/// Control request issued against a live job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlAction {
    /// Suspend a running job
    Suspend,
    /// Resume a suspended job
    Resume,
    /// Hold a queued job
    Hold,
    /// Release a held job
    Release,
    /// Terminate the job
    Terminate,
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlAction::Suspend => write!(f, "suspend"),
            ControlAction::Resume => write!(f, "resume"),
            ControlAction::Hold => write!(f, "hold"),
            ControlAction::Release => write!(f, "release"),
            ControlAction::Terminate => write!(f, "terminate"),
        }
    }
}

/// Captured output of a finished job
///
/// Produced exactly once per job, at the terminal transition. Failure
/// causes travel on the engine error type together with the captured
/// output, so a failed job can be diagnosed without re-running it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Captured standard output, one entry per line
    pub stdout: Vec<String>,
    /// Captured standard error, one entry per line
    pub stderr: Vec<String>,
}

impl JobOutcome {
    /// An outcome with no captured output
    pub fn empty() -> Self {
        Self::default()
    }
}
