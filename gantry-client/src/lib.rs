//! Gantry Scheduler Client
//!
//! A thin adapter over an external batch scheduler's submit/poll/control
//! surface.
//!
//! The engine talks to the scheduler exclusively through the
//! [`SchedulerSession`] trait, so the same monitoring loop runs against a
//! real resource manager ([`SlurmSession`]) or a scripted
//! [`mock::MockSession`] in tests.
//!
//! # Example
//!
//! ```no_run
//! use gantry_client::{JobTemplate, SchedulerSession, SlurmSession};
//!
//! # async fn example() -> gantry_client::Result<()> {
//! let session = SlurmSession::new();
//!
//! let template = JobTemplate::new(
//!     Some("toy"),
//!     "/shared/scripts/toy_job",
//!     "/shared/scripts/toy_job.stdout",
//!     "/shared/scripts/toy_job.stderr",
//! );
//!
//! let handle = session.submit(&template).await?;
//! println!("submitted as {}", handle);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod mock;
mod slurm;

// Re-export commonly used types
pub use error::{Result, SessionError};
pub use slurm::SlurmSession;

use async_trait::async_trait;
use gantry_core::{ControlAction, JobHandle, JobStatus};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Submission parameters for one scheduler job
///
/// Built once per submission attempt from the job request and the
/// generated job script: the scheduler is instructed to run
/// `command_path` and bind its output streams to `stdout_path` and
/// `stderr_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTemplate {
    /// Name the job is submitted under
    pub job_name: String,
    /// Scheduler-native option string, passed through uninterpreted
    pub native_options: Option<String>,
    /// Environment variable overrides for the job
    pub environment: HashMap<String, String>,
    /// Working directory for the job (scheduler default when unset)
    pub working_directory: Option<PathBuf>,
    /// The job script the scheduler runs
    pub command_path: PathBuf,
    /// Where the scheduler redirects the job's standard output
    pub stdout_path: PathBuf,
    /// Where the scheduler redirects the job's standard error
    pub stderr_path: PathBuf,
}

impl JobTemplate {
    /// Creates a template for the given script and output paths
    ///
    /// Nameless jobs break some scheduler frontends, so a missing name is
    /// replaced with a generated `gantry_job_<timestamp>` one.
    pub fn new(
        job_name: Option<&str>,
        command_path: impl AsRef<Path>,
        stdout_path: impl AsRef<Path>,
        stderr_path: impl AsRef<Path>,
    ) -> Self {
        let job_name = match job_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!(
                "gantry_job_{}",
                chrono::Utc::now().format("%Y_%m_%d_%H_%M_%S")
            ),
        };

        Self {
            job_name,
            native_options: None,
            environment: HashMap::new(),
            working_directory: None,
            command_path: command_path.as_ref().to_path_buf(),
            stdout_path: stdout_path.as_ref().to_path_buf(),
            stderr_path: stderr_path.as_ref().to_path_buf(),
        }
    }

    /// Sets the scheduler-native option string
    pub fn with_native_options(mut self, options: impl Into<String>) -> Self {
        self.native_options = Some(options.into());
        self
    }

    /// Sets environment variable overrides
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// Sets the working directory
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }
}

/// Session with an external batch scheduler
///
/// One session is shared read-mostly across all concurrently monitored
/// jobs; implementations must support concurrent submit/status/control
/// calls without external locking.
#[async_trait]
pub trait SchedulerSession: Send + Sync {
    /// Submit a job, returning the scheduler-assigned handle
    async fn submit(&self, template: &JobTemplate) -> Result<JobHandle>;

    /// Query the current status of a submitted job
    async fn status(&self, handle: &JobHandle) -> Result<JobStatus>;

    /// Issue a control action against a submitted job
    async fn control(&self, handle: &JobHandle, action: ControlAction) -> Result<()>;

    /// Fetch resource-usage figures for a job (keys are scheduler-specific)
    async fn resource_usage(&self, handle: &JobHandle) -> Result<HashMap<String, String>>;

    /// Release per-job scheduler resources associated with a template
    ///
    /// Called exactly once per submission attempt, after the job reaches a
    /// terminal state or monitoring is abandoned.
    async fn release(&self, template: &JobTemplate) -> Result<()>;
}
