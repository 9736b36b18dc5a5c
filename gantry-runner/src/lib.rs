//! Gantry Runner
//!
//! The job engine: renders shell commands into scheduler job scripts,
//! submits them, monitors them to a terminal state, and returns their
//! captured output.
//!
//! Architecture:
//! - Script builder: one executable script per job on shared storage
//! - Submission monitor: the retry-tolerant status-polling loop
//! - Resubmission policy: whole-job retries around the monitor
//! - Output retriever: best-effort capture of redirected output
//! - Dispatcher: scheduler / local / touch-only execution strategies
//!
//! Many jobs are monitored concurrently as tokio tasks against one shared
//! scheduler session; each monitor yields at its sleeps, which are also
//! where cancellation is observed.
//!
//! # Example
//!
//! ```no_run
//! use gantry_core::JobRequest;
//! use gantry_runner::{Config, RunContext, run_job};
//! use std::sync::Arc;
//!
//! # async fn example() -> gantry_runner::Result<()> {
//! let context = RunContext::new(Config::default())
//!     .with_session(Arc::new(gantry_client::SlurmSession::new()));
//!
//! let request = JobRequest::new("awk '{print $1*$1}' file_5_in > file_5_out")
//!     .with_name("toy")
//!     .with_script_directory("/shared/drmaa")
//!     .with_resubmit(2);
//!
//! let outcome = run_job(&request, &context).await?;
//! println!("captured {} stdout lines", outcome.stdout.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod local;
pub mod monitor;
pub mod output;
pub mod resubmit;
pub mod script;
pub mod suspend;
pub mod touch;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{RunContext, run_job};
pub use error::{JobError, Result};
pub use suspend::{NeverSuspended, SuspendFlag, SuspendSignal};
