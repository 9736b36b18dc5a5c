//! Gantry Runner binary
//!
//! Minimal entry point: runs one shell command as a job, locally by
//! default or through the SLURM session when GANTRY_USE_SLURM is set.
//! Engine delays and ceilings come from GANTRY_* environment variables.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gantry_client::SlurmSession;
use gantry_core::{ExecutionMode, JobRequest};
use gantry_runner::{Config, RunContext, run_job};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gantry_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if command.is_empty() {
        anyhow::bail!("usage: gantry-runner <command>");
    }

    let config = Config::from_env();
    config.validate()?;

    let mut context = RunContext::new(config);
    let mut request = JobRequest::new(&command);

    if std::env::var("GANTRY_USE_SLURM").is_ok() {
        info!("submitting through the scheduler: {}", command);
        context = context.with_session(Arc::new(SlurmSession::new()));
    } else {
        info!("running locally: {}", command);
        request = request.with_mode(ExecutionMode::Local { echo: false });
    }

    let outcome = run_job(&request, &context)
        .await
        .context("job did not complete")?;

    for line in &outcome.stdout {
        println!("{}", line);
    }
    for line in &outcome.stderr {
        eprintln!("{}", line);
    }

    Ok(())
}
