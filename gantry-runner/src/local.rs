//! Local execution
//!
//! Runs a job request synchronously as a local subprocess, capturing
//! stdout and stderr directly. No scheduler, no script, no polling.

use gantry_core::{JobOutcome, JobRequest};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::JobError;

/// Runs the request's command locally through `sh -c`
///
/// Environment overrides and the working directory are applied to the
/// subprocess. With `echo` set, every captured line is also logged.
pub async fn run_job_locally(request: &JobRequest, echo: bool) -> Result<JobOutcome, JobError> {
    debug!("running locally: {}", request.command);

    let mut command = Command::new("sh");
    command.arg("-c").arg(&request.command);

    if let Some(environment) = &request.environment {
        command.envs(environment);
    }
    if let Some(dir) = &request.working_directory {
        command.current_dir(dir);
    }

    let output = command.output().await.map_err(|source| JobError::LocalSpawn {
        command: request.command.clone(),
        source,
    })?;

    let stdout = into_lines(&output.stdout);
    let stderr = into_lines(&output.stderr);

    if echo {
        for line in stdout.iter().chain(stderr.iter()) {
            info!("{}", line);
        }
    }

    if output.status.success() {
        Ok(JobOutcome { stdout, stderr })
    } else {
        Err(JobError::LocalFailed {
            command: request.command.clone(),
            exit_code: output.status.code(),
            stdout,
            stderr,
        })
    }
}

fn into_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_captures_stdout() {
        let request = JobRequest::new("echo hello");
        let outcome = run_job_locally(&request, false).await.unwrap();

        assert_eq!(outcome.stdout, vec!["hello".to_string()]);
        assert!(outcome.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_a_job_failure() {
        let request = JobRequest::new("echo boom >&2; exit 3");
        let err = run_job_locally(&request, false).await.unwrap_err();

        match err {
            JobError::LocalFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, vec!["boom".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_environment_overrides_apply() {
        let mut environment = HashMap::new();
        environment.insert("GANTRY_TEST_VALUE".to_string(), "25".to_string());

        let request =
            JobRequest::new("echo $GANTRY_TEST_VALUE").with_environment(environment);
        let outcome = run_job_locally(&request, false).await.unwrap();

        assert_eq!(outcome.stdout, vec!["25".to_string()]);
    }

    #[tokio::test]
    async fn test_working_directory_applies() {
        let dir = tempfile::tempdir().unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();

        let request = JobRequest::new("pwd").with_working_directory(dir.path());
        let outcome = run_job_locally(&request, false).await.unwrap();

        let reported = std::fs::canonicalize(&outcome.stdout[0]).unwrap();
        assert_eq!(reported, expected);
    }
}
