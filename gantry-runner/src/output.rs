//! Output retrieval
//!
//! Reads back the stdout/stderr files the scheduler redirected for a
//! finished job. Shared filesystems commit freshly closed files with some
//! delay, so existence is re-checked a few times before reading. Capture
//! is best-effort: a stream that never appears yields empty output and a
//! warning, never a job failure. Both files are removed afterwards.

use std::fs;
use std::path::Path;
use tracing::warn;

use crate::config::Config;

/// Reads and removes the output files of a finished job
///
/// Returns the captured stdout and stderr lines; missing or unreadable
/// streams come back empty.
pub async fn read_job_output(
    stdout_path: &Path,
    stderr_path: &Path,
    command: &str,
    config: &Config,
) -> (Vec<String>, Vec<String>) {
    // Wait for the filesystem to surface both files before the first read
    for _ in 0..config.output_read_retries {
        if stdout_path.exists() && stderr_path.exists() {
            break;
        }
        tokio::time::sleep(config.output_read_delay).await;
    }

    let stdout = read_lines(stdout_path, "stdout", command);
    let stderr = read_lines(stderr_path, "stderr", command);

    // Cleanup ignoring errors; it must never mask the job's outcome
    let _ = fs::remove_file(stdout_path);
    let _ = fs::remove_file(stderr_path);

    (stdout, stderr)
}

fn read_lines(path: &Path, stream: &str, command: &str) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(e) => {
            warn!("could not open {}: {} for\n{}", stream, e, command);
            Vec::new()
        }
    }
}
