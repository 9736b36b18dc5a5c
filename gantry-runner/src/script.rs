//! Job script lifecycle
//!
//! Renders a job request into an executable script on shared storage. The
//! script records the request's parameters as comment lines so a failed
//! job can be inspected (and re-run by hand) after the fact, and its path
//! determines where the scheduler redirects the job's output streams.

use gantry_core::{JobHandle, JobRequest};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::JobError;

/// A rendered job script and its derived output paths
#[derive(Debug, Clone)]
pub struct JobScript {
    /// The executable script
    pub path: PathBuf,
    /// Where the scheduler is told to redirect standard output
    pub stdout_path: PathBuf,
    /// Where the scheduler is told to redirect standard error
    pub stderr_path: PathBuf,
}

impl JobScript {
    /// Removes or retains the script after the job finished
    ///
    /// Retained scripts are renamed with the scheduler handle so they form
    /// a permanent audit trail; without a handle (the job was never
    /// submitted successfully) the script is left in place unrenamed.
    /// Cleanup never fails: problems are logged and ignored.
    pub fn cleanup(&self, retain: bool, handle: Option<&JobHandle>) {
        if retain {
            if let Some(handle) = handle {
                let retained = PathBuf::from(format!("{}.{}", self.path.display(), handle));
                debug!("retaining job script as {}", retained.display());
                if let Err(e) = fs::rename(&self.path, &retained) {
                    warn!(
                        "could not retain job script {}: {}",
                        self.path.display(),
                        e
                    );
                }
            }
        } else if let Err(e) = fs::remove_file(&self.path) {
            warn!(
                "job script {} missing (and ignored) at clean-up: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Writes the job script for a request into the given directory
///
/// The file name combines job name, timestamp, and a random suffix so
/// concurrently created jobs never collide without any locking. Any
/// filesystem error is fatal for the job and propagates unmodified.
pub fn write_job_script(request: &JobRequest, directory: &Path) -> Result<JobScript, JobError> {
    // Create the script directory if necessary; create_dir_all tolerates
    // concurrent creation by other jobs
    fs::create_dir_all(directory).map_err(|source| JobError::Script {
        path: directory.to_path_buf(),
        source,
    })?;

    let name = request.name.as_deref().unwrap_or("gantry_script");
    let suffix = Uuid::new_v4().simple().to_string();
    let file_name = format!(
        "{}_{}__{}",
        name,
        request.created_at.format("%Y_%m_%d_%H_%M_%S"),
        &suffix[..8]
    );
    let path = directory.join(file_name);

    let contents = render_script(request);
    fs::write(&path, contents).map_err(|source| JobError::Script {
        path: path.clone(),
        source,
    })?;

    // Owner and group need to execute the script; the scheduler may run it
    // under a shared group account
    fs::set_permissions(&path, fs::Permissions::from_mode(0o770)).map_err(|source| {
        JobError::Script {
            path: path.clone(),
            source,
        }
    })?;

    debug!("wrote job script {}", path.display());

    let stdout_path = PathBuf::from(format!("{}.stdout", path.display()));
    let stderr_path = PathBuf::from(format!("{}.stderr", path.display()));

    Ok(JobScript {
        path,
        stdout_path,
        stderr_path,
    })
}

/// Renders the script text: shebang, metadata comment block, command
fn render_script(request: &JobRequest) -> String {
    // #!/bin/sh is as close to universally portable as it gets
    let mut script = String::from("#!/bin/sh\n");

    for (key, value) in [
        ("job_name", request.name.clone()),
        ("job_options", request.native_options.clone()),
        ("job_environment", request.environment.as_ref().map(render_environment)),
        (
            "working_directory",
            request
                .working_directory
                .as_ref()
                .map(|d| d.display().to_string()),
        ),
    ] {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            script.push_str(&format!("#{}={}\n", key, value));
        }
    }

    script.push_str(&request.command);
    script.push('\n');
    script
}

/// Renders environment overrides as sorted `KEY=VALUE` pairs
fn render_environment(environment: &std::collections::HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = environment
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    pairs.sort();
    pairs.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_script_contents() {
        let dir = tempfile::tempdir().unwrap();
        let mut environment = HashMap::new();
        environment.insert("BASH_ENV".to_string(), "~/.bashrc".to_string());

        let request = JobRequest::new("echo 5*5")
            .with_name("toy")
            .with_native_options("--ntasks=1")
            .with_environment(environment)
            .with_working_directory("/data");

        let script = write_job_script(&request, dir.path()).unwrap();
        let contents = fs::read_to_string(&script.path).unwrap();
        let lines: Vec<_> = contents.lines().collect();

        assert_eq!(lines[0], "#!/bin/sh");
        assert_eq!(lines[1], "#job_name=toy");
        assert_eq!(lines[2], "#job_options=--ntasks=1");
        assert_eq!(lines[3], "#job_environment=BASH_ENV=~/.bashrc");
        assert_eq!(lines[4], "#working_directory=/data");
        assert_eq!(lines[5], "echo 5*5");
    }

    #[test]
    fn test_script_omits_empty_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let request = JobRequest::new("echo hello");

        let script = write_job_script(&request, dir.path()).unwrap();
        let contents = fs::read_to_string(&script.path).unwrap();

        assert_eq!(contents, "#!/bin/sh\necho hello\n");
    }

    #[test]
    fn test_script_is_executable() {
        let dir = tempfile::tempdir().unwrap();
        let request = JobRequest::new("echo hello").with_name("toy");

        let script = write_job_script(&request, dir.path()).unwrap();
        let mode = fs::metadata(&script.path).unwrap().permissions().mode();

        assert_eq!(mode & 0o777, 0o770);
    }

    #[test]
    fn test_derived_output_paths() {
        let dir = tempfile::tempdir().unwrap();
        let request = JobRequest::new("echo hello").with_name("toy");

        let script = write_job_script(&request, dir.path()).unwrap();

        assert_eq!(
            script.stdout_path.display().to_string(),
            format!("{}.stdout", script.path.display())
        );
        assert_eq!(
            script.stderr_path.display().to_string(),
            format!("{}.stderr", script.path.display())
        );
    }

    #[test]
    fn test_concurrent_scripts_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let request = JobRequest::new("echo hello").with_name("toy");

        let first = write_job_script(&request, dir.path()).unwrap();
        let second = write_job_script(&request, dir.path()).unwrap();

        assert_ne!(first.path, second.path);
        assert!(first.path.exists());
        assert!(second.path.exists());
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("drmaa").join("scripts");
        let request = JobRequest::new("echo hello");

        let script = write_job_script(&request, &nested).unwrap();
        assert!(script.path.exists());
    }

    #[test]
    fn test_cleanup_removes_script() {
        let dir = tempfile::tempdir().unwrap();
        let request = JobRequest::new("echo hello");

        let script = write_job_script(&request, dir.path()).unwrap();
        script.cleanup(false, Some(&JobHandle::new("123")));

        assert!(!script.path.exists());
    }

    #[test]
    fn test_cleanup_retains_script_with_handle_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let request = JobRequest::new("echo hello");

        let script = write_job_script(&request, dir.path()).unwrap();
        script.cleanup(true, Some(&JobHandle::new("123456")));

        assert!(!script.path.exists());
        let retained = PathBuf::from(format!("{}.123456", script.path.display()));
        assert!(retained.exists());
    }

    #[test]
    fn test_cleanup_without_handle_leaves_retained_script() {
        let dir = tempfile::tempdir().unwrap();
        let request = JobRequest::new("echo hello");

        let script = write_job_script(&request, dir.path()).unwrap();
        script.cleanup(true, None);

        assert!(script.path.exists());
    }
}
