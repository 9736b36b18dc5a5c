//! Touch-only execution
//!
//! Marks a job's declared output files as produced without running
//! anything. Used for dry-run simulation of a pipeline: only the files'
//! existence is the contract, not their content.

use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

use crate::error::JobError;

/// Touches every declared output file
///
/// Existing files keep their content and get a fresh modification time;
/// missing files are created empty.
pub fn touch_output_files(output_files: &[PathBuf]) -> Result<(), JobError> {
    for path in output_files {
        debug!("touching output file {}", path.display());

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| JobError::Touch {
                path: path.clone(),
                source,
            })?;

        file.set_modified(SystemTime::now())
            .map_err(|source| JobError::Touch {
                path: path.clone(),
                source,
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_missing_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = vec![dir.path().join("a_out"), dir.path().join("b_out")];

        touch_output_files(&outputs).unwrap();

        assert!(outputs.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_existing_content_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_out");
        fs::write(&path, "precious").unwrap();

        touch_output_files(&[path.clone()]).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "precious");
    }

    #[test]
    fn test_unwritable_output_is_an_error() {
        let err = touch_output_files(&[PathBuf::from("/nonexistent-dir/a_out")]).unwrap_err();
        assert!(matches!(err, JobError::Touch { .. }));
    }
}
