//! Error types for scheduler sessions

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors reported by a scheduler session
///
/// The distinction between [`SessionError::Communication`] and the other
/// variants drives the whole retry policy: a communication failure means
/// the call to the scheduler itself did not complete and says nothing
/// about the job, while the other variants are answers from a reachable
/// scheduler.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The scheduler could not be reached (daemon down, socket timeout)
    #[error("scheduler unreachable: {0}")]
    Communication(String),

    /// The scheduler answered with a status report the adapter does not
    /// recognize
    #[error("scheduler diagnostic: {0}")]
    Diagnostic(String),

    /// The scheduler's response could not be decoded
    #[error("invalid scheduler response: {0}")]
    Parse(String),
}

impl SessionError {
    /// Check if this error means the scheduler itself was unreachable
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication(_))
    }

    /// Check if this error is a status report from a reachable scheduler
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Diagnostic(_))
    }
}
