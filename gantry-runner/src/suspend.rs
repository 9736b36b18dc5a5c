//! Suspend signal from the orchestration layer
//!
//! The monitoring loop polls [`SuspendSignal::is_job_suspended`] once per
//! iteration; it is the only callback the engine ever makes into the
//! layer that owns the pipeline.

use std::sync::atomic::{AtomicBool, Ordering};

/// External suspend state for a job line
pub trait SuspendSignal: Send + Sync {
    /// Whether jobs on this line should currently be suspended
    fn is_job_suspended(&self) -> bool;
}

/// Signal that never requests suspension
#[derive(Debug, Default)]
pub struct NeverSuspended;

impl SuspendSignal for NeverSuspended {
    fn is_job_suspended(&self) -> bool {
        false
    }
}

/// Shared boolean suspend switch
#[derive(Debug, Default)]
pub struct SuspendFlag(AtomicBool);

impl SuspendFlag {
    /// Creates a flag in the not-suspended state
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the suspend state
    pub fn set_suspended(&self, suspended: bool) {
        self.0.store(suspended, Ordering::SeqCst);
    }
}

impl SuspendSignal for SuspendFlag {
    fn is_job_suspended(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
