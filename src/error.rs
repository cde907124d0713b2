//! Error taxonomy for the automation runtime.
//!
//! Recoverable per-posting failures stay inside the orchestrator as events;
//! only failures that end a run surface as [`RunError`].

use crate::fallback::FallbackError;
use thiserror::Error;

/// A failure that terminates the run it occurred in.
#[derive(Debug, Error)]
pub enum RunError {
    /// Every resource acquisition strategy failed.
    #[error("resource acquisition exhausted: {0}")]
    ResourceAcquisition(#[from] FallbackError),

    /// Login did not complete. `challenge` marks a verification page that
    /// retrying cannot clear.
    #[error("authentication failed: {message}")]
    Authentication { challenge: bool, message: String },

    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RunError {
    /// Whether retrying the same operation could plausibly succeed.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            RunError::Authentication {
                challenge: false,
                ..
            }
        )
    }
}
