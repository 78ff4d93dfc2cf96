//! Error types for vidscan.

use crate::job::{JobId, JobStatus};
use std::time::Duration;
use thiserror::Error;

/// Library-level error type for vidscan operations.
#[derive(Error, Debug)]
pub enum VidscanError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Illegal job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Media fetch failed: {0}")]
    Fetch(String),

    #[error("Audio transcoding failed: {0}")]
    Transcode(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Content analysis failed: {0}")]
    Analysis(String),

    #[error("Pipeline exceeded its {}s wall-clock limit", .limit.as_secs_f64())]
    Timeout { limit: Duration },

    #[error("Job store error: {0}")]
    Store(String),

    #[error("Dispatcher unavailable: {0}")]
    Dispatch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Coarse classification of a [`VidscanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Fetch,
    Transcode,
    Transcription,
    Analysis,
    Timeout,
    Store,
    Config,
}

impl VidscanError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VidscanError::NotFound(_) => ErrorKind::NotFound,
            VidscanError::InvalidTransition { .. } => ErrorKind::Conflict,
            VidscanError::Fetch(_) => ErrorKind::Fetch,
            VidscanError::Transcode(_) => ErrorKind::Transcode,
            VidscanError::Transcription(_) => ErrorKind::Transcription,
            VidscanError::Analysis(_) => ErrorKind::Analysis,
            VidscanError::Timeout { .. } => ErrorKind::Timeout,
            VidscanError::Store(_) | VidscanError::Database(_) | VidscanError::Dispatch(_) => {
                ErrorKind::Store
            }
            VidscanError::Config(_)
            | VidscanError::InvalidInput(_)
            | VidscanError::ToolNotFound(_)
            | VidscanError::TomlParse(_) => ErrorKind::Config,
            // Inside a stage the orchestrator re-tags these with the stage kind;
            // outside one they come from persistence or scratch-dir setup.
            VidscanError::Io(_) | VidscanError::Json(_) => ErrorKind::Store,
        }
    }

    /// True if this error ends a job in `failed` rather than aborting the worker.
    pub fn is_job_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Fetch
                | ErrorKind::Transcode
                | ErrorKind::Transcription
                | ErrorKind::Analysis
                | ErrorKind::Timeout
        )
    }

    /// True for persistence faults that leave the job record in an unknown state.
    pub fn is_infrastructure(&self) -> bool {
        self.kind() == ErrorKind::Store
    }
}

/// Result type alias for vidscan operations.
pub type Result<T> = std::result::Result<T, VidscanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_errors_are_job_failures() {
        assert!(VidscanError::Fetch("x".into()).is_job_failure());
        assert!(VidscanError::Transcode("x".into()).is_job_failure());
        assert!(VidscanError::Transcription("x".into()).is_job_failure());
        assert!(VidscanError::Analysis("x".into()).is_job_failure());
        assert!(VidscanError::Timeout {
            limit: Duration::from_secs(1)
        }
        .is_job_failure());
    }

    #[test]
    fn test_store_errors_are_infrastructure() {
        let err = VidscanError::Store("disk full".into());
        assert!(err.is_infrastructure());
        assert!(!err.is_job_failure());
        assert!(!VidscanError::NotFound(JobId(3)).is_job_failure());
    }

    #[test]
    fn test_timeout_message_keeps_fractions() {
        let short = VidscanError::Timeout {
            limit: Duration::from_millis(300),
        };
        assert_eq!(short.to_string(), "Pipeline exceeded its 0.3s wall-clock limit");
        let long = VidscanError::Timeout {
            limit: Duration::from_secs(3600),
        };
        assert_eq!(long.to_string(), "Pipeline exceeded its 3600s wall-clock limit");
    }

    #[test]
    fn test_transition_error_message() {
        let err = VidscanError::InvalidTransition {
            from: JobStatus::Completed,
            to: JobStatus::Processing,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "Illegal job transition: completed -> processing");
    }
}
