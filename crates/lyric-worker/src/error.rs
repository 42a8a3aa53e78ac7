//! Worker error types.

use std::path::PathBuf;

use thiserror::Error;

use lyric_media::MediaError;
use lyric_models::{ConfigError, JobId, JobStatus, TransitionError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Input file not found or unreadable: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Invalid project: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),

    #[error("Encoding failed: {0}")]
    EncodingError(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {0} is {1}, result not available yet")]
    NotReady(JobId, JobStatus),

    #[error("Render cancelled")]
    Cancelled,

    #[error("Invalid job transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::InputNotFound(_) => "input_not_found",
            WorkerError::InvalidConfig(_) => "invalid_config",
            WorkerError::InvalidTimeline(_) => "invalid_timeline",
            WorkerError::EncodingError(_) => "encoding_error",
            WorkerError::NotFound(_) => "not_found",
            WorkerError::NotReady(..) => "not_ready",
            WorkerError::Cancelled => "cancelled",
            WorkerError::InvalidTransition(_) => "invalid_transition",
            WorkerError::ConfigError(_) => "config",
            WorkerError::Io(_) => "io",
        }
    }
}

impl From<MediaError> for WorkerError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::FileNotFound(path) => WorkerError::InputNotFound(path),
            MediaError::InvalidTimeline(msg) => WorkerError::InvalidTimeline(msg),
            MediaError::Cancelled => WorkerError::Cancelled,
            other => WorkerError::EncodingError(other.detail()),
        }
    }
}
