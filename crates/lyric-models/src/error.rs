//! Model-level error types.

use thiserror::Error;

use crate::job::JobStatus;

/// A project submission that cannot be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Lyrics must be a non-empty array")]
    EmptyCues,

    #[error("Lyric at index {index} has invalid timing (end must be > start)")]
    InvalidCueTiming { index: usize },

    #[error("Malformed project: {0}")]
    Malformed(String),
}

/// An illegal job state-machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job is already {0} and can no longer change")]
    Terminal(JobStatus),

    #[error("job must be PROCESSING to complete, but is {0}")]
    NotProcessing(JobStatus),

    #[error("progress went backwards from {from} to {to}")]
    ProgressRegressed { from: u8, to: u8 },

    #[error("progress {0} is outside 0..=100")]
    ProgressOutOfRange(u8),
}
