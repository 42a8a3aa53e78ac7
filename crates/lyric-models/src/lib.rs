//! Shared data models for the lyric video render engine.
//!
//! This crate provides Serde-serializable types for:
//! - Lyric cues and project submissions
//! - Render jobs and their lifecycle transitions
//! - Status and submission response payloads

pub mod cue;
pub mod error;
pub mod job;
pub mod project;
pub mod status;

// Re-export common types
pub use cue::LyricCue;
pub use error::{ConfigError, TransitionError};
pub use job::{Job, JobId, JobStatus, RenderOutput};
pub use project::ProjectConfig;
pub use status::{JobStatusResponse, SubmitResponse};
