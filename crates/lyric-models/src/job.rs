//! Render jobs and their lifecycle.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransitionError;
use crate::project::ProjectConfig;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job is waiting for a worker slot
    #[default]
    Pending,
    /// Job is being rendered
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed with an error
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a successful render produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderOutput {
    /// Final encoded file
    pub output_path: PathBuf,
    /// Output duration in seconds
    pub duration_secs: f64,
    /// Number of cues submitted
    pub cue_count: usize,
    /// Number of cues that produced an overlay
    pub overlay_count: usize,
    /// Public URL if the result was uploaded
    pub result_url: Option<String>,
}

/// A render job.
///
/// Mutated only through [`Job::advance`], [`Job::complete`] and [`Job::fail`];
/// once terminal every further transition is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Current status
    pub status: JobStatus,

    /// Progress (0-100)
    pub progress: u8,

    /// Human-readable description of the current step
    pub message: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Set when the job reaches a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Submitted project
    pub config: ProjectConfig,

    /// Encoded output (completed jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Public URL from the uploader
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,

    /// Output duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,

    /// Number of submitted cues
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cue_count: Option<usize>,

    /// Number of overlays drawn (cues with empty text or no duration are skipped)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay_count: Option<usize>,

    /// Error message (failed jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            progress: 0,
            message: "Queued for processing...".to_string(),
            created_at: Utc::now(),
            completed_at: None,
            config,
            output_path: None,
            result_url: None,
            duration_secs: None,
            cue_count: None,
            overlay_count: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record a progress milestone; the first one moves PENDING to PROCESSING.
    pub fn advance(
        &mut self,
        progress: u8,
        message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self.status));
        }
        if progress > 100 {
            return Err(TransitionError::ProgressOutOfRange(progress));
        }
        if progress < self.progress {
            return Err(TransitionError::ProgressRegressed {
                from: self.progress,
                to: progress,
            });
        }

        self.status = JobStatus::Processing;
        self.progress = progress;
        self.message = message.into();
        Ok(())
    }

    /// Mark job as completed.
    pub fn complete(&mut self, output: RenderOutput) -> Result<(), TransitionError> {
        match self.status {
            JobStatus::Processing => {}
            JobStatus::Pending => return Err(TransitionError::NotProcessing(self.status)),
            status => return Err(TransitionError::Terminal(status)),
        }

        self.status = JobStatus::Completed;
        self.progress = 100;
        self.message = "Render complete!".to_string();
        self.completed_at = Some(Utc::now());
        self.output_path = Some(output.output_path);
        self.result_url = output.result_url;
        self.duration_secs = Some(output.duration_secs);
        self.cue_count = Some(output.cue_count);
        self.overlay_count = Some(output.overlay_count);
        Ok(())
    }

    /// Mark job as failed. Progress stays at the last milestone.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self.status));
        }

        let mut error = error.into();
        if error.trim().is_empty() {
            error = "Render failed for an unknown reason".to_string();
        }

        self.status = JobStatus::Failed;
        self.message = format!("Render failed: {}", error);
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::LyricCue;

    fn job() -> Job {
        Job::new(ProjectConfig::new(
            "bg.mp4",
            "audio.mp3",
            vec![LyricCue::new("Hello", 0, 1000)],
        ))
    }

    fn output() -> RenderOutput {
        RenderOutput {
            output_path: PathBuf::from("renders/x.mp4"),
            duration_secs: 5.0,
            cue_count: 1,
            overlay_count: 1,
            result_url: None,
        }
    }

    #[test]
    fn test_job_creation() {
        let job = job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.completed_at.is_none());
        assert!(Uuid::parse_str(job.id.as_str()).is_ok());
    }

    #[test]
    fn test_job_state_transitions() {
        let mut job = job();

        job.advance(10, "Loading audio...").unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 10);

        job.advance(30, "Compositing video...").unwrap();
        job.complete(output()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
        assert_eq!(job.output_path, Some(PathBuf::from("renders/x.mp4")));
        assert_eq!(job.cue_count, Some(1));
        assert_eq!(job.overlay_count, Some(1));
    }

    #[test]
    fn test_progress_may_repeat_but_not_regress() {
        let mut job = job();
        job.advance(30, "a").unwrap();
        job.advance(30, "b").unwrap();
        assert_eq!(
            job.advance(10, "c"),
            Err(TransitionError::ProgressRegressed { from: 30, to: 10 })
        );
        assert_eq!(job.progress, 30);
        assert_eq!(job.advance(101, "d"), Err(TransitionError::ProgressOutOfRange(101)));
    }

    #[test]
    fn test_complete_requires_processing() {
        let mut job = job();
        assert_eq!(
            job.complete(output()),
            Err(TransitionError::NotProcessing(JobStatus::Pending))
        );
    }

    #[test]
    fn test_fail_keeps_progress() {
        let mut job = job();
        job.advance(30, "Compositing video...").unwrap();
        job.fail("encoder exploded").unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 30);
        assert_eq!(job.error.as_deref(), Some("encoder exploded"));
        assert_eq!(job.message, "Render failed: encoder exploded");
    }

    #[test]
    fn test_fail_from_pending_and_blank_error() {
        let mut job = job();
        job.fail("  ").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(!job.error.as_deref().unwrap_or_default().is_empty());
    }

    #[test]
    fn test_terminal_jobs_are_frozen() {
        let mut job = job();
        job.advance(10, "x").unwrap();
        job.complete(output()).unwrap();

        let frozen = Err(TransitionError::Terminal(JobStatus::Completed));
        assert_eq!(job.advance(100, "y"), frozen);
        assert_eq!(job.fail("late"), frozen);
        assert_eq!(job.complete(output()), frozen);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"PROCESSING\""
        );
        assert_eq!(JobStatus::Failed.to_string(), "FAILED");
        assert!(JobStatus::Completed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }
}
