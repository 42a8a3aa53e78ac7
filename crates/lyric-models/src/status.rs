//! Status and submission payloads returned to callers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{Job, JobId, JobStatus};

/// Returned when a submission is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Snapshot of a job for status polling.
///
/// Completion fields are only present once the job is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub message: String,
    /// RFC 3339
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    /// Output duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics_count: Option<usize>,
    /// Overlays actually drawn; can be lower than `lyrics_count`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        let mut response = Self {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            message: job.message.clone(),
            created_at: job.created_at.to_rfc3339(),
            completed_at: None,
            output_path: None,
            result_url: None,
            duration: None,
            lyrics_count: None,
            overlay_count: None,
            error: None,
        };

        match job.status {
            JobStatus::Completed => {
                response.completed_at = job.completed_at.map(|t| t.to_rfc3339());
                response.output_path = job
                    .output_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned());
                response.result_url = job.result_url.clone();
                response.duration = job.duration_secs;
                response.lyrics_count = job.cue_count;
                response.overlay_count = job.overlay_count;
            }
            JobStatus::Failed => {
                response.completed_at = job.completed_at.map(|t| t.to_rfc3339());
                response.error = job.error.clone();
            }
            JobStatus::Pending | JobStatus::Processing => {}
        }

        response
    }
}
