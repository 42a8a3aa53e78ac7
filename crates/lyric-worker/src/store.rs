//! In-memory job store.
//!
//! One `RwLock` guards the whole map. Every transition runs under the write
//! lock against the job in place, so a reader always sees either the state
//! before a transition or the state after it.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error};

use lyric_models::{Job, JobId, JobStatusResponse, ProjectConfig, RenderOutput, TransitionError};

use crate::error::{WorkerError, WorkerResult};

/// Process-lifetime registry of render jobs. Jobs are never removed.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new PENDING job. Does not start any work.
    pub fn submit(&self, config: ProjectConfig) -> Job {
        let job = Job::new(config);
        debug!(job_id = %job.id, "Job created");
        self.write().insert(job.id.clone(), job.clone());
        job
    }

    /// Record a progress milestone.
    ///
    /// A regression or out-of-range value fails the job before the error is
    /// returned, so the caller's mistake is visible to status readers.
    pub fn advance(&self, id: &JobId, progress: u8, message: &str) -> WorkerResult<()> {
        let mut jobs = self.write();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| WorkerError::NotFound(id.clone()))?;

        match job.advance(progress, message) {
            Ok(()) => Ok(()),
            Err(
                err @ (TransitionError::ProgressRegressed { .. }
                | TransitionError::ProgressOutOfRange(_)),
            ) => {
                error!(job_id = %id, "Rejected progress update: {}", err);
                // Cannot fail: the job was non-terminal for advance to get this far
                let _ = job.fail(format!("Internal error: {}", err));
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Mark a PROCESSING job as completed.
    pub fn complete(&self, id: &JobId, output: RenderOutput) -> WorkerResult<()> {
        let mut jobs = self.write();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| WorkerError::NotFound(id.clone()))?;
        job.complete(output)?;
        Ok(())
    }

    /// Mark a PENDING or PROCESSING job as failed. Progress is left as is.
    pub fn fail(&self, id: &JobId, error: impl Into<String>) -> WorkerResult<()> {
        let mut jobs = self.write();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| WorkerError::NotFound(id.clone()))?;
        job.fail(error)?;
        Ok(())
    }

    /// Snapshot of a job.
    pub fn get(&self, id: &JobId) -> WorkerResult<Job> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| WorkerError::NotFound(id.clone()))
    }

    /// Status payload for a job.
    pub fn status(&self, id: &JobId) -> WorkerResult<JobStatusResponse> {
        self.read()
            .get(id)
            .map(JobStatusResponse::from)
            .ok_or_else(|| WorkerError::NotFound(id.clone()))
    }

    /// Snapshots of every job, oldest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave a job half-written: every
    // transition validates before it mutates.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyric_models::{JobStatus, LyricCue};
    use std::path::PathBuf;

    fn config() -> ProjectConfig {
        ProjectConfig::new("bg.mp4", "song.mp3", vec![LyricCue::new("Hello", 0, 1000)])
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
    fn test_submit_creates_pending_job() {
        let store = JobStore::new();
        let job = store.submit(config());

        let stored = store.get(&job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
        assert_eq!(stored.progress, 0);
        assert_eq!(stored.message, "Queued for processing...");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let store = JobStore::new();
        let a = store.submit(config());
        let b = store.submit(config());
        assert_ne!(a.id, b.id);
        assert_eq!(store.list().len(), 2);
    }

    #[test]
    fn test_full_lifecycle() {
        let store = JobStore::new();
        let id = store.submit(config()).id;

        store.advance(&id, 10, "Loading audio...").unwrap();
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Processing);

        store.advance(&id, 30, "Compositing video...").unwrap();
        store.advance(&id, 90, "Finalizing...").unwrap();
        store.complete(&id, output()).unwrap();

        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
        assert_eq!(job.output_path, Some(PathBuf::from("renders/x.mp4")));
    }

    #[test]
    fn test_complete_requires_processing() {
        let store = JobStore::new();
        let id = store.submit(config()).id;
        assert!(matches!(
            store.complete(&id, output()),
            Err(WorkerError::InvalidTransition(TransitionError::NotProcessing(
                JobStatus::Pending
            )))
        ));
    }

    #[test]
    fn test_regression_fails_job() {
        let store = JobStore::new();
        let id = store.submit(config()).id;
        store.advance(&id, 30, "Compositing video...").unwrap();

        let result = store.advance(&id, 10, "Loading audio...");
        assert!(matches!(
            result,
            Err(WorkerError::InvalidTransition(
                TransitionError::ProgressRegressed { from: 30, to: 10 }
            ))
        ));

        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 30);
        assert!(job.error.unwrap().contains("backwards"));
    }

    #[test]
    fn test_out_of_range_fails_job() {
        let store = JobStore::new();
        let id = store.submit(config()).id;
        assert!(store.advance(&id, 101, "overflow").is_err());
        assert_eq!(store.get(&id).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn test_fail_keeps_progress_and_freezes() {
        let store = JobStore::new();
        let id = store.submit(config()).id;
        store.advance(&id, 30, "Compositing video...").unwrap();
        store.fail(&id, "encoder crashed").unwrap();

        let failed = store.get(&id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.progress, 30);
        assert_eq!(failed.message, "Render failed: encoder crashed");

        // Terminal jobs reject every further mutation
        assert!(store.advance(&id, 90, "Finalizing...").is_err());
        assert!(store.fail(&id, "again").is_err());
        assert!(store.complete(&id, output()).is_err());

        let after = store.get(&id).unwrap();
        assert_eq!(after.progress, failed.progress);
        assert_eq!(after.error, failed.error);
        assert_eq!(after.completed_at, failed.completed_at);
    }

    #[test]
    fn test_fail_from_pending() {
        let store = JobStore::new();
        let id = store.submit(config()).id;
        store.fail(&id, "cancelled").unwrap();
        assert_eq!(store.get(&id).unwrap().progress, 0);
    }

    #[test]
    fn test_unknown_job() {
        let store = JobStore::new();
        let id = JobId::new();
        assert!(matches!(store.get(&id), Err(WorkerError::NotFound(_))));
        assert!(matches!(store.status(&id), Err(WorkerError::NotFound(_))));
        assert!(matches!(
            store.advance(&id, 10, "x"),
            Err(WorkerError::NotFound(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_status_payload() {
        let store = JobStore::new();
        let id = store.submit(config()).id;
        let status = store.status(&id).unwrap();
        assert_eq!(status.job_id, id);
        assert_eq!(status.status, JobStatus::Pending);
        assert!(status.error.is_none());
    }
}
