//! Render service: submission, status and result lookup over the engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use lyric_media::MediaBackend;
use lyric_models::{JobId, JobStatus, JobStatusResponse, ProjectConfig, SubmitResponse};
use lyric_storage::Uploader;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::pipeline::RenderPipeline;
use crate::runner::{JobRunner, RenderHandle};
use crate::store::JobStore;

/// Entry point for callers: validates submissions, starts jobs and answers
/// status queries without ever waiting on a render.
pub struct RenderService {
    store: Arc<JobStore>,
    runner: JobRunner,
    handles: Mutex<HashMap<JobId, RenderHandle>>,
}

impl RenderService {
    /// Build the engine. The render directory must already exist.
    pub fn new(
        config: &WorkerConfig,
        backend: Arc<dyn MediaBackend>,
        uploader: Arc<dyn Uploader>,
    ) -> WorkerResult<Self> {
        if !config.render_dir.is_dir() {
            return Err(WorkerError::config_error(format!(
                "render directory {} does not exist",
                config.render_dir.display()
            )));
        }

        let store = Arc::new(JobStore::new());
        let pipeline = Arc::new(RenderPipeline::new(
            backend,
            uploader,
            config.render_dir.clone(),
            config.compositor_settings(),
        ));
        let runner = JobRunner::new(Arc::clone(&store), pipeline, config.max_concurrent_jobs);

        info!(
            "Render service ready: {} max concurrent jobs, output to {}",
            config.max_concurrent_jobs,
            config.render_dir.display()
        );

        Ok(Self {
            store,
            runner,
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// Validate and enqueue a project. Rejected submissions create no job.
    pub fn submit(&self, config: ProjectConfig) -> WorkerResult<SubmitResponse> {
        config.validate()?;
        ensure_exists(&config.background_path)?;
        ensure_exists(&config.audio_path)?;

        let job = self.store.submit(config);
        let handle = self.runner.start(&job);
        {
            let mut handles = self.handles();
            handles.retain(|_, h| !h.is_finished());
            handles.insert(job.id.clone(), handle);
        }
        metrics::record_job_submitted();

        info!(job_id = %job.id, "Job submitted");
        Ok(SubmitResponse {
            job_id: job.id,
            status: job.status,
        })
    }

    /// Parse a JSON submission and enqueue it.
    pub fn submit_json(&self, json: &str) -> WorkerResult<SubmitResponse> {
        let config = ProjectConfig::from_json(json)?;
        self.submit(config)
    }

    pub fn status(&self, job_id: &JobId) -> WorkerResult<JobStatusResponse> {
        self.store.status(job_id)
    }

    /// Path of a completed render.
    pub fn result_path(&self, job_id: &JobId) -> WorkerResult<PathBuf> {
        let job = self.store.get(job_id)?;
        if job.status != JobStatus::Completed {
            return Err(WorkerError::NotReady(job.id, job.status));
        }

        match job.output_path {
            Some(path) if path.is_file() => Ok(path),
            _ => Err(WorkerError::NotFound(job.id)),
        }
    }

    /// Request cancellation of a job that has not finished yet.
    /// Cancelling a terminal job is a no-op.
    pub fn cancel(&self, job_id: &JobId) -> WorkerResult<()> {
        // Ensure the job exists even if its handle was already pruned
        self.store.get(job_id)?;
        if let Some(handle) = self.handle(job_id) {
            handle.cancel();
        }
        Ok(())
    }

    /// Wait for a job to reach a terminal state and return its final status.
    pub async fn wait(&self, job_id: &JobId) -> WorkerResult<JobStatusResponse> {
        self.store.get(job_id)?;
        if let Some(handle) = self.handle(job_id) {
            handle.wait().await;
            self.handles().remove(job_id);
        }
        self.store.status(job_id)
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    fn handle(&self, job_id: &JobId) -> Option<RenderHandle> {
        self.handles().get(job_id).cloned()
    }

    fn handles(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, RenderHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ensure_exists(path: &Path) -> WorkerResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(WorkerError::InputNotFound(path.to_path_buf()))
    }
}
