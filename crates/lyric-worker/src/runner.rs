//! Job runner.
//!
//! Each started job gets its own tokio task. A FIFO semaphore bounds how
//! many renders run at once; jobs waiting for a permit stay PENDING.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, Instrument};

use lyric_models::{Job, JobId};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::{ProgressReporter, RenderPipeline};
use crate::store::JobStore;

/// Forwards pipeline milestones to the job store.
pub struct StoreReporter {
    store: Arc<JobStore>,
    job_id: JobId,
    logger: JobLogger,
}

impl StoreReporter {
    pub fn new(store: Arc<JobStore>, job_id: JobId) -> Self {
        let logger = JobLogger::new(&job_id, "render");
        Self {
            store,
            job_id,
            logger,
        }
    }
}

impl ProgressReporter for StoreReporter {
    fn report(&self, progress: u8, message: &str) -> WorkerResult<()> {
        self.store.advance(&self.job_id, progress, message)?;
        self.logger.log_progress(progress, message);
        Ok(())
    }
}

/// Handle to a started job. Clones share the same job.
#[derive(Debug, Clone)]
pub struct RenderHandle {
    job_id: JobId,
    cancel_tx: Arc<watch::Sender<bool>>,
    finished_rx: watch::Receiver<bool>,
}

impl RenderHandle {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Ask the render to stop. The job ends FAILED with a cancellation error
    /// unless it already reached a terminal state.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// True once the job has been recorded as terminal.
    pub fn is_finished(&self) -> bool {
        *self.finished_rx.borrow()
    }

    /// Wait until the job is terminal. Any number of callers may wait.
    pub async fn wait(&self) {
        let mut rx = self.finished_rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                // Task dropped without reaching the end of its body
                break;
            }
        }
    }
}

/// Flips the finished flag when the job task ends, whichever way it ends.
struct FinishedSignal(watch::Sender<bool>);

impl Drop for FinishedSignal {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

/// Starts render jobs on a bounded worker pool.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<JobStore>,
    pipeline: Arc<RenderPipeline>,
    job_semaphore: Arc<Semaphore>,
}

impl JobRunner {
    pub fn new(
        store: Arc<JobStore>,
        pipeline: Arc<RenderPipeline>,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            store,
            pipeline,
            job_semaphore: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    /// Schedule `job` and return immediately. Exactly one attempt is made.
    pub fn start(&self, job: &Job) -> RenderHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (finished_tx, finished_rx) = watch::channel(false);
        let job_id = job.id.clone();
        let config = job.config.clone();
        let store = Arc::clone(&self.store);
        let pipeline = Arc::clone(&self.pipeline);
        let semaphore = Arc::clone(&self.job_semaphore);

        let logger = JobLogger::new(&job_id, "render");
        let span = logger.create_span();
        let task_job_id = job_id.clone();

        tokio::spawn(
            async move {
                // Declared first so it drops after the store update
                let _finished = FinishedSignal(finished_tx);
                let job_id = task_job_id;

                // Permits are handed out in request order
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit,
                    _ = cancelled(cancel_rx.clone()) => {
                        finish_failed(&store, &job_id, &logger, &WorkerError::Cancelled);
                        return;
                    }
                };
                let _permit = match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        let err = WorkerError::config_error("worker pool is closed");
                        finish_failed(&store, &job_id, &logger, &err);
                        return;
                    }
                };

                let _in_flight = metrics::InFlightGuard::start();
                logger.log_start(&format!(
                    "{} + {} ({} cues)",
                    config.background_path.display(),
                    config.audio_path.display(),
                    config.cues.len()
                ));
                let started = Instant::now();

                let reporter: Arc<dyn ProgressReporter> =
                    Arc::new(StoreReporter::new(Arc::clone(&store), job_id.clone()));
                let render = pipeline.render(&job_id, &config, reporter, cancel_rx);
                let outcome = AssertUnwindSafe(render).catch_unwind().await;

                match outcome {
                    Ok(Ok(output)) => {
                        let path = output.output_path.display().to_string();
                        match store.complete(&job_id, output) {
                            Ok(()) => {
                                metrics::record_job_completed(started.elapsed().as_secs_f64());
                                logger.log_completion(&path);
                            }
                            Err(e) => finish_failed(&store, &job_id, &logger, &e),
                        }
                    }
                    Ok(Err(e)) => finish_failed(&store, &job_id, &logger, &e),
                    Err(panic) => {
                        let message = format!("Render panicked: {}", panic_message(panic.as_ref()));
                        logger.log_error(&message);
                        metrics::record_job_failed("panic");
                        record_failure(&store, &job_id, message);
                    }
                }
            }
            .instrument(span),
        );

        RenderHandle {
            job_id,
            cancel_tx: Arc::new(cancel_tx),
            finished_rx,
        }
    }
}

fn finish_failed(store: &JobStore, job_id: &JobId, logger: &JobLogger, err: &WorkerError) {
    logger.log_error(&err.to_string());
    metrics::record_job_failed(err.kind());
    record_failure(store, job_id, err.to_string());
}

fn record_failure(store: &JobStore, job_id: &JobId, message: String) {
    // A rejected progress update has already failed the job
    if let Err(e) = store.fail(job_id, message) {
        debug!(job_id = %job_id, "Job already terminal: {}", e);
    }
}

/// Resolves once the flag is set; never if the sender is dropped first.
async fn cancelled(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("encoder exploded");
        assert_eq!(panic_message(boxed.as_ref()), "encoder exploded");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");

        let boxed: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_send() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(cancelled(rx));
        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_handle_wait_is_shared() {
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let (finished_tx, finished_rx) = watch::channel(false);
        let handle = RenderHandle {
            job_id: JobId::new(),
            cancel_tx: Arc::new(cancel_tx),
            finished_rx,
        };
        assert!(!handle.is_finished());

        let first = tokio::spawn({
            let handle = handle.clone();
            async move { handle.wait().await }
        });
        let second = tokio::spawn({
            let handle = handle.clone();
            async move { handle.wait().await }
        });

        drop(FinishedSignal(finished_tx));
        let timeout = std::time::Duration::from_secs(1);
        tokio::time::timeout(timeout, first).await.unwrap().unwrap();
        tokio::time::timeout(timeout, second).await.unwrap().unwrap();
        assert!(handle.is_finished());

        // Waiting again after the fact returns immediately
        tokio::time::timeout(timeout, handle.wait()).await.unwrap();
    }
}
