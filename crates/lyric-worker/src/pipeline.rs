//! Render pipeline.
//!
//! Drives one job from input checks to a persisted output file, reporting
//! the fixed milestones (10, 30, 90) on the way. Completion (100) is
//! recorded by the runner once the returned output is stored.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use lyric_media::{build_timeline_with, CompositorSettings, MediaBackend, SynthesisRequest};
use lyric_models::{JobId, ProjectConfig, RenderOutput};
use lyric_storage::Uploader;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

pub const PROGRESS_LOADING_AUDIO: u8 = 10;
pub const PROGRESS_COMPOSITING: u8 = 30;
pub const PROGRESS_FINALIZING: u8 = 90;

pub const MESSAGE_LOADING_AUDIO: &str = "Loading audio...";
pub const MESSAGE_COMPOSITING: &str = "Compositing video...";
pub const MESSAGE_FINALIZING: &str = "Finalizing...";

/// Encoder progress is mapped strictly between the compositing and
/// finalizing milestones.
const ENCODE_PROGRESS_FIRST: u8 = PROGRESS_COMPOSITING + 1;
const ENCODE_PROGRESS_LAST: u8 = PROGRESS_FINALIZING - 1;

/// Receives progress milestones from the pipeline.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: u8, message: &str) -> WorkerResult<()>;
}

/// Orchestrates probing, composition, encoding and upload for a job.
pub struct RenderPipeline {
    backend: Arc<dyn MediaBackend>,
    uploader: Arc<dyn Uploader>,
    render_dir: PathBuf,
    settings: CompositorSettings,
}

impl RenderPipeline {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        uploader: Arc<dyn Uploader>,
        render_dir: impl Into<PathBuf>,
        settings: CompositorSettings,
    ) -> Self {
        Self {
            backend,
            uploader,
            render_dir: render_dir.into(),
            settings,
        }
    }

    /// Final location of a job's render.
    pub fn output_path_for(&self, job_id: &JobId) -> PathBuf {
        self.render_dir.join(format!("{}.mp4", job_id))
    }

    /// Render `config`. Any error leaves no output file behind.
    pub async fn render(
        &self,
        job_id: &JobId,
        config: &ProjectConfig,
        reporter: Arc<dyn ProgressReporter>,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<RenderOutput> {
        let logger = JobLogger::new(job_id, "render");

        ensure_readable(&config.audio_path).await?;
        ensure_readable(&config.background_path).await?;
        ensure_not_cancelled(&cancel)?;

        reporter.report(PROGRESS_LOADING_AUDIO, MESSAGE_LOADING_AUDIO)?;
        let audio = self.backend.probe(&config.audio_path).await?;
        if !audio.duration.is_finite() || audio.duration <= 0.0 {
            return Err(WorkerError::InvalidTimeline(format!(
                "audio duration must be positive, got {}",
                audio.duration
            )));
        }

        let background = self.backend.probe(&config.background_path).await?;
        // Image demuxers report a single-frame duration; hold the frame instead
        let background_secs = if background.is_still_image() {
            0.0
        } else {
            background.duration
        };
        let timeline =
            build_timeline_with(&self.settings, background_secs, audio.duration, &config.cues)?;
        debug!(
            job_id = %job_id,
            target_secs = timeline.target_duration_secs,
            segments = timeline.background_segments.len(),
            overlays = timeline.overlays.len(),
            "Timeline built"
        );
        ensure_not_cancelled(&cancel)?;

        reporter.report(PROGRESS_COMPOSITING, MESSAGE_COMPOSITING)?;

        // Deleted on drop, so every failure path cleans up the partial file
        let temp_output = tempfile::Builder::new()
            .prefix(".render-")
            .suffix(".mp4")
            .tempfile_in(&self.render_dir)?;

        let request = SynthesisRequest {
            background_path: config.background_path.clone(),
            audio_path: config.audio_path.clone(),
            output_path: temp_output.path().to_path_buf(),
            timeline,
        };

        let total_ms = (request.timeline.target_duration_secs * 1000.0) as i64;
        let last_reported = Arc::new(AtomicU8::new(PROGRESS_COMPOSITING));
        let encode_reporter = Arc::clone(&reporter);
        let encode_logger = logger.clone();
        let encode_job_id = job_id.clone();
        let on_progress = Box::new(move |progress: lyric_media::FfmpegProgress| {
            let mapped = map_encode_progress(progress.percentage(total_ms));
            // Only strictly increasing values reach the store
            if last_reported.fetch_max(mapped, Ordering::SeqCst) < mapped {
                debug!(
                    job_id = %encode_job_id,
                    progress = mapped,
                    eta_secs = ?progress.eta_seconds(total_ms),
                    "Encoder progress"
                );
                if let Err(e) = encode_reporter.report(mapped, MESSAGE_COMPOSITING) {
                    encode_logger.log_warning(&format!("Dropped encoder progress: {}", e));
                }
            }
        });

        self.backend
            .synthesize(&request, on_progress, cancel.clone())
            .await?;
        ensure_not_cancelled(&cancel)?;

        reporter.report(PROGRESS_FINALIZING, MESSAGE_FINALIZING)?;
        let output_path = self.output_path_for(job_id);
        temp_output
            .persist(&output_path)
            .map_err(|e| WorkerError::Io(e.error))?;

        let result_url = match self
            .uploader
            .upload_render(&output_path, job_id, config.project_id.as_deref())
            .await
        {
            Ok(url) => url,
            Err(e) => {
                logger.log_warning(&format!("Upload failed, keeping local render: {}", e));
                None
            }
        };

        Ok(RenderOutput {
            output_path,
            duration_secs: request.timeline.target_duration_secs,
            cue_count: config.cues.len(),
            overlay_count: request.timeline.overlays.len(),
            result_url,
        })
    }
}

/// Map an encoder percentage onto the progress band between milestones.
fn map_encode_progress(percent: f64) -> u8 {
    let span = f64::from(ENCODE_PROGRESS_LAST - ENCODE_PROGRESS_FIRST);
    let offset = (percent.clamp(0.0, 100.0) / 100.0 * span).floor() as u8;
    ENCODE_PROGRESS_FIRST + offset
}

async fn ensure_readable(path: &Path) -> WorkerResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(WorkerError::InputNotFound(path.to_path_buf())),
    }
    tokio::fs::File::open(path)
        .await
        .map_err(|_| WorkerError::InputNotFound(path.to_path_buf()))?;
    Ok(())
}

fn ensure_not_cancelled(cancel: &watch::Receiver<bool>) -> WorkerResult<()> {
    if *cancel.borrow() {
        return Err(WorkerError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_progress_band() {
        assert_eq!(map_encode_progress(0.0), 31);
        assert_eq!(map_encode_progress(50.0), 60);
        assert_eq!(map_encode_progress(100.0), 89);
        assert_eq!(map_encode_progress(250.0), 89);
        assert_eq!(map_encode_progress(-3.0), 31);
    }

    #[tokio::test]
    async fn test_missing_input_is_reported() {
        let result = ensure_readable(Path::new("/no/such/song.mp3")).await;
        assert!(matches!(
            result,
            Err(WorkerError::InputNotFound(p)) if p == Path::new("/no/such/song.mp3")
        ));
    }

    #[tokio::test]
    async fn test_directory_is_not_an_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ensure_readable(dir.path()).await,
            Err(WorkerError::InputNotFound(_))
        ));
    }

    #[test]
    fn test_cancel_check() {
        let (tx, rx) = watch::channel(false);
        assert!(ensure_not_cancelled(&rx).is_ok());
        tx.send(true).unwrap();
        assert!(matches!(ensure_not_cancelled(&rx), Err(WorkerError::Cancelled)));
    }
}
