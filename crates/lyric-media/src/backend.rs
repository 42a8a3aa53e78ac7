//! Media backend abstraction.
//!
//! The render pipeline talks to media through [`MediaBackend`] so that the
//! FFmpeg implementation can be swapped for a fake in tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::{build_lyric_filter, TextStyle, OUTPUT_FPS, VIDEO_OUT_LABEL};
use crate::probe::{probe_media, MediaInfo};
use crate::progress::ProgressCallback;
use crate::timeline::{BackgroundFit, OverlaySpec, Timeline};

/// Everything needed to encode one lyric video.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub background_path: PathBuf,
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
    pub timeline: Timeline,
}

/// Encoder settings.
#[derive(Debug, Clone)]
pub struct EncodingSettings {
    pub video_codec: String,
    pub crf: u8,
    pub preset: String,
    /// `copy` keeps the source audio untouched
    pub audio_codec: String,
    pub text: TextStyle,
    /// Kill FFmpeg after this many seconds
    pub timeout_secs: Option<u64>,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            crf: 20,
            preset: "medium".to_string(),
            audio_codec: "copy".to_string(),
            text: TextStyle::default(),
            timeout_secs: None,
        }
    }
}

/// Probing and encoding operations used by the render pipeline.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Inspect a media file.
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;

    /// Encode `request` to `request.output_path`, reporting encoder progress.
    /// Must return `MediaError::Cancelled` once `cancel` flips to true.
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        progress: ProgressCallback,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<()>;
}

/// [`MediaBackend`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    settings: EncodingSettings,
}

impl FfmpegBackend {
    pub fn new(settings: EncodingSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EncodingSettings {
        &self.settings
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(path).await
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        progress: ProgressCallback,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<()> {
        // Lyrics go through text files so no escaping of user text is needed
        let text_dir = tempfile::Builder::new().prefix("lyric-text-").tempdir()?;
        let mut overlays = Vec::with_capacity(request.timeline.overlays.len());
        for (index, overlay) in request.timeline.overlays.iter().enumerate() {
            let text_file = text_dir.path().join(format!("cue_{:04}.txt", index));
            tokio::fs::write(&text_file, overlay.text.as_bytes()).await?;
            overlays.push((overlay.clone(), text_file));
        }

        let cmd = build_render_command(request, &self.settings, &overlays);
        debug!(
            overlays = overlays.len(),
            fit = ?request.timeline.fit,
            "Encoding lyric video to {}",
            request.output_path.display()
        );

        FfmpegRunner::new()
            .with_cancel(cancel)
            .with_timeout(self.settings.timeout_secs)
            .run_with_progress(&cmd, progress)
            .await
    }
}

/// Input arguments that realize the background fit.
pub fn background_input_args(timeline: &Timeline) -> Vec<String> {
    match timeline.fit {
        BackgroundFit::Trim => Vec::new(),
        BackgroundFit::Loop { .. } => {
            // Every segment after the first is one extra pass over the source
            let extra_passes = timeline.background_segments.len().saturating_sub(1);
            vec!["-stream_loop".to_string(), extra_passes.to_string()]
        }
        BackgroundFit::Still => vec![
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            OUTPUT_FPS.to_string(),
        ],
    }
}

/// Build the full encode command for a request.
pub fn build_render_command(
    request: &SynthesisRequest,
    settings: &EncodingSettings,
    overlays: &[(OverlaySpec, PathBuf)],
) -> FfmpegCommand {
    FfmpegCommand::new(&request.output_path)
        .input_with(background_input_args(&request.timeline), &request.background_path)
        .input(&request.audio_path)
        .filter_complex(build_lyric_filter(overlays, &settings.text))
        .map(format!("[{}]", VIDEO_OUT_LABEL))
        .map("1:a:0")
        .video_codec(settings.video_codec.clone())
        .preset(settings.preset.clone())
        .crf(settings.crf)
        .pixel_format("yuv420p")
        .frame_rate(OUTPUT_FPS)
        .audio_codec(settings.audio_codec.clone())
        .duration(request.timeline.target_duration_secs)
        .output_args(["-movflags", "+faststart"])
}
