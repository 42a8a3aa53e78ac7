//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use lyric_media::{CompositorSettings, EncodingSettings, TextStyle, DEFAULT_FADE_SECS};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent render jobs
    pub max_concurrent_jobs: usize,
    /// Directory finished renders are written to; must exist
    pub render_dir: PathBuf,
    /// Kill FFmpeg after this long
    pub ffmpeg_timeout: Option<Duration>,
    /// Overlay fade in/out duration in seconds
    pub fade_secs: f64,
    /// Audio codec for the output (`copy` re-muxes the source)
    pub audio_codec: String,
    /// Font used for lyric text
    pub font_file: Option<PathBuf>,
    /// Base lyric font size in pixels
    pub font_size: u32,
    /// x264 quality
    pub crf: u8,
    /// x264 preset
    pub preset: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            render_dir: PathBuf::from("renders"),
            ffmpeg_timeout: None,
            fade_secs: DEFAULT_FADE_SECS,
            audio_codec: "copy".to_string(),
            font_file: None,
            font_size: 96,
            crf: 20,
            preset: "medium".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_concurrent_jobs: std::env::var("LYRIC_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            render_dir: std::env::var("LYRIC_RENDER_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.render_dir),
            ffmpeg_timeout: std::env::var("LYRIC_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            fade_secs: std::env::var("LYRIC_FADE_SECS")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|f| f.is_finite() && *f >= 0.0)
                .unwrap_or(defaults.fade_secs),
            audio_codec: std::env::var("LYRIC_AUDIO_CODEC").unwrap_or(defaults.audio_codec),
            font_file: std::env::var("LYRIC_FONT_FILE").ok().map(PathBuf::from),
            font_size: std::env::var("LYRIC_FONT_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.font_size),
            crf: std::env::var("LYRIC_CRF")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.crf),
            preset: std::env::var("LYRIC_PRESET").unwrap_or(defaults.preset),
        }
    }

    /// Overlay animation settings.
    pub fn compositor_settings(&self) -> CompositorSettings {
        CompositorSettings::default().with_fade(self.fade_secs)
    }

    /// FFmpeg encoder settings.
    pub fn encoding_settings(&self) -> EncodingSettings {
        EncodingSettings {
            crf: self.crf,
            preset: self.preset.clone(),
            audio_codec: self.audio_codec.clone(),
            text: TextStyle {
                font_size: self.font_size,
                font_file: self.font_file.clone(),
                ..Default::default()
            },
            timeout_secs: self.ffmpeg_timeout.map(|d| d.as_secs()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.render_dir, PathBuf::from("renders"));
        assert_eq!(config.compositor_settings(), CompositorSettings::default());
    }

    #[test]
    fn test_encoding_settings() {
        let config = WorkerConfig {
            font_size: 72,
            ffmpeg_timeout: Some(Duration::from_secs(600)),
            audio_codec: "aac".to_string(),
            ..Default::default()
        };
        let settings = config.encoding_settings();
        assert_eq!(settings.text.font_size, 72);
        assert_eq!(settings.timeout_secs, Some(600));
        assert_eq!(settings.audio_codec, "aac");
        assert_eq!(settings.video_codec, "libx264");
    }

    #[test]
    fn test_custom_fade() {
        let config = WorkerConfig {
            fade_secs: 0.25,
            ..Default::default()
        };
        let settings = config.compositor_settings();
        assert_eq!(settings.fade_in_secs, 0.25);
        assert_eq!(settings.fade_out_secs, 0.25);
        assert_eq!(settings.scale_end, 1.1);
    }
}
