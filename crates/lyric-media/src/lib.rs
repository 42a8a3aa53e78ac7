#![deny(unreachable_patterns)]
//! Timeline composition and FFmpeg CLI wrapper for lyric videos.
//!
//! This crate provides:
//! - Background conforming (trim, seamless loop, still image) and overlay scheduling
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation support via tokio
//! - A [`MediaBackend`] seam so rendering can run without FFmpeg in tests

pub mod backend;
pub mod command;
pub mod error;
pub mod filters;
pub mod probe;
pub mod progress;
pub mod timeline;

pub use backend::{EncodingSettings, FfmpegBackend, MediaBackend, SynthesisRequest};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use filters::TextStyle;
pub use probe::{probe_media, MediaInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use timeline::{
    build_timeline, build_timeline_with, BackgroundFit, BackgroundSegment, CompositorSettings,
    OverlaySpec, Timeline, DEFAULT_FADE_SECS, MIN_LOOP_SECS,
};
