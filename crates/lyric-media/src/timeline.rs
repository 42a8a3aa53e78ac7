//! Timeline composition.
//!
//! Conforms a background clip to the audio duration (trim, seamless loop or
//! still frame) and turns lyric cues into animated overlay intervals. Pure
//! functions of their inputs: identical inputs always produce an identical
//! [`Timeline`].

use serde::{Deserialize, Serialize};

use lyric_models::LyricCue;

use crate::error::{MediaError, MediaResult};
use crate::filters::OUTPUT_FPS;

/// Default fade duration for overlay entrance and exit.
pub const DEFAULT_FADE_SECS: f64 = 0.1;
/// Overlay scale at the start of its interval.
pub const DEFAULT_SCALE_START: f64 = 1.0;
/// Overlay scale at the end of its interval.
pub const DEFAULT_SCALE_END: f64 = 1.1;

/// Remainders shorter than this are treated as zero-length.
const ZERO_LENGTH_EPSILON: f64 = 1e-9;

/// Backgrounds shorter than one output frame are held as a still.
pub const MIN_LOOP_SECS: f64 = 1.0 / OUTPUT_FPS as f64;

/// Animation parameters applied to every overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositorSettings {
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    pub scale_start: f64,
    pub scale_end: f64,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self {
            fade_in_secs: DEFAULT_FADE_SECS,
            fade_out_secs: DEFAULT_FADE_SECS,
            scale_start: DEFAULT_SCALE_START,
            scale_end: DEFAULT_SCALE_END,
        }
    }
}

impl CompositorSettings {
    /// Same fade for entrance and exit.
    pub fn with_fade(mut self, fade_secs: f64) -> Self {
        self.fade_in_secs = fade_secs;
        self.fade_out_secs = fade_secs;
        self
    }
}

/// How the background is conformed to the target duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BackgroundFit {
    /// Source is at least as long as the target; play its head.
    Trim,
    /// Source is shorter; repeat it `full_repeats` times plus a partial tail.
    Loop { full_repeats: u64 },
    /// Source has no usable duration (still image or under one frame); hold
    /// its first frame.
    Still,
}

/// One contiguous piece of the source played at `play_start_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSegment {
    pub source_start_secs: f64,
    pub source_end_secs: f64,
    pub play_start_secs: f64,
}

impl BackgroundSegment {
    pub fn duration_secs(&self) -> f64 {
        self.source_end_secs - self.source_start_secs
    }

    pub fn play_end_secs(&self) -> f64 {
        self.play_start_secs + self.duration_secs()
    }
}

/// A scheduled text overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub text: String,
    pub active_start_secs: f64,
    pub active_end_secs: f64,
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    pub scale_start: f64,
    pub scale_end: f64,
}

impl OverlaySpec {
    pub fn duration_secs(&self) -> f64 {
        self.active_end_secs - self.active_start_secs
    }

    pub fn is_active(&self, t: f64) -> bool {
        t >= self.active_start_secs && t <= self.active_end_secs
    }

    /// Elapsed fraction of the active interval, clamped to `[0, 1]`.
    pub fn progress_at(&self, t: f64) -> f64 {
        ((t - self.active_start_secs) / self.duration_secs()).clamp(0.0, 1.0)
    }

    /// Linear scale ramp from `scale_start` to `scale_end`.
    pub fn scale_at(&self, t: f64) -> f64 {
        self.scale_start + (self.scale_end - self.scale_start) * self.progress_at(t)
    }

    /// Opacity at `t`. Inside the fade-out window the exit ramp wins over the
    /// entrance ramp, so very short cues ease in and then immediately out.
    pub fn opacity_at(&self, t: f64) -> f64 {
        if !self.is_active(t) {
            return 0.0;
        }

        let since_start = t - self.active_start_secs;
        let until_end = self.active_end_secs - t;

        if self.fade_out_secs > 0.0 && until_end < self.fade_out_secs {
            (until_end / self.fade_out_secs).clamp(0.0, 1.0)
        } else if self.fade_in_secs > 0.0 && since_start < self.fade_in_secs {
            (since_start / self.fade_in_secs).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

/// Per-render plan of background segments and overlay intervals, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub target_duration_secs: f64,
    pub background_duration_secs: f64,
    pub fit: BackgroundFit,
    pub background_segments: Vec<BackgroundSegment>,
    /// In submission order; later overlays are drawn on top.
    pub overlays: Vec<OverlaySpec>,
}

impl Timeline {
    /// Sum of all background segment lengths.
    pub fn background_length_secs(&self) -> f64 {
        self.background_segments.iter().map(|s| s.duration_secs()).sum()
    }
}

/// Build a timeline with the default animation settings.
pub fn build_timeline(
    background_duration_secs: f64,
    audio_duration_secs: f64,
    cues: &[LyricCue],
) -> MediaResult<Timeline> {
    build_timeline_with(
        &CompositorSettings::default(),
        background_duration_secs,
        audio_duration_secs,
        cues,
    )
}

/// Build a timeline. The audio track is authoritative for the duration.
pub fn build_timeline_with(
    settings: &CompositorSettings,
    background_duration_secs: f64,
    audio_duration_secs: f64,
    cues: &[LyricCue],
) -> MediaResult<Timeline> {
    let target = audio_duration_secs;
    if !target.is_finite() || target <= 0.0 {
        return Err(MediaError::invalid_timeline(format!(
            "audio duration must be positive, got {}",
            audio_duration_secs
        )));
    }

    let (fit, background_segments) = plan_background(background_duration_secs, target)?;

    Ok(Timeline {
        target_duration_secs: target,
        background_duration_secs,
        fit,
        background_segments,
        overlays: plan_overlays(settings, cues),
    })
}

/// Conform a background of `background_secs` to exactly `target_secs`.
pub fn plan_background(
    background_secs: f64,
    target_secs: f64,
) -> MediaResult<(BackgroundFit, Vec<BackgroundSegment>)> {
    if !background_secs.is_finite() || background_secs < 0.0 {
        return Err(MediaError::invalid_timeline(format!(
            "background duration must be non-negative, got {}",
            background_secs
        )));
    }

    let whole = BackgroundSegment {
        source_start_secs: 0.0,
        source_end_secs: target_secs,
        play_start_secs: 0.0,
    };

    if background_secs < MIN_LOOP_SECS {
        return Ok((BackgroundFit::Still, vec![whole]));
    }

    if background_secs >= target_secs {
        return Ok((BackgroundFit::Trim, vec![whole]));
    }

    // Boundaries come from the integer repeat count so nothing drifts.
    let mut full_repeats = (target_secs / background_secs).floor() as u64;
    let mut remainder = target_secs - full_repeats as f64 * background_secs;
    if remainder < 0.0 {
        full_repeats -= 1;
        remainder = target_secs - full_repeats as f64 * background_secs;
    } else if remainder >= background_secs {
        full_repeats += 1;
        remainder = target_secs - full_repeats as f64 * background_secs;
    }

    let mut segments: Vec<BackgroundSegment> = (0..full_repeats)
        .map(|i| BackgroundSegment {
            source_start_secs: 0.0,
            source_end_secs: background_secs,
            play_start_secs: i as f64 * background_secs,
        })
        .collect();

    if remainder > ZERO_LENGTH_EPSILON {
        segments.push(BackgroundSegment {
            source_start_secs: 0.0,
            source_end_secs: remainder,
            play_start_secs: full_repeats as f64 * background_secs,
        });
    }

    Ok((BackgroundFit::Loop { full_repeats }, segments))
}

/// One overlay per renderable cue, in submission order.
pub fn plan_overlays(settings: &CompositorSettings, cues: &[LyricCue]) -> Vec<OverlaySpec> {
    cues.iter()
        .filter(|cue| !cue.is_degenerate())
        .map(|cue| OverlaySpec {
            text: cue.text.trim().to_string(),
            active_start_secs: cue.start_secs(),
            active_end_secs: cue.end_secs(),
            fade_in_secs: settings.fade_in_secs,
            fade_out_secs: settings.fade_out_secs,
            scale_start: settings.scale_start,
            scale_end: settings.scale_end,
        })
        .collect()
}
