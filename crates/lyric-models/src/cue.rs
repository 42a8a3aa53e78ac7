//! Timed lyric cues.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A timed span of text, in source-relative milliseconds.
///
/// Serialized as `{"text": ..., "start": ..., "end": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LyricCue {
    /// Text to display
    pub text: String,
    /// Start time in milliseconds
    #[serde(rename = "start")]
    pub start_ms: u64,
    /// End time in milliseconds
    #[serde(rename = "end")]
    pub end_ms: u64,
}

impl LyricCue {
    pub fn new(text: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            text: text.into(),
            start_ms,
            end_ms,
        }
    }

    /// Whether `end > start`.
    pub fn has_valid_timing(&self) -> bool {
        self.end_ms > self.start_ms
    }

    /// Cues with bad timing or no visible text never render.
    pub fn is_degenerate(&self) -> bool {
        !self.has_valid_timing() || self.text.trim().is_empty()
    }

    pub fn start_secs(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn end_secs(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_json_field_names() {
        let cue: LyricCue =
            serde_json::from_str(r#"{"text": "Hello", "start": 0, "end": 1000}"#).unwrap();
        assert_eq!(cue, LyricCue::new("Hello", 0, 1000));

        let json = serde_json::to_value(&cue).unwrap();
        assert_eq!(json["start"], 0);
        assert_eq!(json["end"], 1000);
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        let parsed = serde_json::from_str::<LyricCue>(r#"{"text": "x", "start": -5, "end": 10}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_degenerate_cues() {
        assert!(LyricCue::new("a", 500, 500).is_degenerate());
        assert!(LyricCue::new("a", 800, 500).is_degenerate());
        assert!(LyricCue::new("", 0, 500).is_degenerate());
        assert!(LyricCue::new("   ", 0, 500).is_degenerate());
        assert!(!LyricCue::new("ok", 0, 1).is_degenerate());
    }

    #[test]
    fn test_seconds_conversion() {
        let cue = LyricCue::new("there", 400, 1200);
        assert!((cue.start_secs() - 0.4).abs() < 1e-9);
        assert!((cue.end_secs() - 1.2).abs() < 1e-9);
        assert_eq!(cue.duration_ms(), 800);
    }
}
