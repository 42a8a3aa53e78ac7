//! Project submissions.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cue::LyricCue;
use crate::error::ConfigError;

/// Fields a submission must carry, in the order they are checked.
const REQUIRED_FIELDS: [&str; 3] = ["background_url", "audio_url", "lyrics"];

/// Immutable description of one render: background, audio and lyric cues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectConfig {
    /// Background video or image
    #[serde(rename = "background_url")]
    pub background_path: PathBuf,

    /// Audio track; its duration defines the output duration
    #[serde(rename = "audio_url")]
    pub audio_path: PathBuf,

    /// Lyric cues in submission order
    #[serde(rename = "lyrics")]
    pub cues: Vec<LyricCue>,

    /// Project identifier, only used when uploading the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl ProjectConfig {
    pub fn new(
        background_path: impl Into<PathBuf>,
        audio_path: impl Into<PathBuf>,
        cues: Vec<LyricCue>,
    ) -> Self {
        Self {
            background_path: background_path.into(),
            audio_path: audio_path.into(),
            cues,
            project_id: None,
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Parse a JSON submission and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| ConfigError::Malformed("project must be a JSON object".to_string()))?;

        for field in REQUIRED_FIELDS {
            if !object.contains_key(field) {
                return Err(ConfigError::MissingField(field));
            }
        }

        let config: ProjectConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the submission.
    ///
    /// File existence is checked separately by the caller.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.background_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("background_url"));
        }

        if self.audio_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("audio_url"));
        }

        if self.cues.is_empty() {
            return Err(ConfigError::EmptyCues);
        }

        if let Some(index) = self.cues.iter().position(|c| !c.has_valid_timing()) {
            return Err(ConfigError::InvalidCueTiming { index });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "background_url": "/tmp/background.mp4",
        "audio_url": "/tmp/audio.mp3",
        "lyrics": [
            {"text": "Hello", "start": 0, "end": 1000},
            {"text": "World", "start": 1000, "end": 2000}
        ]
    }"#;

    #[test]
    fn test_parse_valid_submission() {
        let config = ProjectConfig::from_json(VALID).unwrap();
        assert_eq!(config.background_path, PathBuf::from("/tmp/background.mp4"));
        assert_eq!(config.audio_path, PathBuf::from("/tmp/audio.mp3"));
        assert_eq!(config.cues.len(), 2);
        assert!(config.project_id.is_none());
    }

    #[test]
    fn test_missing_field() {
        let err = ProjectConfig::from_json(r#"{"background_url": "a", "lyrics": []}"#).unwrap_err();
        assert_eq!(err, ConfigError::MissingField("audio_url"));
        assert_eq!(err.to_string(), "Missing required field: audio_url");
    }

    #[test]
    fn test_empty_lyrics_rejected() {
        let err = ProjectConfig::from_json(
            r#"{"background_url": "a", "audio_url": "b", "lyrics": []}"#,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::EmptyCues);
    }

    #[test]
    fn test_bad_timing_rejected_with_index() {
        let config = ProjectConfig::new(
            "a.mp4",
            "b.mp3",
            vec![LyricCue::new("ok", 0, 100), LyricCue::new("bad", 300, 200)],
        );
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidCueTiming { index: 1 })
        );
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ProjectConfig::from_json("not json"),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            ProjectConfig::from_json("[1, 2]"),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            ProjectConfig::from_json(
                r#"{"background_url": "a", "audio_url": "b", "lyrics": [{"text": "x", "start": 0}]}"#
            ),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn test_project_id_round_trip() {
        let config = ProjectConfig::new("a.mp4", "b.mp3", vec![LyricCue::new("x", 0, 1)])
            .with_project_id("proj-1");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"project_id\":\"proj-1\""));
        assert_eq!(ProjectConfig::from_json(&json).unwrap(), config);
    }
}
