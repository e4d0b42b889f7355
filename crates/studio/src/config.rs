//! Studio configuration: models, fixed job parameters and the bounds on casting.

use anyhow::Result;
use generation::VideoJobConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Model used for character reference images
    pub image_model: String,

    /// Model used for scene videos
    pub video_model: String,

    /// Model used for lesson material
    pub text_model: String,

    /// Aspect ratio of character images
    pub image_aspect_ratio: String,

    /// Fixed parameters of every video job
    pub video: VideoJobConfig,

    /// Delay between two polls of a running video job, in milliseconds
    pub poll_interval_ms: u64,

    /// How many characters (first in cast order) a scene can reference
    pub max_reference_characters: usize,

    /// Size of the cast at which character creation stops being offered
    pub max_characters: usize,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            image_model: "gemini-2.5-flash-image".to_string(),
            video_model: "veo-3.1-generate-preview".to_string(),
            text_model: "gemini-3-flash-preview".to_string(),
            image_aspect_ratio: "1:1".to_string(),
            video: VideoJobConfig::default(),
            poll_interval_ms: 5_000,
            max_reference_characters: 3,
            max_characters: 10,
        }
    }
}

impl StudioConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// With poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// With reference bound
    pub fn with_max_reference_characters(mut self, max: usize) -> Self {
        self.max_reference_characters = max;
        self
    }

    /// With cast size bound
    pub fn with_max_characters(mut self, max: usize) -> Self {
        self.max_characters = max;
        self
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let config = StudioConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.max_reference_characters, 3);
        assert_eq!(config.max_characters, 10);
        assert_eq!(config.image_aspect_ratio, "1:1");
        assert_eq!(config.video.resolution, "720p");
    }

    #[test]
    fn test_builder() {
        let config = StudioConfig::new()
            .with_poll_interval(Duration::from_millis(250))
            .with_max_reference_characters(5)
            .with_max_characters(2);
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.max_reference_characters, 5);
        assert_eq!(config.max_characters, 2);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!(
            "tooncraft-studio-config-{}.json",
            std::process::id()
        ));
        StudioConfig::new()
            .with_max_reference_characters(4)
            .save(&path)
            .unwrap();

        let loaded = StudioConfig::load(&path).unwrap();
        assert_eq!(loaded.max_reference_characters, 4);
        assert_eq!(loaded.video_model, "veo-3.1-generate-preview");
        std::fs::remove_file(&path).unwrap();
    }
}
