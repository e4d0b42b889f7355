//! Remote-call layer for the hosted generative service.
//!
//! Provides a single backend abstraction over image synthesis, long-running video
//! jobs, and text synthesis:
//! - [`GeminiBackend`] talks to the Gemini REST API
//! - [`ScriptedBackend`] replays canned answers (tests, demos)
//!
//! Backends never hold application state. One call is one request; nothing here
//! retries, caches or batches.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod gemini;
pub mod scripted;

pub use config::ClientConfig;
pub use error::{Result, ServiceError};
pub use gemini::GeminiBackend;
pub use scripted::{BackendCall, ScriptedBackend};

/// Binary image returned inline by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            data,
        }
    }
}

/// Single-shot image synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub aspect_ratio: String,
}

/// Fixed knobs of a video job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoJobConfig {
    pub number_of_videos: u32,
    pub resolution: String,
    pub aspect_ratio: String,
}

impl Default for VideoJobConfig {
    fn default() -> Self {
        Self {
            number_of_videos: 1,
            resolution: "720p".to_string(),
            aspect_ratio: "16:9".to_string(),
        }
    }
}

/// Long-running video synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoJobRequest {
    pub model: String,
    pub prompt: String,
    /// Images the model should keep the subjects consistent with.
    pub references: Vec<InlineImage>,
    pub config: VideoJobConfig,
}

/// Opaque token for a long-running remote job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationHandle(pub String);

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What one poll of a long-running job reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    /// Still rendering.
    Running,
    /// Finished. The locator is absent when the job produced nothing.
    Done { video_uri: Option<String> },
}

impl OperationStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, OperationStatus::Done { .. })
    }
}

/// Freeform text synthesis with a role instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub prompt: String,
}

/// The remote service boundary.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Synthesize images for a prompt. Returns every inline image in the answer,
    /// possibly none.
    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<InlineImage>>;

    /// Submit a video job and return its handle.
    async fn submit_video_job(&self, request: &VideoJobRequest) -> Result<OperationHandle>;

    /// Ask for the current state of a submitted job.
    async fn poll_operation(&self, handle: &OperationHandle) -> Result<OperationStatus>;

    /// Download the bytes behind a result locator.
    async fn fetch_video(&self, locator: &str) -> Result<Vec<u8>>;

    /// Synthesize text. `None` when the answer carried no text.
    async fn generate_text(&self, request: &TextRequest) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_job_defaults() {
        let config = VideoJobConfig::default();
        assert_eq!(config.number_of_videos, 1);
        assert_eq!(config.resolution, "720p");
        assert_eq!(config.aspect_ratio, "16:9");
    }

    #[test]
    fn test_operation_status() {
        assert!(!OperationStatus::Running.is_done());
        assert!(OperationStatus::Done { video_uri: None }.is_done());
    }
}
