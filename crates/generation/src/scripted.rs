//! Backend that replays queued answers instead of calling the service.
use crate::error::{Result, ServiceError};
use crate::{
    GenerationBackend, ImageRequest, InlineImage, OperationHandle, OperationStatus, TextRequest,
    VideoJobRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// One call received by a [`ScriptedBackend`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Image(ImageRequest),
    SubmitVideo(VideoJobRequest),
    Poll(OperationHandle),
    Fetch(String),
    Text(TextRequest),
}

#[derive(Default)]
struct Script {
    images: VecDeque<Result<Vec<InlineImage>>>,
    submissions: VecDeque<Result<OperationHandle>>,
    polls: VecDeque<Result<OperationStatus>>,
    fetches: VecDeque<Result<Vec<u8>>>,
    texts: VecDeque<Result<Option<String>>>,
    calls: Vec<BackendCall>,
}

/// Answers each operation from its own queue.
///
/// An exhausted poll queue keeps answering [`OperationStatus::Running`], so a job
/// that is never scripted to finish never finishes. Every other exhausted queue
/// answers with a transient error.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_image(&self, answer: Result<Vec<InlineImage>>) -> &Self {
        self.script.lock().images.push_back(answer);
        self
    }

    pub fn push_submission(&self, answer: Result<OperationHandle>) -> &Self {
        self.script.lock().submissions.push_back(answer);
        self
    }

    pub fn push_poll(&self, answer: Result<OperationStatus>) -> &Self {
        self.script.lock().polls.push_back(answer);
        self
    }

    pub fn push_fetch(&self, answer: Result<Vec<u8>>) -> &Self {
        self.script.lock().fetches.push_back(answer);
        self
    }

    pub fn push_text(&self, answer: Result<Option<String>>) -> &Self {
        self.script.lock().texts.push_back(answer);
        self
    }

    /// Queue one successful image answer.
    pub fn with_image(self, image: InlineImage) -> Self {
        self.push_image(Ok(vec![image]));
        self
    }

    /// Queue a complete successful video job: submission, `running_polls`
    /// unfinished polls, a finished poll pointing at `uri`, and the download.
    pub fn with_video(self, handle: &str, running_polls: usize, uri: &str, bytes: Vec<u8>) -> Self {
        self.push_submission(Ok(OperationHandle(handle.to_string())));
        for _ in 0..running_polls {
            self.push_poll(Ok(OperationStatus::Running));
        }
        self.push_poll(Ok(OperationStatus::Done {
            video_uri: Some(uri.to_string()),
        }));
        self.push_fetch(Ok(bytes));
        self
    }

    /// Queue one successful text answer.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push_text(Ok(Some(text.into())));
        self
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.script.lock().calls.clone()
    }

    pub fn poll_count(&self) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Poll(_)))
            .count()
    }
}

fn exhausted(operation: &str) -> ServiceError {
    ServiceError::Transient(format!("no scripted answer left for {operation}"))
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<InlineImage>> {
        let mut script = self.script.lock();
        script.calls.push(BackendCall::Image(request.clone()));
        script
            .images
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("generate_image")))
    }

    async fn submit_video_job(&self, request: &VideoJobRequest) -> Result<OperationHandle> {
        let mut script = self.script.lock();
        script.calls.push(BackendCall::SubmitVideo(request.clone()));
        script
            .submissions
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("submit_video_job")))
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        let mut script = self.script.lock();
        script.calls.push(BackendCall::Poll(handle.clone()));
        script
            .polls
            .pop_front()
            .unwrap_or(Ok(OperationStatus::Running))
    }

    async fn fetch_video(&self, locator: &str) -> Result<Vec<u8>> {
        let mut script = self.script.lock();
        script.calls.push(BackendCall::Fetch(locator.to_string()));
        script
            .fetches
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("fetch_video")))
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<Option<String>> {
        let mut script = self.script.lock();
        script.calls.push(BackendCall::Text(request.clone()));
        script
            .texts
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("generate_text")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unscripted_job_keeps_running() {
        let backend = ScriptedBackend::new();
        let handle = OperationHandle("operations/forever".to_string());
        for _ in 0..5 {
            assert_eq!(
                backend.poll_operation(&handle).await.unwrap(),
                OperationStatus::Running
            );
        }
        assert_eq!(backend.poll_count(), 5);
    }

    #[tokio::test]
    async fn test_exhausted_queue_is_transient() {
        let backend = ScriptedBackend::new();
        let err = backend.fetch_video("https://files.example/v").await.unwrap_err();
        assert!(matches!(err, ServiceError::Transient(_)));
        assert_eq!(
            backend.calls(),
            vec![BackendCall::Fetch("https://files.example/v".to_string())]
        );
    }

    #[tokio::test]
    async fn test_with_video_sequence() {
        let backend = ScriptedBackend::new().with_video("operations/1", 1, "https://v", vec![9]);
        let request = VideoJobRequest {
            model: "veo".to_string(),
            prompt: "p".to_string(),
            references: Vec::new(),
            config: Default::default(),
        };
        let handle = backend.submit_video_job(&request).await.unwrap();
        assert_eq!(backend.poll_operation(&handle).await.unwrap(), OperationStatus::Running);
        assert_eq!(
            backend.poll_operation(&handle).await.unwrap(),
            OperationStatus::Done {
                video_uri: Some("https://v".to_string())
            }
        );
        assert_eq!(backend.fetch_video("https://v").await.unwrap(), vec![9]);
    }
}
