//! Scene generation: one long-running video job per attempt.
//!
//! An attempt moves `Idle -> Submitted -> Polling -> Completed | Failed`.
//! [`SceneAttempt::advance`] performs exactly one transition, which costs exactly
//! one remote call (or two when the finishing poll is followed by the download).
//! [`SceneAttempt::run`] drives the machine with a fixed sleep between polls and
//! stops early when its cancellation token fires.

use crate::character::Character;
use crate::config::StudioConfig;
use crate::error::{Precondition, StudioError};
use crate::prompts;
use crate::scene::{Scene, SceneId, SceneStatus, VideoHandle};
use chrono::Utc;
use generation::{GenerationBackend, OperationHandle, OperationStatus, VideoJobRequest};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// Nothing sent yet.
    Idle,
    /// The job was accepted; no poll has answered yet.
    Submitted(OperationHandle),
    /// At least one poll reported the job as still running.
    Polling { handle: OperationHandle, polls: u32 },
    Completed(Scene),
    Failed(StudioError),
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Completed(_) | AttemptState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttemptState::Idle => "idle",
            AttemptState::Submitted(_) => "submitted",
            AttemptState::Polling { .. } => "polling",
            AttemptState::Completed(_) => "completed",
            AttemptState::Failed(_) => "failed",
        }
    }
}

/// A single scene generation attempt. Attempts never share state.
#[derive(Debug)]
pub struct SceneAttempt {
    prompt: String,
    character_names: Vec<String>,
    request: VideoJobRequest,
    poll_interval: Duration,
    state: AttemptState,
}

impl SceneAttempt {
    /// Prepare an attempt for `prompt` with `cast` as references.
    ///
    /// `cast` is used as given; the caller decides which characters take part.
    pub fn new(
        prompt: &str,
        cast: &[Character],
        config: &StudioConfig,
    ) -> Result<Self, Precondition> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Precondition::EmptyPrompt);
        }
        if cast.is_empty() {
            return Err(Precondition::NoCharacters);
        }

        let names: Vec<&str> = cast.iter().map(|c| c.name.as_str()).collect();
        let request = VideoJobRequest {
            model: config.video_model.clone(),
            prompt: prompts::scene_prompt(&names, prompt),
            references: cast.iter().map(|c| c.image.to_inline()).collect(),
            config: config.video.clone(),
        };

        Ok(Self {
            prompt: prompt.to_string(),
            character_names: names.into_iter().map(str::to_string).collect(),
            request,
            poll_interval: config.poll_interval(),
            state: AttemptState::Idle,
        })
    }

    pub fn state(&self) -> &AttemptState {
        &self.state
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn request(&self) -> &VideoJobRequest {
        &self.request
    }

    pub fn character_names(&self) -> &[String] {
        &self.character_names
    }

    /// Perform one transition. Terminal states stay as they are.
    pub async fn advance(&mut self, backend: &dyn GenerationBackend) -> &AttemptState {
        let next = match std::mem::replace(&mut self.state, AttemptState::Idle) {
            AttemptState::Idle => self.submit(backend).await,
            AttemptState::Submitted(handle) => self.poll(backend, handle, 0).await,
            AttemptState::Polling { handle, polls } => self.poll(backend, handle, polls).await,
            terminal => terminal,
        };
        self.state = next;
        &self.state
    }

    /// Drive the attempt to a terminal state.
    ///
    /// Sleeps for the poll interval before every poll. Without cancellation a job
    /// that never finishes keeps this future pending forever.
    pub async fn run(
        mut self,
        backend: &dyn GenerationBackend,
        cancel: &CancellationToken,
    ) -> Result<Scene, StudioError> {
        if cancel.is_cancelled() {
            self.state = AttemptState::Failed(StudioError::Cancelled);
        } else {
            self.advance(backend).await;
        }

        loop {
            match std::mem::replace(&mut self.state, AttemptState::Idle) {
                AttemptState::Completed(scene) => return Ok(scene),
                AttemptState::Failed(err) => return Err(err),
                pending => self.state = pending,
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(prompt = %self.prompt, "scene generation cancelled");
                    self.state = AttemptState::Failed(StudioError::Cancelled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    self.advance(backend).await;
                }
            }
        }
    }

    async fn submit(&self, backend: &dyn GenerationBackend) -> AttemptState {
        match backend.submit_video_job(&self.request).await {
            Ok(handle) => {
                info!(
                    operation = %handle,
                    characters = self.character_names.len(),
                    "scene job submitted"
                );
                AttemptState::Submitted(handle)
            }
            Err(err) => {
                warn!(error = %err, "scene job rejected");
                AttemptState::Failed(err.into())
            }
        }
    }

    async fn poll(
        &self,
        backend: &dyn GenerationBackend,
        handle: OperationHandle,
        polls: u32,
    ) -> AttemptState {
        match backend.poll_operation(&handle).await {
            Ok(OperationStatus::Running) => {
                debug!(operation = %handle, polls = polls + 1, "scene job still rendering");
                AttemptState::Polling {
                    handle,
                    polls: polls + 1,
                }
            }
            Ok(OperationStatus::Done { video_uri: Some(uri) }) => {
                self.materialize(backend, &handle, &uri).await
            }
            Ok(OperationStatus::Done { video_uri: None }) => {
                warn!(operation = %handle, "scene job finished without a video");
                AttemptState::Failed(StudioError::EmptyVideo)
            }
            Err(err) => {
                warn!(operation = %handle, error = %err, "scene job poll failed");
                AttemptState::Failed(err.into())
            }
        }
    }

    async fn materialize(
        &self,
        backend: &dyn GenerationBackend,
        handle: &OperationHandle,
        uri: &str,
    ) -> AttemptState {
        match backend.fetch_video(uri).await {
            Ok(bytes) => {
                let scene = Scene {
                    id: SceneId::new(),
                    prompt: self.prompt.clone(),
                    video: VideoHandle::new(bytes),
                    status: SceneStatus::Completed,
                    created_at: Utc::now(),
                    characters: self.character_names.clone(),
                };
                info!(
                    operation = %handle,
                    scene = %scene.id,
                    bytes = scene.video.len(),
                    "scene completed"
                );
                AttemptState::Completed(scene)
            }
            Err(err) => {
                warn!(operation = %handle, error = %err, "scene download failed");
                AttemptState::Failed(err.into())
            }
        }
    }
}
