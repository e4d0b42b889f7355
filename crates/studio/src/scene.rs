//! Finished scenes and the newest-first timeline that holds them.

use crate::error::{Result, StudioError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneId(pub Uuid);

impl SceneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for SceneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Downloaded video, addressable locally for playback and download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoHandle {
    id: Uuid,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl VideoHandle {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mime_type: "video/mp4".to_string(),
            bytes: bytes.into(),
        }
    }

    /// Process-local handle; only meaningful while the studio is alive.
    pub fn handle(&self) -> String {
        format!("blob:tooncraft/{}", self.id)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub id: SceneId,
    pub prompt: String,
    pub video: VideoHandle,
    pub status: SceneStatus,
    pub created_at: DateTime<Utc>,
    /// Names of the characters sent as references, in cast order.
    pub characters: Vec<String>,
}

impl Scene {
    pub fn download_file_name(&self) -> String {
        format!("tooncraft-pixar-{}.mp4", self.id)
    }

    /// Write the video into `dir` under its download name.
    pub fn save_to_dir(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.download_file_name());
        std::fs::write(&path, self.video.bytes())?;
        Ok(path)
    }
}

/// Scenes, newest first. Scenes are never removed.
#[derive(Debug, Clone, Default)]
pub struct SceneTimeline {
    scenes: VecDeque<Scene>,
}

impl SceneTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepend(&mut self, scene: Scene) -> Result<()> {
        if self.find(scene.id).is_some() {
            return Err(StudioError::DuplicateScene(scene.id));
        }
        self.scenes.push_front(scene);
        Ok(())
    }

    /// Position 0 is the newest scene.
    pub fn get(&self, position: usize) -> Option<&Scene> {
        self.scenes.get(position)
    }

    pub fn find(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    /// Display number of the scene at `position`; the oldest scene is number 1.
    pub fn number_of(&self, position: usize) -> Option<usize> {
        (position < self.scenes.len()).then(|| self.scenes.len() - position)
    }

    /// Scene with display number `number`.
    pub fn by_number(&self, number: usize) -> Option<&Scene> {
        if number == 0 {
            return None;
        }
        let position = self.scenes.len().checked_sub(number)?;
        self.scenes.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.iter()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}
