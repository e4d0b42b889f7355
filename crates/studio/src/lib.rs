//! ToonCraft studio: a cast of generated characters and a timeline of generated
//! scenes, plus teacher material produced on request.
//!
//! All state is owned by [`Studio`] and lives as long as the process. The remote
//! work goes through a [`generation::GenerationBackend`].

pub mod character;
pub mod config;
pub mod error;
pub mod flow;
pub mod prompts;
pub mod scene;
mod studio;

pub use character::{Character, CharacterId, CharacterRegistry, ReferenceImage};
pub use config::StudioConfig;
pub use error::{ErrorBanner, Precondition, Result, StudioError};
pub use flow::{AttemptState, CharacterCreation, CharacterDraft, SceneAttempt, TextGeneration};
pub use prompts::EducationKind;
pub use scene::{Scene, SceneId, SceneStatus, SceneTimeline, VideoHandle};
pub use studio::{CharacterForm, SceneComposer, Studio, TextPanel};

pub use tokio_util::sync::CancellationToken;
