//! One flow per kind of request to the service.
//!
//! A flow owns everything it needs once started, so it can run on a separate task
//! while the caller keeps mutating the studio. Committing the result is the
//! studio's job.

pub mod character;
pub mod scene;
pub mod text;

pub use character::{CharacterCreation, CharacterDraft};
pub use scene::{AttemptState, SceneAttempt};
pub use text::{TextGeneration, EMPTY_TEXT_FALLBACK, TEXT_FAILURE_MESSAGE};
