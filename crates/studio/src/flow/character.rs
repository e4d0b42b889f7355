use crate::character::{Character, CharacterId, ReferenceImage};
use crate::config::StudioConfig;
use crate::error::{Precondition, Result, StudioError};
use crate::prompts;
use generation::{GenerationBackend, ImageRequest};
use tracing::{info, warn};

/// Name and looks of a character that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterDraft {
    pub name: String,
    pub description: String,
}

impl CharacterDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), Precondition> {
        if self.name.trim().is_empty() {
            return Err(Precondition::EmptyName);
        }
        if self.description.trim().is_empty() {
            return Err(Precondition::EmptyDescription);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.name.clear();
        self.description.clear();
    }
}

/// One image request that yields one character.
#[derive(Debug, Clone)]
pub struct CharacterCreation {
    name: String,
    description: String,
    request: ImageRequest,
}

impl CharacterCreation {
    pub fn new(draft: &CharacterDraft, config: &StudioConfig) -> std::result::Result<Self, Precondition> {
        draft.validate()?;
        let name = draft.name.trim().to_string();
        let description = draft.description.trim().to_string();
        let request = ImageRequest {
            model: config.image_model.clone(),
            prompt: prompts::character_prompt(&name, &description),
            aspect_ratio: config.image_aspect_ratio.clone(),
        };
        Ok(Self {
            name,
            description,
            request,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request(&self) -> &ImageRequest {
        &self.request
    }

    pub async fn run(self, backend: &dyn GenerationBackend) -> Result<Character> {
        let images = backend.generate_image(&self.request).await.map_err(|err| {
            warn!(name = %self.name, error = %err, "character image request failed");
            StudioError::from(err)
        })?;

        let image = images.into_iter().next().ok_or_else(|| {
            warn!(name = %self.name, "character image response carried no image");
            StudioError::EmptyImage
        })?;

        let character = Character {
            id: CharacterId::new(),
            name: self.name,
            description: self.description,
            image: ReferenceImage::from(image),
        };
        info!(id = %character.id, name = %character.name, "character created");
        Ok(character)
    }
}
