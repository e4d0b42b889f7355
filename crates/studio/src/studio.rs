//! Session state of one studio and the boundary where every flow is caught.
//!
//! Each flow is split in two: `begin_*` checks the preconditions, marks the flow
//! as in flight and hands out an owned request; `finish_*` commits the outcome
//! and clears the flag. The `*_now` helpers do both around an await, for callers
//! that do not need to keep the studio usable in between.

use crate::character::{Character, CharacterId, CharacterRegistry};
use crate::config::StudioConfig;
use crate::error::{ErrorBanner, Precondition, Result};
use crate::flow::{CharacterCreation, CharacterDraft, SceneAttempt, TextGeneration};
use crate::prompts::EducationKind;
use crate::scene::{Scene, SceneId, SceneTimeline};
use generation::GenerationBackend;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Input of the scene composer.
#[derive(Debug, Clone, Default)]
pub struct SceneComposer {
    pub prompt: String,
    in_flight: bool,
    local_error: Option<String>,
}

impl SceneComposer {
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Message of the last failed attempt, cleared when a new one starts.
    pub fn local_error(&self) -> Option<&str> {
        self.local_error.as_deref()
    }
}

/// Input of the character form.
#[derive(Debug, Clone, Default)]
pub struct CharacterForm {
    pub draft: CharacterDraft,
    in_flight: bool,
}

impl CharacterForm {
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}

/// The education panel: one tool, one topic, one ephemeral result.
#[derive(Debug, Clone)]
pub struct TextPanel {
    pub kind: EducationKind,
    pub topic: String,
    result: Option<String>,
    in_flight: bool,
}

impl Default for TextPanel {
    fn default() -> Self {
        Self {
            kind: EducationKind::Help,
            topic: String::new(),
            result: None,
            in_flight: false,
        }
    }
}

impl TextPanel {
    /// Switch tools. Reopening resets topic and result.
    pub fn open(&mut self, kind: EducationKind) {
        self.kind = kind;
        self.topic.clear();
        self.result = kind.static_text().map(str::to_string);
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}

/// Everything the user built during this session. Nothing outlives the process.
#[derive(Debug, Default)]
pub struct Studio {
    config: StudioConfig,
    registry: CharacterRegistry,
    timeline: SceneTimeline,
    banner: ErrorBanner,
    pub character_form: CharacterForm,
    pub composer: SceneComposer,
    pub text_panel: TextPanel,
}

impl Studio {
    pub fn new(config: StudioConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn characters(&self) -> &CharacterRegistry {
        &self.registry
    }

    pub fn scenes(&self) -> &SceneTimeline {
        &self.timeline
    }

    pub fn banner(&self) -> &ErrorBanner {
        &self.banner
    }

    pub fn dismiss_banner(&mut self) {
        self.banner.dismiss();
    }

    pub fn remove_character(&mut self, id: CharacterId) -> Option<Character> {
        let removed = self.registry.remove(id);
        if let Some(character) = &removed {
            info!(id = %character.id, name = %character.name, "character removed");
        }
        removed
    }

    /// Whether the character form may be submitted.
    pub fn can_add_character(&self) -> bool {
        !self.character_form.in_flight && self.registry.len() < self.config.max_characters
    }

    pub fn begin_character(&mut self) -> std::result::Result<CharacterCreation, Precondition> {
        if self.character_form.in_flight {
            return Err(Precondition::Busy);
        }
        if self.registry.len() >= self.config.max_characters {
            return Err(Precondition::CastFull(self.config.max_characters));
        }
        let creation = CharacterCreation::new(&self.character_form.draft, &self.config)?;
        self.character_form.in_flight = true;
        Ok(creation)
    }

    /// Commit a character creation outcome. Failures raise the banner.
    pub fn finish_character(&mut self, outcome: Result<Character>) -> Result<CharacterId> {
        self.character_form.in_flight = false;
        let committed = outcome.and_then(|character| {
            let id = character.id;
            self.registry.add(character)?;
            Ok(id)
        });
        match &committed {
            Ok(_) => self.character_form.draft.clear(),
            Err(err) => {
                warn!(error = %err, "character creation failed");
                self.banner.raise(err);
            }
        }
        committed
    }

    pub async fn create_character_now(
        &mut self,
        backend: &dyn GenerationBackend,
    ) -> Result<CharacterId> {
        let creation = self.begin_character()?;
        let outcome = creation.run(backend).await;
        self.finish_character(outcome)
    }

    /// Characters that take part in the next scene, and how many were left out.
    pub fn scene_cast(&self) -> (&[Character], usize) {
        let cast = self.registry.first(self.config.max_reference_characters);
        (cast, self.registry.len() - cast.len())
    }

    /// Whether the scene trigger is enabled.
    pub fn can_generate_scene(&self) -> bool {
        !self.composer.in_flight
            && !self.registry.is_empty()
            && !self.composer.prompt.trim().is_empty()
    }

    pub fn begin_scene(&mut self) -> std::result::Result<SceneAttempt, Precondition> {
        if self.composer.in_flight {
            return Err(Precondition::Busy);
        }
        let (cast, omitted) = self.scene_cast();
        let attempt = SceneAttempt::new(&self.composer.prompt, cast, &self.config)?;
        if omitted > 0 {
            info!(omitted, "characters beyond the reference bound left out of the scene");
        }
        self.composer.in_flight = true;
        self.composer.local_error = None;
        Ok(attempt)
    }

    /// Commit a scene outcome.
    ///
    /// Success prepends the scene and clears the prompt. Failure records nothing,
    /// sets the composer's message and, for credential-class errors, the banner.
    pub fn finish_scene(&mut self, outcome: Result<Scene>) -> Result<SceneId> {
        self.composer.in_flight = false;
        let committed = outcome.and_then(|scene| {
            let id = scene.id;
            self.timeline.prepend(scene)?;
            Ok(id)
        });
        match &committed {
            Ok(_) => self.composer.prompt.clear(),
            Err(err) => {
                self.composer.local_error = Some(err.scene_message());
                if err.is_access_class() {
                    self.banner.raise(err);
                }
            }
        }
        committed
    }

    pub async fn generate_scene_now(
        &mut self,
        backend: &dyn GenerationBackend,
        cancel: &CancellationToken,
    ) -> Result<SceneId> {
        let attempt = self.begin_scene()?;
        let outcome = attempt.run(backend, cancel).await;
        self.finish_scene(outcome)
    }

    pub fn begin_text(&mut self) -> std::result::Result<TextGeneration, Precondition> {
        if self.text_panel.in_flight {
            return Err(Precondition::Busy);
        }
        let generation =
            TextGeneration::new(self.text_panel.kind, &self.text_panel.topic, &self.config)?;
        self.text_panel.in_flight = true;
        Ok(generation)
    }

    pub fn finish_text(&mut self, text: String) {
        self.text_panel.in_flight = false;
        self.text_panel.result = Some(text);
    }

    pub async fn generate_text_now(
        &mut self,
        backend: &dyn GenerationBackend,
    ) -> std::result::Result<&str, Precondition> {
        let generation = self.begin_text()?;
        let text = generation.run(backend).await;
        self.finish_text(text);
        Ok(self.text_panel.result().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generation::{InlineImage, ScriptedBackend};

    #[tokio::test]
    async fn test_create_character_clears_form() {
        let backend = ScriptedBackend::new().with_image(InlineImage::png(vec![1]));
        let mut studio = Studio::default();
        studio.character_form.draft = CharacterDraft::new("Robo", "a blue robot");

        let id = studio.create_character_now(&backend).await.unwrap();
        assert_eq!(studio.characters().get(id).unwrap().name, "Robo");
        assert_eq!(studio.character_form.draft, CharacterDraft::default());
        assert!(!studio.character_form.in_flight());
    }

    #[test]
    fn test_cast_full_is_not_offered() {
        let mut studio = Studio::new(StudioConfig::new().with_max_characters(0));
        studio.character_form.draft = CharacterDraft::new("Robo", "a blue robot");
        assert!(!studio.can_add_character());
        assert_eq!(studio.begin_character().unwrap_err(), Precondition::CastFull(0));
    }

    #[test]
    fn test_second_attempt_while_in_flight_is_busy() {
        let mut studio = Studio::default();
        studio.character_form.draft = CharacterDraft::new("Robo", "a blue robot");
        let _first = studio.begin_character().unwrap();
        assert_eq!(studio.begin_character().unwrap_err(), Precondition::Busy);
    }

    #[test]
    fn test_text_panel_open_resets() {
        let mut studio = Studio::default();
        studio.text_panel.topic = "anger".to_string();
        studio.finish_text("old".to_string());

        studio.text_panel.open(EducationKind::EmotionCards);
        assert!(studio.text_panel.topic.is_empty());
        assert_eq!(studio.text_panel.result(), None);

        studio.text_panel.open(EducationKind::Help);
        assert!(studio.text_panel.result().unwrap().starts_with("Step 1"));
    }
}
