//! The cast: characters with a synthesized reference image.

use crate::error::{Result, StudioError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use generation::InlineImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CharacterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CharacterId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Reference image of a character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ReferenceImage {
    /// `data:` URL suitable for displaying the image inline.
    pub fn display_handle(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    pub fn to_inline(&self) -> InlineImage {
        InlineImage {
            mime_type: self.mime_type.clone(),
            data: self.data.clone(),
        }
    }
}

impl From<InlineImage> for ReferenceImage {
    fn from(image: InlineImage) -> Self {
        Self {
            mime_type: image.mime_type,
            data: image.data,
        }
    }
}

/// Created once from a successful synthesis and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub description: String,
    pub image: ReferenceImage,
}

/// Characters in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CharacterRegistry {
    characters: Vec<Character>,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a character. Ids must be unique within the registry.
    pub fn add(&mut self, character: Character) -> Result<()> {
        if self.get(character.id).is_some() {
            return Err(StudioError::DuplicateCharacter(character.id));
        }
        self.characters.push(character);
        Ok(())
    }

    /// Remove by id. Removing an unknown id does nothing.
    pub fn remove(&mut self, id: CharacterId) -> Option<Character> {
        let index = self.characters.iter().position(|c| c.id == id)?;
        Some(self.characters.remove(index))
    }

    pub fn get(&self, id: CharacterId) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// The first `n` characters in insertion order (fewer if the cast is smaller).
    pub fn first(&self, n: usize) -> &[Character] {
        &self.characters[..n.min(self.characters.len())]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter()
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(name: &str) -> Character {
        Character {
            id: CharacterId::new(),
            name: name.to_string(),
            description: format!("{name} description"),
            image: ReferenceImage {
                mime_type: "image/png".to_string(),
                data: vec![1, 2, 3],
            },
        }
    }

    #[test]
    fn test_insertion_order() {
        let mut registry = CharacterRegistry::new();
        for name in ["Robo", "Kim", "Pip", "Max"] {
            registry.add(character(name)).unwrap();
        }
        let names: Vec<_> = registry.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Robo", "Kim", "Pip", "Max"]);

        let first: Vec<_> = registry.first(3).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(first, ["Robo", "Kim", "Pip"]);
        assert_eq!(registry.first(10).len(), 4);
    }

    #[test]
    fn test_remove_existing() {
        let mut registry = CharacterRegistry::new();
        let robo = character("Robo");
        let kim = character("Kim");
        registry.add(robo.clone()).unwrap();
        registry.add(kim.clone()).unwrap();

        assert_eq!(registry.remove(robo.id), Some(robo));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(kim.id), Some(&kim));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut registry = CharacterRegistry::new();
        registry.add(character("Robo")).unwrap();

        assert_eq!(registry.remove(CharacterId::new()), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = CharacterRegistry::new();
        let robo = character("Robo");
        registry.add(robo.clone()).unwrap();

        assert_eq!(
            registry.add(robo.clone()),
            Err(StudioError::DuplicateCharacter(robo.id))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_display_handle() {
        let image = ReferenceImage {
            mime_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        };
        assert_eq!(image.display_handle(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_character_id_parse() {
        let id = CharacterId::new();
        assert_eq!(id.to_string().parse::<CharacterId>().unwrap(), id);
        assert!("robo".parse::<CharacterId>().is_err());
    }
}
