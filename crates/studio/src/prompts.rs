//! Prompt composition and the fixed instructions behind the teacher tools.

use crate::error::Precondition;
use serde::{Deserialize, Serialize};

/// Style prefix of every character image prompt.
pub const CHARACTER_STYLE: &str = "A high-quality 3D Pixar-style animated character profile, professional CGI, cinematic lighting, detailed textures, expressive eyes, consistent studio style, solid white background";

const SCENE_STYLE: &str = "Professional 3D CGI animation, vibrant cinematic lighting, rich textures, expressive character animation, detailed background. Maintain strict visual consistency with the provided character references.";

pub fn character_prompt(name: &str, description: &str) -> String {
    format!("{CHARACTER_STYLE}: {}: {}", name.trim(), description.trim())
}

pub fn scene_prompt(character_names: &[&str], description: &str) -> String {
    format!(
        "A cinematic 3D Pixar-style animated movie scene featuring the characters: {}. Scene description: {}. {SCENE_STYLE}",
        character_names.join(", "),
        description.trim()
    )
}

/// Teacher tools in the education menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationKind {
    LessonBrief,
    EmotionCards,
    ScenarioCards,
    Help,
}

const HELP_TEXT: &str = "\
Step 1: The cast
Think up characters (for example 'Pete the Robot' or 'Miss Kim') and describe how they look. The AI turns them into 3D models in Pixar style.

Step 2: Directing
Describe what happens, for example 'Pete is sad because he has run out of oil'. The AI generates a short film with your characters.

Step 3: Discussing
Download the film and show it on the classroom board. Discuss with the class: what is happening here? How can we solve this?";

impl EducationKind {
    pub const ALL: [EducationKind; 4] = [
        EducationKind::LessonBrief,
        EducationKind::EmotionCards,
        EducationKind::ScenarioCards,
        EducationKind::Help,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::LessonBrief => "Generate a lesson brief",
            Self::EmotionCards => "Generate emotion cards",
            Self::ScenarioCards => "Generate scenario cards",
            Self::Help => "How does ToonCraft work?",
        }
    }

    /// Example topic shown as a hint.
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::LessonBrief => "e.g. bullying in the playground",
            Self::EmotionCards => "e.g. dealing with anger",
            Self::ScenarioCards | Self::Help => "describe the theme for the cards",
        }
    }

    /// Role instruction sent with the request. `None` for tools that need no request.
    pub fn system_instruction(self) -> Option<&'static str> {
        match self {
            Self::LessonBrief => Some(
                "You are an education expert. Write a structured lesson brief for a primary school teacher based on a theme. Use headings such as: Goal, Materials, Core activity (with ToonCraft) and Reflection.",
            ),
            Self::EmotionCards => Some(
                "You are an educationalist. Generate a list of 5 'Emotion Cards'. Each card has a Name and a short Description of how to put this emotion into words in an AI prompt (e.g. 'Joy: use words like golden light, smile, bright colours').",
            ),
            Self::ScenarioCards => Some(
                "You are a coach for primary education. Generate 3 scenarios that pupils can act out in ToonCraft to practise social-emotional skills.",
            ),
            Self::Help => None,
        }
    }

    /// User prompt for `topic`.
    pub fn prompt(self, topic: &str) -> std::result::Result<String, Precondition> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(Precondition::EmptyTopic);
        }
        Ok(match self {
            Self::LessonBrief => format!("Generate a lesson brief on the theme: {topic}"),
            Self::EmotionCards => {
                format!("Create emotion cards for primary school pupils about: {topic}")
            }
            Self::ScenarioCards => format!("Create scenario cards about: {topic}"),
            Self::Help => topic.to_string(),
        })
    }

    /// Text shown without asking the service.
    pub fn static_text(self) -> Option<&'static str> {
        match self {
            Self::Help => Some(HELP_TEXT),
            _ => None,
        }
    }
}

impl std::fmt::Display for EducationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LessonBrief => write!(f, "lesson"),
            Self::EmotionCards => write!(f, "emotion"),
            Self::ScenarioCards => write!(f, "scenario"),
            Self::Help => write!(f, "help"),
        }
    }
}

impl std::str::FromStr for EducationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lesson" | "lesson-brief" | "brief" => Ok(Self::LessonBrief),
            "emotion" | "emotions" | "emotion-cards" => Ok(Self::EmotionCards),
            "scenario" | "scenarios" | "scenario-cards" | "situation" => Ok(Self::ScenarioCards),
            "help" => Ok(Self::Help),
            other => Err(format!(
                "unknown tool '{other}' (expected lesson, emotion, scenario or help)"
            )),
        }
    }
}
