use crate::character::CharacterId;
use crate::scene::SceneId;
use generation::ServiceError;
use thiserror::Error;

pub const ACCESS_DENIED_MESSAGE: &str = "Access denied. Please contact the system administrator.";
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "System error: the AI service is temporarily unavailable.";
pub const SCENE_FAILED_MESSAGE: &str =
    "Something went wrong while making the video. Please try again.";
pub const EMPTY_IMAGE_MESSAGE: &str = "No image was generated.";
pub const EMPTY_VIDEO_MESSAGE: &str = "Video generation failed.";
pub const CANCELLED_MESSAGE: &str = "Video generation was cancelled.";

pub const BANNER_ACCESS_DENIED: &str = "Access denied. Please contact the website administrator.";
pub const BANNER_CONNECTION_FAILED: &str = "An error occurred while connecting to the studio.";

/// A user action that is not offered in the current state. Nothing was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("describe the scene first")]
    EmptyPrompt,
    #[error("the character needs a name")]
    EmptyName,
    #[error("the character needs a description")]
    EmptyDescription,
    #[error("enter a topic first")]
    EmptyTopic,
    #[error("create a character first")]
    NoCharacters,
    #[error("the cast is full ({0} characters)")]
    CastFull(usize),
    #[error("still working on the previous request")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StudioError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("the service returned no image")]
    EmptyImage,

    #[error("the service returned no video locator")]
    EmptyVideo,

    #[error("generation cancelled")]
    Cancelled,

    #[error(transparent)]
    Precondition(#[from] Precondition),

    #[error("character already exists: {0}")]
    DuplicateCharacter(CharacterId),

    #[error("scene already exists: {0}")]
    DuplicateScene(SceneId),
}

pub type Result<T> = std::result::Result<T, StudioError>;

impl StudioError {
    /// Credential-class failures, the ones that also raise the banner.
    pub fn is_access_class(&self) -> bool {
        matches!(self, StudioError::Service(err) if err.is_access_class())
    }

    /// Message shown next to the scene composer.
    pub fn scene_message(&self) -> String {
        match self {
            StudioError::Service(ServiceError::Auth(_)) => ACCESS_DENIED_MESSAGE.to_string(),
            StudioError::Service(ServiceError::NotFound(_)) => {
                SERVICE_UNAVAILABLE_MESSAGE.to_string()
            }
            StudioError::Service(ServiceError::Download { status }) => {
                format!("Video download failed: {}", status_text(*status))
            }
            StudioError::EmptyVideo => EMPTY_VIDEO_MESSAGE.to_string(),
            StudioError::EmptyImage => EMPTY_IMAGE_MESSAGE.to_string(),
            StudioError::Cancelled => CANCELLED_MESSAGE.to_string(),
            StudioError::Precondition(p) => p.to_string(),
            _ => SCENE_FAILED_MESSAGE.to_string(),
        }
    }

    /// Message for the persistent banner.
    pub fn banner_message(&self) -> &'static str {
        if self.is_access_class() {
            BANNER_ACCESS_DENIED
        } else {
            BANNER_CONNECTION_FAILED
        }
    }
}

fn status_text(status: u16) -> String {
    let reason = match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => return status.to_string(),
    };
    format!("{status} {reason}")
}

/// Global error display that stays up until the user dismisses it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorBanner {
    message: Option<&'static str>,
}

impl ErrorBanner {
    pub fn raise(&mut self, error: &StudioError) {
        self.message = Some(error.banner_message());
    }

    pub fn dismiss(&mut self) {
        self.message = None;
    }

    pub fn message(&self) -> Option<&'static str> {
        self.message
    }

    pub fn is_raised(&self) -> bool {
        self.message.is_some()
    }
}
