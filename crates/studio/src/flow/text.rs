use crate::config::StudioConfig;
use crate::error::{Precondition, Result};
use crate::prompts::EducationKind;
use generation::{GenerationBackend, TextRequest};
use tracing::warn;

/// Shown when the service answered without any text.
pub const EMPTY_TEXT_FALLBACK: &str = "Error while generating text.";

/// Shown when the request itself failed.
pub const TEXT_FAILURE_MESSAGE: &str =
    "Oops, something went wrong while generating. Please contact the system administrator.";

/// One request for teacher material. The result is display-only.
#[derive(Debug, Clone)]
pub struct TextGeneration {
    kind: EducationKind,
    request: Option<TextRequest>,
}

impl TextGeneration {
    pub fn new(
        kind: EducationKind,
        topic: &str,
        config: &StudioConfig,
    ) -> std::result::Result<Self, Precondition> {
        let request = match kind.system_instruction() {
            Some(instruction) => Some(TextRequest {
                model: config.text_model.clone(),
                system_instruction: Some(instruction.to_string()),
                prompt: kind.prompt(topic)?,
            }),
            None => None,
        };
        Ok(Self { kind, request })
    }

    pub fn kind(&self) -> EducationKind {
        self.kind
    }

    pub fn request(&self) -> Option<&TextRequest> {
        self.request.as_ref()
    }

    /// Run the request, surfacing service failures.
    pub async fn try_run(self, backend: &dyn GenerationBackend) -> Result<String> {
        let Some(request) = self.request else {
            return Ok(self.kind.static_text().unwrap_or_default().to_string());
        };
        let text = backend.generate_text(&request).await?;
        Ok(text.unwrap_or_else(|| EMPTY_TEXT_FALLBACK.to_string()))
    }

    /// Run the request. Failures turn into an apology text.
    pub async fn run(self, backend: &dyn GenerationBackend) -> String {
        let kind = self.kind;
        match self.try_run(backend).await {
            Ok(text) => text,
            Err(err) => {
                warn!(%kind, error = %err, "text generation failed");
                TEXT_FAILURE_MESSAGE.to_string()
            }
        }
    }
}
