//! Error taxonomy for calls against the generative service.
//!
//! Everything the remote side can say about a failure collapses into one of the
//! variants below. The raw text of a failure is inspected in exactly one place,
//! [`ServiceError::classify`]; callers match on variants.

use thiserror::Error;

/// Substrings the service uses when a credential is rejected or lacks entitlement.
const ACCESS_DENIED_MARKERS: &[&str] = &["PERMISSION_DENIED", "403"];

/// Substring the service uses when a model or operation is unknown to this key.
const NOT_FOUND_MARKERS: &[&str] = &["Requested entity was not found"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Credential rejected or insufficient entitlement.
    #[error("access denied: {0}")]
    Auth(String),

    /// The requested model or operation does not exist for this credential.
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything else the service or the transport reported.
    #[error("service error: {0}")]
    Transient(String),

    /// The service answered with a body we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// No credential in the process environment.
    #[error("missing credential: set the {0} environment variable")]
    MissingCredential(String),

    /// The video bytes download answered with a non-success status.
    #[error("download failed with status {status}")]
    Download { status: u16 },
}

impl ServiceError {
    /// Classify a free-form failure message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if ACCESS_DENIED_MARKERS.iter().any(|m| message.contains(m)) {
            ServiceError::Auth(message)
        } else if NOT_FOUND_MARKERS.iter().any(|m| message.contains(m)) {
            ServiceError::NotFound(message)
        } else {
            ServiceError::Transient(message)
        }
    }

    /// Classify a failed HTTP exchange. The status code wins over the message text.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ServiceError::Auth(message),
            404 => ServiceError::NotFound(message),
            _ => Self::classify(format!("{status}: {message}")),
        }
    }

    /// Credential-class failures. These are the ones worth a persistent banner.
    pub fn is_access_class(&self) -> bool {
        matches!(self, ServiceError::Auth(_) | ServiceError::NotFound(_))
    }
}

/// Transport failures. The request URL is stripped since download URLs carry the
/// credential; failures without an HTTP status are never substring-classified.
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        match err.status() {
            Some(status) => ServiceError::from_status(status.as_u16(), err.to_string()),
            None => ServiceError::Transient(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_auth() {
        let err = ServiceError::classify("PERMISSION_DENIED: the caller does not have access");
        assert!(matches!(err, ServiceError::Auth(_)));
        assert!(err.is_access_class());
    }

    #[test]
    fn test_bare_403_in_message_is_auth() {
        let err = ServiceError::classify("request failed with code 403");
        assert!(matches!(err, ServiceError::Auth(_)));
    }

    #[test]
    fn test_entity_not_found() {
        let err = ServiceError::classify("Requested entity was not found.");
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(err.is_access_class());
    }

    #[test]
    fn test_everything_else_is_transient() {
        let err = ServiceError::classify("connection reset by peer");
        assert_eq!(err, ServiceError::Transient("connection reset by peer".to_string()));
        assert!(!err.is_access_class());
    }

    #[test]
    fn test_status_code_takes_precedence() {
        assert!(matches!(ServiceError::from_status(401, "bad key"), ServiceError::Auth(_)));
        assert!(matches!(ServiceError::from_status(404, "gone"), ServiceError::NotFound(_)));
        assert!(matches!(
            ServiceError::from_status(500, "internal"),
            ServiceError::Transient(_)
        ));
        // A 400 that carries a permission marker in its body is still access-class.
        assert!(matches!(
            ServiceError::from_status(400, "PERMISSION_DENIED"),
            ServiceError::Auth(_)
        ));
    }

    #[test]
    fn test_download_is_not_access_class() {
        assert!(!ServiceError::Download { status: 403 }.is_access_class());
    }
}
