//! Failures raised at the media-server boundary.

use thiserror::Error;

/// Result type for media-server calls.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors a [`MediaServer`](super::MediaServer) implementation may return.
///
/// Every backend failure lands in one of these kinds so the dispatcher can
/// classify it without inspecting message text.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The referenced entity does not exist on the server.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    /// The credential was rejected or is missing.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network failure, timeout, or a non-success response from the server.
    #[error("Media server request failed: {0}")]
    Upstream(String),

    /// The backend has no way to perform this action.
    #[error("Not supported: {0}")]
    Unsupported(String),
}

impl AdapterError {
    /// Create a "not found" error for the given entity kind and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create an upstream error.
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create an "unsupported" error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Upstream(format!("request timed out: {}", err))
        } else if err.is_connect() {
            Self::Upstream(format!("could not connect to media server: {}", err))
        } else if err.is_decode() {
            Self::Upstream(format!("unexpected response body: {}", err))
        } else {
            Self::Upstream(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = AdapterError::not_found("library", "7");
        assert_eq!(err.to_string(), "library '7' not found");
    }

    #[test]
    fn test_constructors() {
        assert!(matches!(AdapterError::auth("x"), AdapterError::Auth(_)));
        assert!(matches!(AdapterError::upstream("x"), AdapterError::Upstream(_)));
        assert!(matches!(
            AdapterError::unsupported("x"),
            AdapterError::Unsupported(_)
        ));
    }
}
