//! Operation error types.

use thiserror::Error;

use crate::adapter::AdapterError;

/// Errors that can occur while resolving, validating, or running an operation.
///
/// Every variant is turned into a failure envelope by
/// [`classify`](super::classify::classify); none of them ever reach the caller
/// as a raised error.
#[derive(Debug, Clone, Error)]
pub enum OperationError {
    /// The requested domain does not exist.
    #[error("Unknown domain '{domain}'")]
    UnknownDomain {
        domain: String,
        available: Vec<String>,
    },

    /// The domain exists but has no such operation.
    #[error("Unknown operation '{operation}' for domain '{domain}'")]
    UnknownOperation {
        domain: String,
        operation: String,
        /// Closest known operation names, best first.
        candidates: Vec<String>,
    },

    /// One or more required parameters were absent.
    #[error("{}", describe_missing(.missing, .any_of))]
    MissingParameters {
        missing: Vec<String>,
        /// `true` when any one of `missing` would satisfy the requirement.
        any_of: bool,
        example: Option<String>,
    },

    /// A parameter was present but violates its declared constraint.
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
        allowed: Vec<String>,
    },

    /// The referenced entity does not exist on the media server.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    /// The media server rejected the credential.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The media server was unreachable or answered with an error.
    #[error("Media server error: {0}")]
    Upstream(String),

    /// The media server cannot perform this action.
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// The caller cancelled or the deadline elapsed.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Anything unexpected. Detail is logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_missing(missing: &[String], any_of: &bool) -> String {
    match (missing.first(), *any_of) {
        (Some(_), true) => format!(
            "Missing required parameter: provide at least one of {}",
            missing.join(", ")
        ),
        (Some(first), false) => format!("Missing required parameter: {}", first),
        (None, _) => "Missing required parameter".to_string(),
    }
}

impl OperationError {
    /// A single missing parameter.
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingParameters {
            missing: vec![name.into()],
            any_of: false,
            example: None,
        }
    }

    /// Several parameters, all of which are required.
    pub fn missing_all(names: Vec<String>) -> Self {
        Self::MissingParameters {
            missing: names,
            any_of: false,
            example: None,
        }
    }

    /// A requirement satisfied by any one of `names`.
    pub fn missing_any(names: &[&str]) -> Self {
        Self::MissingParameters {
            missing: names.iter().map(|n| n.to_string()).collect(),
            any_of: true,
            example: None,
        }
    }

    /// Invalid value for `name`.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
            allowed: Vec::new(),
        }
    }

    /// Invalid value for `name`, listing what would have been accepted.
    pub fn invalid_choice(name: impl Into<String>, reason: impl Into<String>, allowed: &[&str]) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
            allowed: allowed.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Attach an example call to a missing-parameter error.
    pub fn with_example(self, call: String) -> Self {
        match self {
            Self::MissingParameters {
                missing, any_of, ..
            } => Self::MissingParameters {
                missing,
                any_of,
                example: Some(call),
            },
            other => other,
        }
    }
}

impl From<AdapterError> for OperationError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::NotFound { entity, id } => Self::NotFound { entity, id },
            AdapterError::Auth(msg) => Self::Auth(msg),
            AdapterError::Upstream(msg) => Self::Upstream(msg),
            AdapterError::Unsupported(msg) => Self::Unsupported(msg),
        }
    }
}

impl From<serde_json::Error> for OperationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_message_names_first() {
        let err = OperationError::missing_all(vec!["library_id".into(), "path".into()]);
        assert_eq!(err.to_string(), "Missing required parameter: library_id");
    }

    #[test]
    fn test_missing_any_message_lists_all() {
        let err = OperationError::missing_any(&["query", "summary_contains"]);
        let msg = err.to_string();
        assert!(msg.contains("query"));
        assert!(msg.contains("summary_contains"));
    }

    #[test]
    fn test_with_example_only_touches_missing() {
        let err = OperationError::missing("x").with_example("call".into());
        assert!(matches!(
            err,
            OperationError::MissingParameters { example: Some(_), .. }
        ));
        let err = OperationError::internal("boom").with_example("call".into());
        assert!(matches!(err, OperationError::Internal(_)));
    }

    #[test]
    fn test_from_adapter_error() {
        let err: OperationError = AdapterError::not_found("playlist", "4").into();
        assert_eq!(err.to_string(), "playlist '4' not found");
        let err: OperationError = AdapterError::unsupported("restart").into();
        assert!(matches!(err, OperationError::Unsupported(_)));
    }
}
