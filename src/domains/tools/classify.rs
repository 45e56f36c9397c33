//! Failure classification.
//!
//! Maps an [`OperationError`] to a stable code, a message safe to show the
//! caller, and an ordered list of corrective suggestions.

use schemars::JsonSchema;
use serde::Serialize;
use tracing::error;

use super::error::OperationError;

/// Stable, machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MissingParameter,
    InvalidParameter,
    NotFound,
    AuthFailed,
    UpstreamError,
    NotSupported,
    UnknownOperation,
    UnknownDomain,
    Cancelled,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingParameter => "missing_parameter",
            Self::InvalidParameter => "invalid_parameter",
            Self::NotFound => "not_found",
            Self::AuthFailed => "auth_failed",
            Self::UpstreamError => "upstream_error",
            Self::NotSupported => "not_supported",
            Self::UnknownOperation => "unknown_operation",
            Self::UnknownDomain => "unknown_domain",
            Self::Cancelled => "cancelled",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure ready to be placed in an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedFailure {
    pub error_code: ErrorCode,
    pub message: String,
    pub suggestions: Vec<String>,
}

/// The listing call that enumerates ids for an entity kind.
fn listing_call(entity: &str) -> Option<&'static str> {
    match entity {
        "library" | "location" => Some("plex_library operation='list'"),
        "playlist" => Some("plex_playlist operation='list'"),
        "collection" => Some("plex_collections operation='list'"),
        "user" => Some("plex_user operation='list'"),
        "item" | "media" => Some("plex_search operation='search'"),
        "client" => Some("plex_streaming operation='list_clients'"),
        "profile" => Some("plex_quality operation='list_profiles'"),
        "integration" => Some("plex_integration operation='list_integrations'"),
        "tool" | "domain" => Some("plex_help operation='list_tools'"),
        _ => None,
    }
}

/// Classify an error.
pub fn classify(err: &OperationError) -> ClassifiedFailure {
    let (error_code, message, suggestions) = match err {
        OperationError::MissingParameters {
            missing,
            any_of,
            example,
        } => {
            let mut suggestions: Vec<String> = if *any_of {
                vec![format!("Provide at least one of: {}", missing.join(", "))]
            } else {
                missing
                    .iter()
                    .map(|name| format!("Provide the required parameter '{}'", name))
                    .collect()
            };
            if let Some(example) = example {
                suggestions.push(format!("Example: {}", example));
            }
            (ErrorCode::MissingParameter, err.to_string(), suggestions)
        }

        OperationError::InvalidParameter { name, allowed, .. } => {
            let mut suggestions = vec![format!("Check the value passed for '{}'", name)];
            if !allowed.is_empty() {
                suggestions.push(format!("Allowed values: {}", allowed.join(", ")));
            }
            (ErrorCode::InvalidParameter, err.to_string(), suggestions)
        }

        OperationError::NotFound { entity, id } => {
            let mut suggestions = vec![format!("Verify that the {} id '{}' is correct", entity, id)];
            if let Some(call) = listing_call(entity) {
                suggestions.push(format!("List valid ids with {}", call));
            }
            (ErrorCode::NotFound, err.to_string(), suggestions)
        }

        OperationError::Auth(_) => (
            ErrorCode::AuthFailed,
            err.to_string(),
            vec![
                "Check that PLEX_TOKEN is set and still valid".to_string(),
                "Generate a new token from Plex Web (Settings > Account > Authorized Devices)"
                    .to_string(),
            ],
        ),

        OperationError::Upstream(_) => (
            ErrorCode::UpstreamError,
            err.to_string(),
            vec![
                "Check that the Plex server is running and reachable at PLEX_URL".to_string(),
                "Retry the operation once the server is available".to_string(),
            ],
        ),

        OperationError::Unsupported(_) => (
            ErrorCode::NotSupported,
            err.to_string(),
            vec!["Use the Plex Web interface for this action".to_string()],
        ),

        OperationError::UnknownOperation { candidates, .. } => (
            ErrorCode::UnknownOperation,
            err.to_string(),
            candidates
                .iter()
                .map(|c| format!("Did you mean operation '{}'?", c))
                .collect(),
        ),

        OperationError::UnknownDomain { available, .. } => (
            ErrorCode::UnknownDomain,
            err.to_string(),
            vec![
                format!("Valid domains: {}", available.join(", ")),
                "Use plex_help operation='list_tools' to browse every operation".to_string(),
            ],
        ),

        OperationError::Cancelled(_) => (
            ErrorCode::Cancelled,
            err.to_string(),
            vec![
                "Retry with a longer deadline".to_string(),
                "Raise MCP_DISPATCH_TIMEOUT_SECS or MCP_LONG_RUNNING_TIMEOUT_SECS for slow servers"
                    .to_string(),
            ],
        ),

        OperationError::Internal(detail) => {
            error!("Internal error during dispatch: {}", detail);
            (
                ErrorCode::InternalError,
                "An internal error occurred while running the operation".to_string(),
                vec![
                    "Check the server logs for details".to_string(),
                    "Retry the operation".to_string(),
                ],
            )
        }
    };

    ClassifiedFailure {
        error_code,
        message,
        suggestions,
    }
}

/// Rank `names` by edit distance to `target`, then alphabetically.
pub fn closest<'a>(target: &str, names: impl IntoIterator<Item = &'a str>, cap: usize) -> Vec<String> {
    let target = target.to_lowercase();
    let mut ranked: Vec<(usize, &str)> = names
        .into_iter()
        .map(|name| (edit_distance(&target, name), name))
        .collect();
    ranked.sort();
    ranked
        .into_iter()
        .take(cap)
        .map(|(_, name)| name.to_string())
        .collect()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == *cb { 0 } else { 1 };
            let next = (row[j] + 1).min(row[j + 1] + 1).min(prev + cost);
            prev = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCode::MissingParameter).unwrap();
        assert_eq!(json, "\"missing_parameter\"");
        assert_eq!(ErrorCode::AuthFailed.to_string(), "auth_failed");
    }

    #[test]
    fn test_missing_lists_every_parameter() {
        let err = OperationError::missing_all(vec!["library_id".into(), "path".into()])
            .with_example("plex_library(operation=\"add_location\")".into());
        let failure = classify(&err);
        assert_eq!(failure.error_code, ErrorCode::MissingParameter);
        assert!(failure.message.contains("library_id"));
        assert_eq!(failure.suggestions.len(), 3);
        assert!(failure.suggestions[1].contains("path"));
        assert!(failure.suggestions[2].starts_with("Example:"));
    }

    #[test]
    fn test_not_found_names_listing_operation() {
        let failure = classify(&OperationError::not_found("playlist", "99"));
        assert_eq!(failure.error_code, ErrorCode::NotFound);
        assert!(failure.suggestions.iter().any(|s| s.contains("plex_playlist")));
    }

    #[test]
    fn test_internal_detail_hidden() {
        let failure = classify(&OperationError::internal("db password is hunter2"));
        assert_eq!(failure.error_code, ErrorCode::InternalError);
        assert!(!failure.message.contains("hunter2"));
    }

    #[test]
    fn test_closest_ranks_by_distance_then_name() {
        let names = ["list", "get", "create", "delete", "scan", "refresh", "update"];
        let ranked = closest("lst", names, 5);
        assert_eq!(ranked[0], "list");
        assert_eq!(ranked.len(), 5);

        let ranked = closest("xyz", ["b", "a"], 5);
        assert_eq!(ranked, vec!["a", "b"]);
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }
}
