//! The normalized response shape.
//!
//! Every dispatch, successful or not, ends in a [`ResponseEnvelope`]. Its
//! fields are private; [`EnvelopeBuilder`] is the only way to make one, which
//! keeps the success and failure field sets mutually exclusive.

use rmcp::model::{CallToolResult, Content};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use super::classify::{ClassifiedFailure, ErrorCode};

/// Uniform result of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ResponseEnvelope {
    /// Whether the operation succeeded.
    success: bool,

    /// The operation that was requested.
    operation: String,

    /// Result payload, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,

    /// Number of results, present for sequence data and counted listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,

    /// Human-readable failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,

    /// Machine-readable failure code.
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,

    /// Corrective actions, best first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    suggestions: Vec<String>,
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn count(&self) -> Option<usize> {
        self.count
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error_code
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    /// The envelope as a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Wrap the envelope as an MCP tool result.
    ///
    /// The text content is the serialized envelope; `is_error` mirrors
    /// `success == false`.
    pub fn into_call_result(self) -> CallToolResult {
        let value = self.to_value();
        CallToolResult {
            content: vec![Content::text(value.to_string())],
            structured_content: Some(value),
            is_error: Some(!self.success),
            meta: None,
        }
    }
}

/// Constructors for [`ResponseEnvelope`].
pub struct EnvelopeBuilder;

impl EnvelopeBuilder {
    /// Successful result. Sequence data is counted automatically.
    pub fn success(operation: impl Into<String>, data: Value) -> ResponseEnvelope {
        let count = data.as_array().map(Vec::len);
        ResponseEnvelope {
            success: true,
            operation: operation.into(),
            data: Some(data),
            count,
            error: None,
            error_code: None,
            suggestions: Vec::new(),
        }
    }

    /// Successful result with an explicit count, e.g. `{results, total}`.
    ///
    /// For sequence data the sequence length wins over `count`.
    pub fn success_with_count(
        operation: impl Into<String>,
        data: Value,
        count: usize,
    ) -> ResponseEnvelope {
        let count = data.as_array().map(Vec::len).unwrap_or(count);
        ResponseEnvelope {
            count: Some(count),
            ..Self::success(operation, data)
        }
    }

    /// Failed result.
    pub fn failure(operation: impl Into<String>, failure: ClassifiedFailure) -> ResponseEnvelope {
        ResponseEnvelope {
            success: false,
            operation: operation.into(),
            data: None,
            count: None,
            error: Some(failure.message),
            error_code: Some(failure.error_code),
            suggestions: failure.suggestions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_counts_sequences() {
        let env = EnvelopeBuilder::success("list", json!([1, 2, 3]));
        assert!(env.is_success());
        assert_eq!(env.count(), Some(3));
        assert!(env.error().is_none());
        assert!(env.error_code().is_none());
    }

    #[test]
    fn test_success_object_has_no_count() {
        let env = EnvelopeBuilder::success("get", json!({"id": "1"}));
        assert_eq!(env.count(), None);
        let value = env.to_value();
        assert!(value.get("count").is_none());
        assert!(value.get("suggestions").is_none());
    }

    #[test]
    fn test_explicit_count_cannot_contradict_sequence() {
        let env = EnvelopeBuilder::success_with_count("list", json!(["a"]), 10);
        assert_eq!(env.count(), Some(1));
        let env = EnvelopeBuilder::success_with_count("search", json!({"results": []}), 10);
        assert_eq!(env.count(), Some(10));
    }

    #[test]
    fn test_failure_fields() {
        let env = EnvelopeBuilder::failure(
            "get",
            ClassifiedFailure {
                error_code: ErrorCode::NotFound,
                message: "library '9' not found".into(),
                suggestions: vec!["List libraries".into()],
            },
        );
        let value = env.to_value();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error_code"], json!("not_found"));
        assert!(value.get("data").is_none());
        assert!(value.get("count").is_none());
    }

    #[test]
    fn test_call_result_mirrors_success() {
        let ok = EnvelopeBuilder::success("list", json!([])).into_call_result();
        assert_eq!(ok.is_error, Some(false));
        let failed = EnvelopeBuilder::failure(
            "list",
            ClassifiedFailure {
                error_code: ErrorCode::Cancelled,
                message: "cancelled".into(),
                suggestions: vec![],
            },
        )
        .into_call_result();
        assert_eq!(failed.is_error, Some(true));
        assert!(failed.structured_content.is_some());
    }
}
