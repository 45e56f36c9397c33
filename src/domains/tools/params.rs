//! Parameter declarations and validation.
//!
//! Callers send loosely-typed JSON. [`validate`] checks a raw bag against an
//! operation's declared parameters, coerces the usual near-misses (numeric
//! ids, numeric strings, `"yes"`/`"no"`, a lone string where a list is
//! expected) and returns a [`Params`] bag that handlers can read without
//! further checks.

use serde_json::{Map, Number, Value};
use tracing::debug;

use super::error::OperationError;
use super::spec::OperationSpec;

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// Free text. Numbers and booleans are accepted and stringified.
    Str,
    /// Whole number with optional inclusive bounds.
    Int { min: Option<i64>, max: Option<i64> },
    /// Real number with optional inclusive bounds.
    Float { min: Option<f64>, max: Option<f64> },
    Bool,
    /// One of a fixed set of spellings, matched case-insensitively.
    Enum(&'static [&'static str]),
    /// List of strings. A single scalar becomes a one-element list.
    StrList,
    /// JSON object. A string holding a JSON object is parsed.
    Object,
    /// Anything, passed through untouched.
    Any,
}

impl ParamKind {
    pub const INT: ParamKind = ParamKind::Int {
        min: None,
        max: None,
    };

    pub const NON_NEGATIVE: ParamKind = ParamKind::Int {
        min: Some(0),
        max: None,
    };

    pub fn int_range(min: i64, max: i64) -> Self {
        Self::Int {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn float_range(min: f64, max: f64) -> Self {
        Self::Float {
            min: Some(min),
            max: Some(max),
        }
    }

    /// JSON-schema type name.
    pub fn schema_type(&self) -> &'static str {
        match self {
            Self::Str | Self::Enum(_) => "string",
            Self::Int { .. } => "integer",
            Self::Float { .. } => "number",
            Self::Bool => "boolean",
            Self::StrList => "array",
            Self::Object => "object",
            Self::Any => "any",
        }
    }
}

/// A declared parameter of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
    pub min_len: Option<usize>,
    pub description: &'static str,
}

impl Param {
    pub fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            min_len: None,
            description: "",
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// Value filled in when the caller leaves the parameter out.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Minimum length in characters, for string parameters.
    pub fn min_len(mut self, len: usize) -> Self {
        self.min_len = Some(len);
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Placeholder value used in example calls.
    pub fn example_value(&self) -> String {
        match self.kind {
            ParamKind::Enum(values) => format!("\"{}\"", values.first().copied().unwrap_or("")),
            ParamKind::Int { min, .. } => min.unwrap_or(1).max(1).to_string(),
            ParamKind::Float { .. } => "1.0".to_string(),
            ParamKind::Bool => "true".to_string(),
            ParamKind::StrList => format!("[\"<{}>\"]", self.name),
            ParamKind::Object => "{...}".to_string(),
            ParamKind::Str | ParamKind::Any => format!("\"<{}>\"", self.name),
        }
    }
}

/// A validated parameter bag.
///
/// Only declared parameters survive validation, already coerced to their
/// declared kind, with defaults filled in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// A string parameter the operation declared as required.
    pub fn require(&self, name: &str) -> Result<&str, OperationError> {
        self.text(name).ok_or_else(|| OperationError::missing(name))
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn uint(&self, name: &str) -> Option<u64> {
        self.int(name).and_then(|v| u64::try_from(v).ok())
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    /// Boolean parameter, `false` when absent.
    pub fn flag(&self, name: &str) -> bool {
        self.bool(name).unwrap_or(false)
    }

    pub fn list(&self, name: &str) -> Vec<String> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0.get(name).and_then(Value::as_object)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// `null`, `""` and `[]` count as absent.
fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Check `raw` against `spec` and produce the validated bag.
///
/// Missing parameters take precedence over invalid ones. Any-of groups are
/// satisfied only by values the caller actually sent, never by defaults.
pub fn validate(spec: &OperationSpec, mut raw: Map<String, Value>) -> Result<Params, OperationError> {
    for name in raw.keys() {
        if spec.param_named(name).is_none() {
            debug!(
                "Ignoring unknown parameter '{}' for operation '{}'",
                name,
                spec.name()
            );
        }
    }

    let mut validated = Map::new();
    let mut missing = Vec::new();
    let mut first_invalid = None;
    let mut provided: Vec<&str> = Vec::new();

    for param in spec.params() {
        match raw.remove(param.name).filter(|v| !is_absent(v)) {
            Some(value) => match coerce(param, value) {
                Ok(value) => {
                    provided.push(param.name);
                    validated.insert(param.name.to_string(), value);
                }
                Err(err) => {
                    if first_invalid.is_none() {
                        first_invalid = Some(err);
                    }
                }
            },
            None if param.required => missing.push(param.name.to_string()),
            None => {
                if let Some(default) = &param.default {
                    validated.insert(param.name.to_string(), default.clone());
                }
            }
        }
    }

    if !missing.is_empty() {
        return Err(OperationError::missing_all(missing));
    }
    if let Some(err) = first_invalid {
        return Err(err);
    }

    for group in spec.any_of_groups() {
        if !group.iter().any(|name| provided.contains(name)) {
            return Err(OperationError::missing_any(group));
        }
    }

    Ok(Params(validated))
}

fn coerce(param: &Param, value: Value) -> Result<Value, OperationError> {
    let name = param.name;
    let coerced = match param.kind {
        ParamKind::Any => value,

        ParamKind::Str => Value::String(scalar_text(name, value)?),

        ParamKind::Int { min, max } => {
            let n = match &value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| OperationError::invalid(name, "expected a whole number"))?;
            check_range(name, n as f64, min.map(|m| m as f64), max.map(|m| m as f64))?;
            Value::from(n)
        }

        ParamKind::Float { min, max } => {
            let n = match &value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .filter(|f| f.is_finite())
            .ok_or_else(|| OperationError::invalid(name, "expected a number"))?;
            check_range(name, n, min, max)?;
            Number::from_f64(n)
                .map(Value::Number)
                .ok_or_else(|| OperationError::invalid(name, "expected a number"))?
        }

        ParamKind::Bool => {
            let b = match &value {
                Value::Bool(b) => Some(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(1) => Some(true),
                    Some(0) => Some(false),
                    _ => None,
                },
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "yes" | "1" | "on" => Some(true),
                    "false" | "no" | "0" | "off" => Some(false),
                    _ => None,
                },
                _ => None,
            };
            Value::Bool(b.ok_or_else(|| {
                OperationError::invalid_choice(name, "expected a boolean", &["true", "false"])
            })?)
        }

        ParamKind::Enum(allowed) => {
            let given = scalar_text(name, value)?;
            let canonical = allowed
                .iter()
                .find(|a| a.eq_ignore_ascii_case(given.trim()))
                .ok_or_else(|| {
                    OperationError::invalid_choice(
                        name,
                        format!("'{}' is not one of the allowed values", given),
                        allowed,
                    )
                })?;
            Value::String(canonical.to_string())
        }

        ParamKind::StrList => {
            let items = match value {
                Value::Array(items) => items
                    .into_iter()
                    .filter(|v| !is_absent(v))
                    .map(|v| scalar_text(name, v))
                    .collect::<Result<Vec<_>, _>>()?,
                scalar => vec![scalar_text(name, scalar)?],
            };
            Value::from(items)
        }

        ParamKind::Object => match value {
            Value::Object(map) => Value::Object(map),
            Value::String(s) => match serde_json::from_str::<Value>(&s) {
                Ok(Value::Object(map)) => Value::Object(map),
                _ => return Err(OperationError::invalid(name, "expected a JSON object")),
            },
            _ => return Err(OperationError::invalid(name, "expected a JSON object")),
        },
    };

    if let (Some(min_len), Some(text)) = (param.min_len, coerced.as_str()) {
        if text.chars().count() < min_len {
            return Err(OperationError::invalid(
                name,
                format!("must be at least {} characters", min_len),
            ));
        }
    }

    Ok(coerced)
}

fn scalar_text(name: &str, value: Value) -> Result<String, OperationError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(OperationError::invalid(name, "expected text")),
    }
}

fn check_range(name: &str, n: f64, min: Option<f64>, max: Option<f64>) -> Result<(), OperationError> {
    let below = min.is_some_and(|m| n < m);
    let above = max.is_some_and(|m| n > m);
    if !below && !above {
        return Ok(());
    }
    let range = match (min, max) {
        (Some(lo), Some(hi)) => format!("between {} and {}", lo, hi),
        (Some(lo), None) => format!("at least {}", lo),
        (None, Some(hi)) => format!("at most {}", hi),
        (None, None) => String::new(),
    };
    Err(OperationError::InvalidParameter {
        name: name.to_string(),
        reason: format!("{} is out of range", n),
        allowed: vec![range],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::spec::{OperationOutput, OperationSpec};
    use serde_json::json;

    fn spec() -> OperationSpec {
        OperationSpec::new("probe", "test operation", |_ctx| async {
            Ok::<_, OperationError>(OperationOutput::value(Value::Null))
        })
        .param(Param::required("library_id", ParamKind::Str))
        .param(Param::optional("limit", ParamKind::int_range(1, 1000)).default(100))
        .param(Param::optional("force", ParamKind::Bool))
        .param(Param::optional("sort_dir", ParamKind::Enum(&["asc", "desc"])))
        .param(Param::optional("items", ParamKind::StrList))
        .param(Param::optional("settings", ParamKind::Object))
        .param(Param::optional("min_rating", ParamKind::float_range(0.0, 10.0)))
        .param(Param::optional("username", ParamKind::Str).min_len(3))
    }

    fn bag(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_numeric_id_becomes_string() {
        let params = validate(&spec(), bag(json!({"library_id": 7}))).unwrap();
        assert_eq!(params.text("library_id"), Some("7"));
    }

    #[test]
    fn test_default_filled() {
        let params = validate(&spec(), bag(json!({"library_id": "1"}))).unwrap();
        assert_eq!(params.int("limit"), Some(100));
        assert!(!params.contains("force"));
    }

    #[test]
    fn test_unknown_params_dropped() {
        let params = validate(&spec(), bag(json!({"library_id": "1", "colour": "red"}))).unwrap();
        assert!(!params.contains("colour"));
    }

    #[test]
    fn test_empty_values_are_absent() {
        for empty in [json!(null), json!(""), json!([])] {
            let err = validate(&spec(), bag(json!({ "library_id": empty }))).unwrap_err();
            assert!(matches!(err, OperationError::MissingParameters { .. }));
        }
    }

    #[test]
    fn test_string_coercions() {
        let params = validate(
            &spec(),
            bag(json!({
                "library_id": "1",
                "limit": "25",
                "force": "yes",
                "sort_dir": "DESC",
                "items": "42",
                "settings": "{\"a\": 1}",
                "min_rating": "7.5"
            })),
        )
        .unwrap();
        assert_eq!(params.int("limit"), Some(25));
        assert_eq!(params.bool("force"), Some(true));
        assert_eq!(params.text("sort_dir"), Some("desc"));
        assert_eq!(params.list("items"), vec!["42".to_string()]);
        assert_eq!(params.object("settings").unwrap()["a"], json!(1));
        assert_eq!(params.float("min_rating"), Some(7.5));
    }

    #[test]
    fn test_out_of_range_is_invalid() {
        let err = validate(&spec(), bag(json!({"library_id": "1", "limit": 5000}))).unwrap_err();
        match err {
            OperationError::InvalidParameter { name, allowed, .. } => {
                assert_eq!(name, "limit");
                assert_eq!(allowed, vec!["between 1 and 1000".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_enum_lists_allowed() {
        let err =
            validate(&spec(), bag(json!({"library_id": "1", "sort_dir": "up"}))).unwrap_err();
        match err {
            OperationError::InvalidParameter { allowed, .. } => {
                assert_eq!(allowed, vec!["asc", "desc"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_min_len() {
        let err =
            validate(&spec(), bag(json!({"library_id": "1", "username": "ab"}))).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_missing_wins_over_invalid() {
        let err = validate(&spec(), bag(json!({"limit": "lots"}))).unwrap_err();
        assert!(matches!(err, OperationError::MissingParameters { .. }));
    }

    #[test]
    fn test_any_of_rule() {
        let spec = OperationSpec::new("find", "test", |_ctx| async {
            Ok::<_, OperationError>(OperationOutput::value(Value::Null))
        })
        .param(Param::optional("query", ParamKind::Str))
        .param(Param::optional("summary_contains", ParamKind::Str))
        .param(Param::optional("limit", ParamKind::INT).default(20))
        .any_of(&["query", "summary_contains"]);

        let err = validate(&spec, Map::new()).unwrap_err();
        match err {
            OperationError::MissingParameters { missing, any_of, .. } => {
                assert!(any_of);
                assert_eq!(missing, vec!["query", "summary_contains"]);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(validate(&spec, bag(json!({"summary_contains": "heist"}))).is_ok());
    }
}
