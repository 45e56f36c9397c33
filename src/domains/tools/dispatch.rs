//! Per-domain operation routing.
//!
//! A [`DomainRouter`] owns the operation table of one domain. Dispatching an
//! operation resolves the name, validates the parameters, runs the handler
//! under a deadline and the caller's cancellation token, and folds every
//! outcome into a [`ResponseEnvelope`].

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classify::{classify, closest};
use super::envelope::{EnvelopeBuilder, ResponseEnvelope};
use super::error::OperationError;
use super::params::validate;
use super::spec::{HandlerContext, OperationOutput, OperationSpec};
use crate::adapter::MediaServer;

/// Maximum number of "did you mean" candidates.
const MAX_CANDIDATES: usize = 5;

/// Deadlines applied to handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub default: Duration,
    pub long_running: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(60),
            long_running: Duration::from_secs(600),
        }
    }
}

/// Per-call state handed to a router.
#[derive(Clone)]
pub struct DispatchContext {
    pub server: Arc<dyn MediaServer>,
    pub cancel: CancellationToken,
    pub timeouts: Timeouts,
}

/// Summary of a domain for listings and help.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainInfo {
    pub name: &'static str,
    pub tool: String,
    pub description: &'static str,
    pub operations: Vec<Value>,
}

impl DomainInfo {
    pub fn operation_names(&self) -> Vec<&str> {
        self.operations
            .iter()
            .filter_map(|op| op.get("name").and_then(Value::as_str))
            .collect()
    }
}

/// Operation table of one domain.
#[derive(Debug, Clone)]
pub struct DomainRouter {
    name: &'static str,
    description: &'static str,
    operations: BTreeMap<&'static str, OperationSpec>,
}

impl DomainRouter {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            operations: BTreeMap::new(),
        }
    }

    /// Register an operation. The first registration of a name wins.
    pub fn operation(mut self, spec: OperationSpec) -> Self {
        if self.operations.contains_key(spec.name()) {
            warn!(
                "Duplicate operation '{}' in domain '{}' ignored",
                spec.name(),
                self.name
            );
            return self;
        }
        self.operations.insert(spec.name(), spec);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Tool name exposed to MCP clients.
    pub fn tool_name(&self) -> String {
        format!("plex_{}", self.name)
    }

    /// Operation names in sorted order.
    pub fn operation_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.operations.keys().copied()
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationSpec> {
        self.operations.values()
    }

    /// Look up an operation, with close matches on failure.
    pub fn resolve(&self, operation: &str) -> Result<&OperationSpec, OperationError> {
        let key = operation.trim().to_lowercase();
        self.operations
            .get(key.as_str())
            .ok_or_else(|| OperationError::UnknownOperation {
                domain: self.name.to_string(),
                operation: operation.to_string(),
                candidates: closest(&key, self.operation_names(), MAX_CANDIDATES),
            })
    }

    pub fn describe(&self) -> DomainInfo {
        DomainInfo {
            name: self.name,
            tool: self.tool_name(),
            description: self.description,
            operations: self.operations().map(|op| op.describe(self.name)).collect(),
        }
    }

    /// Run one operation and return its envelope. Never fails.
    pub async fn dispatch(
        &self,
        operation: &str,
        params: Map<String, Value>,
        ctx: DispatchContext,
    ) -> ResponseEnvelope {
        debug!("Dispatching {}.{}", self.name, operation);
        match self.run(operation, params, ctx).await {
            Ok(output) => {
                info!("{}.{} succeeded", self.name, operation);
                match output.count {
                    Some(count) => EnvelopeBuilder::success_with_count(operation, output.data, count),
                    None => EnvelopeBuilder::success(operation, output.data),
                }
            }
            Err(err) => {
                let failure = classify(&err);
                warn!(
                    "{}.{} failed [{}]: {}",
                    self.name, operation, failure.error_code, failure.message
                );
                EnvelopeBuilder::failure(operation, failure)
            }
        }
    }

    async fn run(
        &self,
        operation: &str,
        params: Map<String, Value>,
        ctx: DispatchContext,
    ) -> Result<OperationOutput, OperationError> {
        let spec = self.resolve(operation)?;
        let params = validate(spec, params).map_err(|e| e.with_example(spec.example(self.name)))?;

        let deadline = if spec.is_long_running() {
            ctx.timeouts.long_running
        } else {
            ctx.timeouts.default
        };

        // Losing the race below drops the handler future and its in-flight
        // adapter call with it.
        let handler_ctx = HandlerContext {
            params,
            server: ctx.server,
        };
        let work = AssertUnwindSafe(spec.invoke(handler_ctx)).catch_unwind();

        let result = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                Err(OperationError::cancelled("the request was cancelled by the caller"))
            }
            outcome = tokio::time::timeout(deadline, work) => match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(OperationError::internal(format!(
                    "handler for {}.{} panicked",
                    self.name, operation
                ))),
                Err(_) => Err(OperationError::cancelled(format!(
                    "deadline of {}s elapsed",
                    deadline.as_secs()
                ))),
            },
        };
        result.map_err(|e| e.with_example(spec.example(self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::classify::ErrorCode;
    use crate::domains::tools::params::{Param, ParamKind};
    use serde_json::json;

    fn router() -> DomainRouter {
        DomainRouter::new("library", "Libraries")
            .operation(OperationSpec::new("list", "List libraries", |ctx: HandlerContext| async move {
                let libraries = ctx.server.list_libraries().await?;
                OperationOutput::json(&libraries)
            }))
            .operation(
                OperationSpec::new("get", "Get a library", |ctx: HandlerContext| async move {
                    let library = ctx.server.get_library(ctx.params.require("library_id")?).await?;
                    OperationOutput::json(&library)
                })
                .param(Param::required("library_id", ParamKind::Str)),
            )
            .operation(OperationSpec::new("explode", "Panics", |_ctx: HandlerContext| async move {
                if true {
                    panic!("boom");
                }
                Ok::<_, OperationError>(OperationOutput::value(Value::Null))
            }))
    }

    fn ctx(server: StubServer) -> DispatchContext {
        DispatchContext {
            server: server.into_arc(),
            cancel: CancellationToken::new(),
            timeouts: Timeouts::default(),
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_list_counts_libraries() {
        let env = router().dispatch("list", Map::new(), ctx(StubServer::new())).await;
        assert!(env.is_success());
        assert_eq!(env.count(), Some(3));
    }

    #[tokio::test]
    async fn test_missing_parameter_includes_example() {
        let env = router().dispatch("get", Map::new(), ctx(StubServer::new())).await;
        assert!(!env.is_success());
        assert_eq!(env.error_code(), Some(ErrorCode::MissingParameter));
        assert!(env.error().unwrap().contains("library_id"));
        assert!(env.suggestions().iter().any(|s| s.contains("plex_library(")));
    }

    #[tokio::test]
    async fn test_not_found() {
        let env = router()
            .dispatch("get", args(json!({"library_id": "99"})), ctx(StubServer::new()))
            .await;
        assert_eq!(env.error_code(), Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_unknown_operation_suggests() {
        let env = router().dispatch("lsit", Map::new(), ctx(StubServer::new())).await;
        assert_eq!(env.error_code(), Some(ErrorCode::UnknownOperation));
        assert!(env.suggestions()[0].contains("'list'"));
    }

    #[tokio::test]
    async fn test_operation_names_case_insensitive() {
        let env = router().dispatch("LIST", Map::new(), ctx(StubServer::new())).await;
        assert!(env.is_success());
    }

    #[tokio::test]
    async fn test_panic_is_internal() {
        let env = router().dispatch("explode", Map::new(), ctx(StubServer::new())).await;
        assert_eq!(env.error_code(), Some(ErrorCode::InternalError));
        assert!(!env.error().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_deadline_cancels() {
        let mut ctx = ctx(StubServer::slow(Duration::from_secs(5)));
        ctx.timeouts.default = Duration::from_millis(20);
        let env = router().dispatch("list", Map::new(), ctx).await;
        assert_eq!(env.error_code(), Some(ErrorCode::Cancelled));
    }

    #[tokio::test]
    async fn test_caller_cancellation() {
        let ctx = ctx(StubServer::slow(Duration::from_secs(5)));
        let token = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let env = router().dispatch("list", Map::new(), ctx).await;
        assert_eq!(env.error_code(), Some(ErrorCode::Cancelled));
    }

    #[test]
    fn test_duplicate_operation_keeps_first() {
        let router = router().operation(OperationSpec::new(
            "list",
            "Shadow",
            |_ctx: HandlerContext| async move {
                Ok::<_, OperationError>(OperationOutput::value(Value::Null))
            },
        ));
        assert_eq!(router.resolve("list").unwrap().summary(), "List libraries");
    }

    #[test]
    fn test_describe() {
        let info = router().describe();
        assert_eq!(info.tool, "plex_library");
        assert_eq!(info.operation_names(), vec!["explode", "get", "list"]);
    }
}
