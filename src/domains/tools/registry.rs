//! Tool Registry - central registration and dispatch for all domains.
//!
//! This module provides:
//! - The table of domain routers, one MCP tool per domain
//! - Dispatch of `(domain, operation, params)` calls for every transport
//! - Tool metadata for listing, with input schemas generated from the
//!   operation specs

use std::collections::BTreeMap;
use std::sync::Arc;

use rmcp::handler::server::tool::cached_schema_for_type;
use rmcp::model::{JsonObject, Tool};
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use super::classify::classify;
use super::definitions::{
    collections, help, integration, library, media, metadata, organization, performance,
    playlist, quality, reporting, search, server, streaming, user,
};
use super::dispatch::{DispatchContext, DomainRouter, Timeouts};
use super::envelope::{EnvelopeBuilder, ResponseEnvelope};
use super::error::OperationError;
use super::params::ParamKind;
use crate::adapter::MediaServer;

/// Prefix shared by every tool name.
const TOOL_PREFIX: &str = "plex_";

/// Every domain except help, which is derived from these.
fn domain_routers() -> Vec<DomainRouter> {
    vec![
        library::router(),
        media::router(),
        search::router(),
        playlist::router(),
        collections::router(),
        metadata::router(),
        quality::router(),
        server::router(),
        performance::router(),
        streaming::router(),
        user::router(),
        reporting::router(),
        organization::router(),
        integration::router(),
    ]
}

// ============================================================================
// Tool Registry
// ============================================================================

/// Tool registry - owns every domain router and the media server handle.
///
/// Built once at startup and shared read-only between transports.
pub struct ToolRegistry {
    domains: BTreeMap<&'static str, DomainRouter>,
    server: Arc<dyn MediaServer>,
    timeouts: Timeouts,
}

impl ToolRegistry {
    /// Create the registry with every domain.
    pub fn new(server: Arc<dyn MediaServer>, timeouts: Timeouts) -> Self {
        Self::with_routers(server, timeouts, domain_routers())
    }

    /// Create a registry from the given routers. The help domain is added
    /// last so that it can describe every other domain and itself.
    pub fn with_routers(
        server: Arc<dyn MediaServer>,
        timeouts: Timeouts,
        routers: Vec<DomainRouter>,
    ) -> Self {
        let mut domains = BTreeMap::new();
        for router in routers {
            if domains.contains_key(router.name()) {
                warn!("Duplicate domain '{}' ignored", router.name());
                continue;
            }
            domains.insert(router.name(), router);
        }

        let mut catalog: Vec<_> = domains.values().map(DomainRouter::describe).collect();
        catalog.push(help::router().describe());
        let help = help::router_with(Arc::new(help::Catalog::new(catalog)));
        domains.insert(help.name(), help);

        Self {
            domains,
            server,
            timeouts,
        }
    }

    /// Domain names in sorted order.
    pub fn domain_names(&self) -> Vec<&'static str> {
        self.domains.keys().copied().collect()
    }

    pub fn domains(&self) -> impl Iterator<Item = &DomainRouter> {
        self.domains.values()
    }

    /// Look up a domain by bare name (`library`) or tool name (`plex_library`).
    pub fn resolve(&self, domain: &str) -> Result<&DomainRouter, OperationError> {
        let key = domain.trim().to_lowercase();
        let key = key.strip_prefix(TOOL_PREFIX).unwrap_or(key.as_str());
        self.domains
            .get(key)
            .ok_or_else(|| OperationError::UnknownDomain {
                domain: domain.to_string(),
                available: self.domain_names().iter().map(|d| d.to_string()).collect(),
            })
    }

    /// Dispatch one operation. Always returns an envelope.
    #[instrument(skip(self, params, cancel))]
    pub async fn call(
        &self,
        domain: &str,
        operation: &str,
        params: Map<String, Value>,
        cancel: CancellationToken,
    ) -> ResponseEnvelope {
        let router = match self.resolve(domain) {
            Ok(router) => router,
            Err(err) => {
                let failure = classify(&err);
                warn!("{} [{}]", failure.message, failure.error_code);
                return EnvelopeBuilder::failure(operation, failure);
            }
        };
        let ctx = DispatchContext {
            server: self.server.clone(),
            cancel,
            timeouts: self.timeouts,
        };
        router.dispatch(operation, params, ctx).await
    }

    /// Dispatch an MCP tool call: the tool picks the domain and the
    /// `operation` argument picks the operation.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        mut arguments: Map<String, Value>,
        cancel: CancellationToken,
    ) -> ResponseEnvelope {
        let operation = match arguments.remove("operation") {
            Some(Value::String(op)) if !op.trim().is_empty() => op,
            Some(Value::String(_)) | None => {
                let err = OperationError::missing("operation")
                    .with_example(format!("{}(operation=\"help\")", tool_name));
                return EnvelopeBuilder::failure("", classify(&err));
            }
            Some(other) => {
                let err = OperationError::invalid("operation", format!("expected a name, got {}", other));
                return EnvelopeBuilder::failure("", classify(&err));
            }
        };
        self.call(tool_name, &operation, arguments, cancel).await
    }

    /// Get all tools as Tool models (metadata).
    ///
    /// This is the single source of truth for all available tools.
    /// Both HTTP and STDIO transports use this to get tool metadata.
    pub fn tools(&self) -> Vec<Tool> {
        self.domains.values().map(to_tool).collect()
    }
}

/// The MCP tool describing one domain.
pub fn to_tool(router: &DomainRouter) -> Tool {
    let operations: Vec<&str> = router.operation_names().collect();
    Tool {
        name: router.tool_name().into(),
        description: Some(
            format!(
                "{}. Operations: {}. Use plex_help(operation=\"tool_info\", tool_name=\"{}\") for parameters.",
                router.description(),
                operations.join(", "),
                router.tool_name()
            )
            .into(),
        ),
        input_schema: input_schema(router),
        output_schema: Some(cached_schema_for_type::<ResponseEnvelope>()),
        annotations: None,
        icons: None,
        meta: None,
        title: None,
    }
}

/// Input schema: the `operation` selector plus the union of every
/// operation's parameters. Per-operation requirements are checked at dispatch.
fn input_schema(router: &DomainRouter) -> Arc<JsonObject> {
    let mut properties = Map::new();
    properties.insert(
        "operation".into(),
        json!({
            "type": "string",
            "enum": router.operation_names().collect::<Vec<_>>(),
            "description": "Operation to run",
        }),
    );

    for param in router.operations().flat_map(|op| op.params()) {
        if let Some(existing) = properties.get_mut(param.name) {
            // Same name with a different type in another operation: leave it untyped.
            if existing.get("type").and_then(Value::as_str) != Some(param.kind.schema_type()) {
                if let Some(obj) = existing.as_object_mut() {
                    obj.remove("type");
                }
            }
            continue;
        }
        let mut property = Map::new();
        if !matches!(param.kind, ParamKind::Any) {
            property.insert("type".into(), json!(param.kind.schema_type()));
        }
        if matches!(param.kind, ParamKind::StrList) {
            property.insert("items".into(), json!({"type": "string"}));
        }
        let mut description = param.description.to_string();
        if let ParamKind::Enum(values) = param.kind {
            if !description.is_empty() {
                description.push_str(". ");
            }
            description.push_str(&format!("One of: {}", values.join(", ")));
        }
        if !description.is_empty() {
            property.insert("description".into(), json!(description));
        }
        properties.insert(param.name.into(), Value::Object(property));
    }

    let mut schema = JsonObject::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    schema.insert("required".into(), json!(["operation"]));
    Arc::new(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterError;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::classify::ErrorCode;

    fn registry(server: StubServer) -> ToolRegistry {
        ToolRegistry::new(server.into_arc(), Timeouts::default())
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    async fn call(reg: &ToolRegistry, domain: &str, operation: &str, params: Value) -> ResponseEnvelope {
        reg.call(domain, operation, args(params), CancellationToken::new()).await
    }

    #[test]
    fn test_registry_domain_names() {
        let names = registry(StubServer::new()).domain_names();
        assert_eq!(names.len(), 15);
        for name in ["library", "media", "search", "help", "integration", "user"] {
            assert!(names.contains(&name));
        }
    }

    #[tokio::test]
    async fn test_library_get_without_id() {
        let env = call(&registry(StubServer::new()), "library", "get", json!({})).await;
        assert!(!env.is_success());
        assert_eq!(env.error_code(), Some(ErrorCode::MissingParameter));
        assert!(env.error().unwrap().contains("library_id"));
        assert!(!env.suggestions().is_empty());
    }

    #[tokio::test]
    async fn test_search_without_query() {
        let env = call(&registry(StubServer::new()), "search", "search", json!({})).await;
        assert!(!env.is_success());
        assert!(env.error().unwrap().contains("query"));
    }

    #[tokio::test]
    async fn test_library_list_counts() {
        let env = call(&registry(StubServer::new()), "library", "list", json!({})).await;
        assert!(env.is_success());
        assert_eq!(env.count(), Some(3));
    }

    #[tokio::test]
    async fn test_server_maintenance() {
        let env = call(
            &registry(StubServer::new()),
            "server",
            "maintenance",
            json!({"maintenance_operation": "optimize"}),
        )
        .await;
        assert!(env.is_success());
    }

    #[tokio::test]
    async fn test_adapter_not_found() {
        let server = StubServer::failing(AdapterError::NotFound {
            entity: "library".into(),
            id: "9".into(),
        });
        let env = call(&registry(server), "library", "get", json!({"library_id": "9"})).await;
        assert_eq!(env.error_code(), Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_unknown_domain() {
        let env = call(&registry(StubServer::new()), "music", "list", json!({})).await;
        assert_eq!(env.error_code(), Some(ErrorCode::UnknownDomain));
        assert!(env.suggestions()[0].contains("library"));
    }

    #[tokio::test]
    async fn test_identical_calls_identical_envelopes() {
        let reg = registry(StubServer::new());
        let a = call(&reg, "media", "browse", json!({"library_id": "1"})).await;
        let b = call(&reg, "media", "browse", json!({"library_id": "1"})).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_call_tool_uses_operation_argument() {
        let reg = registry(StubServer::new());
        let env = reg
            .call_tool("plex_library", args(json!({"operation": "list"})), CancellationToken::new())
            .await;
        assert_eq!(env.count(), Some(3));

        let env = reg
            .call_tool("plex_library", args(json!({})), CancellationToken::new())
            .await;
        assert_eq!(env.error_code(), Some(ErrorCode::MissingParameter));
        assert!(env.error().unwrap().contains("operation"));
    }

    #[tokio::test]
    async fn test_help_reflects_specs() {
        let reg = registry(StubServer::new());
        let env = call(&reg, "help", "tool_info", json!({"tool_name": "plex_playlist"})).await;
        let listed: Vec<&str> = env.data().unwrap()["operations"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|op| op["name"].as_str())
            .collect();
        let declared: Vec<&str> = reg.resolve("playlist").unwrap().operation_names().collect();
        assert_eq!(listed, declared);

        let env = call(&reg, "help", "list_tools", json!({})).await;
        assert_eq!(env.count(), Some(15));
    }

    #[test]
    fn test_tools_schema() {
        let tools = registry(StubServer::new()).tools();
        assert_eq!(tools.len(), 15);
        let library = tools.iter().find(|t| t.name == "plex_library").unwrap();
        assert_eq!(library.input_schema["required"], json!(["operation"]));
        let props = library.input_schema["properties"].as_object().unwrap();
        assert!(props.contains_key("library_id"));
        assert!(props["operation"]["enum"].as_array().unwrap().contains(&json!("scan")));
    }

    #[tokio::test]
    async fn test_every_domain_rejects_unknown_operation() {
        let reg = registry(StubServer::new());
        for router in reg.domains() {
            let env = call(&reg, router.name(), "no_such_operation", json!({})).await;
            assert_eq!(
                env.error_code(),
                Some(ErrorCode::UnknownOperation),
                "domain {}",
                router.name()
            );
            assert!(!env.suggestions().is_empty(), "domain {}", router.name());
        }
    }

    #[tokio::test]
    async fn test_every_required_parameter_is_enforced() {
        let reg = registry(StubServer::new());
        let mut checked = 0;
        for router in reg.domains() {
            for spec in router.operations() {
                let required: Vec<&str> = spec.required().map(|p| p.name).collect();
                for omitted in &required {
                    // Fill the others with placeholders; a missing name wins over bad values.
                    let params: Map<String, Value> = required
                        .iter()
                        .filter(|name| *name != omitted)
                        .map(|name| (name.to_string(), json!("1")))
                        .collect();
                    let env = reg
                        .call(router.name(), spec.name(), params, CancellationToken::new())
                        .await;
                    let context = format!("{}.{} without {}", router.name(), spec.name(), omitted);
                    assert_eq!(env.error_code(), Some(ErrorCode::MissingParameter), "{}", context);
                    assert!(env.error().unwrap().contains(omitted), "{}", context);
                    assert!(!env.suggestions().is_empty(), "{}", context);
                    checked += 1;
                }
            }
        }
        assert!(checked > 50);
    }
}
