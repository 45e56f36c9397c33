//! Self-describing help built from the registered operation tables.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::domains::tools::dispatch::{DomainInfo, DomainRouter};
use crate::domains::tools::error::OperationError;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec, with_state};

/// Descriptions of every domain, help included.
#[derive(Debug, Default)]
pub struct Catalog {
    domains: Vec<DomainInfo>,
}

impl Catalog {
    pub fn new(domains: Vec<DomainInfo>) -> Self {
        Self { domains }
    }

    /// Find a domain by bare name or tool name.
    fn find(&self, name: &str) -> Result<&DomainInfo, OperationError> {
        let key = name.trim().to_lowercase();
        let key = key.strip_prefix("plex_").unwrap_or(key.as_str());
        self.domains
            .iter()
            .find(|d| d.name == key)
            .ok_or_else(|| OperationError::UnknownDomain {
                domain: name.to_string(),
                available: self.domains.iter().map(|d| d.tool.clone()).collect(),
            })
    }

    /// One domain when `name` is given, all of them otherwise.
    fn select(&self, name: Option<&str>) -> Result<Vec<&DomainInfo>, OperationError> {
        match name {
            Some(name) => Ok(vec![self.find(name)?]),
            None => Ok(self.domains.iter().collect()),
        }
    }
}

pub fn router() -> DomainRouter {
    router_with(Arc::new(Catalog::default()))
}

pub fn router_with(catalog: Arc<Catalog>) -> DomainRouter {
    DomainRouter::new("help", "Discover the available tools and operations")
        .operation(OperationSpec::new("help", "How to call these tools", with_state(&catalog, overview)))
        .operation(
            OperationSpec::new("list_tools", "Every tool and its operations", with_state(&catalog, list_tools))
                .param(Param::optional("category", ParamKind::Str).describe("Domain or tool name")),
        )
        .operation(
            OperationSpec::new("tool_info", "Parameters of every operation of a tool", with_state(&catalog, tool_info))
                .param(Param::required("tool_name", ParamKind::Str)),
        )
        .operation(
            OperationSpec::new("examples", "Example calls", with_state(&catalog, examples))
                .param(Param::optional("tool_name", ParamKind::Str)),
        )
}

async fn overview(_ctx: HandlerContext, catalog: Arc<Catalog>) -> OperationResult {
    let tools: Vec<Value> = catalog
        .domains
        .iter()
        .map(|d| json!({"tool": d.tool, "description": d.description}))
        .collect();
    Ok(OperationOutput::value(json!({
        "usage": "Call a tool with an 'operation' argument plus that operation's parameters",
        "example": "plex_library(operation=\"list\")",
        "tools": tools,
        "next_steps": [
            "plex_help(operation=\"list_tools\") lists every operation",
            "plex_help(operation=\"tool_info\", tool_name=\"plex_library\") shows parameters",
        ],
    })))
}

async fn list_tools(ctx: HandlerContext, catalog: Arc<Catalog>) -> OperationResult {
    let listing: Vec<Value> = catalog
        .select(ctx.params.text("category"))?
        .into_iter()
        .map(|d| {
            json!({
                "tool": d.tool,
                "description": d.description,
                "operations": d.operation_names(),
            })
        })
        .collect();
    Ok(OperationOutput::value(Value::Array(listing)))
}

async fn tool_info(ctx: HandlerContext, catalog: Arc<Catalog>) -> OperationResult {
    OperationOutput::json(catalog.find(ctx.params.require("tool_name")?)?)
}

async fn examples(ctx: HandlerContext, catalog: Arc<Catalog>) -> OperationResult {
    let calls: Vec<Value> = catalog
        .select(ctx.params.text("tool_name"))?
        .into_iter()
        .flat_map(|d| d.operations.iter())
        .filter_map(|op| op.get("example").cloned())
        .collect();
    Ok(OperationOutput::value(Value::Array(calls)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::classify::ErrorCode;
    use crate::domains::tools::definitions::{library, testing::call};

    fn catalog_router() -> DomainRouter {
        let domains = vec![library::router().describe(), router().describe()];
        router_with(Arc::new(Catalog::new(domains)))
    }

    #[tokio::test]
    async fn test_tool_info_accepts_either_name() {
        let router = catalog_router();
        for name in ["plex_library", "library"] {
            let env = call(&router, StubServer::new().into_arc(), "tool_info", json!({"tool_name": name})).await;
            assert!(env.is_success());
            assert_eq!(env.data().unwrap()["tool"], json!("plex_library"));
        }
    }

    #[tokio::test]
    async fn test_help_describes_itself() {
        let env = call(
            &catalog_router(),
            StubServer::new().into_arc(),
            "list_tools",
            json!({"category": "help"}),
        )
        .await;
        let ops = env.data().unwrap()[0]["operations"].clone();
        assert_eq!(ops, json!(["examples", "help", "list_tools", "tool_info"]));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let env = call(
            &catalog_router(),
            StubServer::new().into_arc(),
            "tool_info",
            json!({"tool_name": "plex_music"}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::UnknownDomain));
    }

    #[tokio::test]
    async fn test_examples_for_one_tool() {
        let env = call(
            &catalog_router(),
            StubServer::new().into_arc(),
            "examples",
            json!({"tool_name": "library"}),
        )
        .await;
        let count = library::router().operation_names().count();
        assert_eq!(env.count(), Some(count));
        assert!(env.data().unwrap()[0].as_str().unwrap().starts_with("plex_library("));
    }
}
