//! MCP Server implementation and lifecycle management.
//!
//! This module contains the main server handler that implements the MCP
//! protocol by delegating tool calls to the [`ToolRegistry`].
//!
//! ## Tool Architecture
//!
//! Each functional domain is one tool (`plex_<domain>`) declared in
//! `domains/tools/definitions/`. The ToolRouter is built from the registry
//! in `domains/tools/router.rs`.
//! **Adding an operation does NOT require modifying this file!**

use rmcp::{ServerHandler, handler::server::tool::ToolRouter, model::*, tool_handler};
use std::sync::Arc;
use tracing::info;

use super::config::Config;
use super::error::Error as CoreError;
use crate::adapter::{MediaServer, PlexClient};
use crate::domains::tools::{ToolRegistry, build_tool_router};

#[cfg(feature = "http")]
use crate::domains::tools::ResponseEnvelope;
#[cfg(feature = "http")]
use tokio_util::sync::CancellationToken;

const INSTRUCTIONS: &str = "Manage a Plex Media Server. Every tool takes an 'operation' argument; \
     call plex_help with operation='help' to discover tools, operations and their parameters.";

/// The main MCP server handler.
///
/// This struct implements the `ServerHandler` trait from rmcp. Tool calls go
/// through the router; the HTTP transport uses the registry directly.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Domain routers shared by every transport.
    registry: Arc<ToolRegistry>,

    /// Tool router for handling tool calls.
    tool_router: ToolRouter<Self>,
}

impl McpServer {
    /// Create a server backed by the Plex Media Server named in `config`.
    pub fn new(config: Config) -> crate::core::Result<Self> {
        let url = &config.plex.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CoreError::config(format!(
                "PLEX_URL must start with http:// or https://, got '{}'",
                url
            )));
        }
        let client = PlexClient::new(
            config.plex.url.clone(),
            config.plex.token.clone(),
            config.plex.timeout(),
        )?;
        Ok(Self::with_media_server(config, Arc::new(client)))
    }

    /// Create a server over any media server backend.
    pub fn with_media_server(config: Config, media: Arc<dyn MediaServer>) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(ToolRegistry::new(media, config.dispatch.timeouts()));
        info!("Registered {} tools", registry.domain_names().len());

        Self {
            tool_router: build_tool_router::<Self>(registry.clone()),
            registry,
            config,
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn instructions(&self) -> &'static str {
        INSTRUCTIONS
    }

    // ========================================================================
    // HTTP Transport Support Methods
    // ========================================================================

    /// List all available tools (for HTTP transport).
    pub fn list_tools(&self) -> Vec<serde_json::Value> {
        self.tool_router
            .list_all()
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema,
                    "outputSchema": t.output_schema,
                })
            })
            .collect()
    }

    /// Call a tool by name (for HTTP transport).
    #[cfg(feature = "http")]
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
        cancel: CancellationToken,
    ) -> ResponseEnvelope {
        self.registry.call_tool(name, arguments, cancel).await
    }
}

/// ServerHandler implementation with tool_handler macro for automatic tool routing.
#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.config.server.name.clone(),
                version: self.config.server.version.clone(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;

    #[test]
    fn test_server_lists_every_domain() {
        let server = McpServer::with_media_server(Config::default(), StubServer::new().into_arc());
        let tools = server.list_tools();
        assert_eq!(tools.len(), server.registry().domain_names().len());
        assert!(tools.iter().all(|t| t["name"].as_str().unwrap().starts_with("plex_")));
    }

    #[test]
    fn test_info_advertises_tools_only() {
        let server = McpServer::with_media_server(Config::default(), StubServer::new().into_arc());
        let info = server.get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_none());
        assert!(info.capabilities.prompts.is_none());
        assert_eq!(info.server_info.name, "plex-mcp-server");
    }

    #[test]
    fn test_rejects_url_without_scheme() {
        let mut config = Config::default();
        config.plex.url = "plex.lan:32400".to_string();
        assert!(matches!(McpServer::new(config), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_registry_answers_help() {
        let server = McpServer::with_media_server(Config::default(), StubServer::new().into_arc());
        let envelope = tokio_test::block_on(server.registry().call(
            "plex_help",
            "help",
            serde_json::Map::new(),
            tokio_util::sync::CancellationToken::new(),
        ));
        assert!(envelope.is_success());
        assert!(envelope.data().unwrap()["tools"].as_array().unwrap().len() > 1);
    }
}
