//! Tool Router - builds the rmcp ToolRouter from the registry.
//!
//! One route per domain. Every route forwards the raw arguments and the
//! request's cancellation token to [`ToolRegistry::call_tool`], so STDIO and
//! HTTP share the same dispatch path.

use std::sync::Arc;

use futures::FutureExt;
use rmcp::handler::server::tool::{ToolCallContext, ToolRoute, ToolRouter};

use super::registry::{ToolRegistry, to_tool};

/// Build the tool router with every registered domain.
pub fn build_tool_router<S>(registry: Arc<ToolRegistry>) -> ToolRouter<S>
where
    S: Send + Sync + 'static,
{
    let mut router = ToolRouter::new();
    for domain in registry.domains() {
        router = router.with_route(create_route(registry.clone(), to_tool(domain)));
    }
    router
}

fn create_route<S>(registry: Arc<ToolRegistry>, tool: rmcp::model::Tool) -> ToolRoute<S>
where
    S: Send + Sync + 'static,
{
    let tool_name = tool.name.to_string();
    ToolRoute::new_dyn(tool, move |ctx: ToolCallContext<'_, S>| {
        let args = ctx.arguments.clone().unwrap_or_default();
        let cancel = ctx.request_context.ct.clone();
        let registry = registry.clone();
        let tool_name = tool_name.clone();
        async move {
            let envelope = registry.call_tool(&tool_name, args, cancel).await;
            Ok(envelope.into_call_result())
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::dispatch::Timeouts;

    struct TestServer {}

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::new(StubServer::new().into_arc(), Timeouts::default()))
    }

    #[test]
    fn test_build_router() {
        let router: ToolRouter<TestServer> = build_tool_router(registry());
        let tools = router.list_all();
        assert_eq!(tools.len(), 15);

        let names: Vec<_> = tools.iter().map(|t| t.name.as_ref()).collect();
        assert!(names.contains(&"plex_library"));
        assert!(names.contains(&"plex_help"));
        assert!(names.contains(&"plex_streaming"));
    }

    #[test]
    fn test_registry_matches_router() {
        let registry = registry();
        let registry_tools = registry.tools();

        let router: ToolRouter<TestServer> = build_tool_router(registry);
        let router_tools = router.list_all();

        assert_eq!(registry_tools.len(), router_tools.len());
        for tool in registry_tools {
            assert!(router_tools.iter().any(|t| t.name == tool.name));
        }
    }
}
