//! Server status, health and maintenance.

use serde_json::json;
use tracing::info;

use crate::adapter::MaintenanceTask;
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::error::OperationError;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

pub fn router() -> DomainRouter {
    DomainRouter::new("server", "Server status, health and maintenance")
        .operation(OperationSpec::new("status", "Server identity and load", status))
        .operation(OperationSpec::new("info", "Status plus library overview", info))
        .operation(OperationSpec::new("health", "Probe server health", health))
        .operation(
            OperationSpec::new("maintenance", "Run a maintenance task", maintenance)
                .param(Param::required(
                    "maintenance_operation",
                    ParamKind::Enum(MaintenanceTask::NAMES),
                ))
                .param(Param::optional("options", ParamKind::Object))
                .long_running(),
        )
        .operation(OperationSpec::new("restart", "Restart the server", restart))
        .operation(OperationSpec::new("update", "Install a server update", update))
}

pub(super) async fn status(ctx: HandlerContext) -> OperationResult {
    OperationOutput::json(&ctx.server.server_status().await?)
}

pub(super) async fn info(ctx: HandlerContext) -> OperationResult {
    let status = ctx.server.server_status().await?;
    let libraries = ctx.server.list_libraries().await?;
    let overview: Vec<_> = libraries
        .iter()
        .map(|l| {
            json!({
                "id": l.id,
                "title": l.title,
                "type": l.library_type,
                "items": l.item_count,
            })
        })
        .collect();
    Ok(OperationOutput::value(json!({
        "server": serde_json::to_value(&status)?,
        "library_count": libraries.len(),
        "libraries": overview,
    })))
}

async fn health(ctx: HandlerContext) -> OperationResult {
    OperationOutput::json(&ctx.server.health().await?)
}

async fn maintenance(ctx: HandlerContext) -> OperationResult {
    let name = ctx.params.require("maintenance_operation")?;
    let task = MaintenanceTask::parse(name).ok_or_else(|| {
        OperationError::invalid_choice(
            "maintenance_operation",
            format!("'{}' is not a maintenance task", name),
            MaintenanceTask::NAMES,
        )
    })?;
    let options = ctx.params.object("options").cloned().unwrap_or_default();
    info!("Running maintenance task {}", task.name());
    OperationOutput::json(&ctx.server.run_maintenance(task, options).await?)
}

async fn restart(ctx: HandlerContext) -> OperationResult {
    ctx.server.restart_server().await?;
    super::done("Server restart requested", json!({}))
}

async fn update(ctx: HandlerContext) -> OperationResult {
    ctx.server.update_server().await?;
    super::done("Server update requested", json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::classify::ErrorCode;
    use crate::domains::tools::definitions::testing::call;

    #[tokio::test]
    async fn test_maintenance_optimize() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "maintenance",
            json!({"maintenance_operation": "optimize"}),
        )
        .await;
        assert!(env.is_success());
        assert_eq!(env.data().unwrap()["task"], json!("optimize"));
    }

    #[tokio::test]
    async fn test_maintenance_unknown_task() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "maintenance",
            json!({"maintenance_operation": "defrag"}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidParameter));
    }

    #[tokio::test]
    async fn test_restart_not_supported() {
        let env = call(&router(), StubServer::new().into_arc(), "restart", json!({})).await;
        assert_eq!(env.error_code(), Some(ErrorCode::NotSupported));
    }

    #[tokio::test]
    async fn test_info_includes_libraries() {
        let env = call(&router(), StubServer::new().into_arc(), "info", json!({})).await;
        assert_eq!(env.data().unwrap()["library_count"], json!(3));
    }
}
