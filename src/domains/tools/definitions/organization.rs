//! Library housekeeping: analysis, cleanup and fixing unmatched items.

use serde_json::{Map, json};

use super::done;
use crate::adapter::MaintenanceTask;
use crate::domains::tools::batch::run_batch;
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::error::OperationError;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

pub fn router() -> DomainRouter {
    DomainRouter::new("organization", "Analyze and tidy up libraries")
        .operation(
            OperationSpec::new("organize", "Find and refresh unmatched items", organize)
                .param(Param::required("library_id", ParamKind::Str))
                .param(Param::optional("dry_run", ParamKind::Bool).default(true)),
        )
        .operation(
            OperationSpec::new("analyze", "Report unmatched and incomplete items", analyze)
                .param(Param::required("library_id", ParamKind::Str))
                .long_running(),
        )
        .operation(
            OperationSpec::new("clean_bundles", "Delete unused metadata bundles", clean_bundles)
                .param(Param::optional("library_id", ParamKind::Str))
                .long_running(),
        )
        .operation(
            OperationSpec::new("optimize_database", "Optimize the server database", optimize_database)
                .long_running(),
        )
        .operation(
            OperationSpec::new("fix_issues", "Refresh every unmatched item", fix_issues)
                .param(Param::required("library_id", ParamKind::Str))
                .long_running(),
        )
}

async fn organize(ctx: HandlerContext) -> OperationResult {
    let report = ctx
        .server
        .organize_library(ctx.params.require("library_id")?, ctx.params.flag("dry_run"))
        .await?;
    OperationOutput::json(&report)
}

async fn analyze(ctx: HandlerContext) -> OperationResult {
    let analysis = ctx.server.analyze_library(ctx.params.require("library_id")?).await?;
    let mut recommendations = Vec::new();
    if !analysis.unmatched.is_empty() {
        recommendations.push(format!(
            "Run fix_issues to refresh {} unmatched item(s)",
            analysis.unmatched.len()
        ));
    }
    if analysis.missing_summary > 0 || analysis.missing_year > 0 {
        recommendations.push("Refresh metadata to fill missing summaries and years".to_string());
    }
    Ok(OperationOutput::value(json!({
        "analysis": serde_json::to_value(&analysis)?,
        "recommendations": recommendations,
    })))
}

async fn clean_bundles(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.text("library_id");
    ctx.server.clean_bundles(id).await?;
    done("Unused bundles cleaned", json!({"library_id": id}))
}

async fn optimize_database(ctx: HandlerContext) -> OperationResult {
    let report = ctx
        .server
        .run_maintenance(MaintenanceTask::Optimize, Map::new())
        .await?;
    OperationOutput::json(&report)
}

async fn fix_issues(ctx: HandlerContext) -> OperationResult {
    let analysis = ctx.server.analyze_library(ctx.params.require("library_id")?).await?;
    let server = &ctx.server;
    run_batch(analysis.unmatched, |item| async move {
        server
            .refresh_item(&item, true)
            .await
            .map_err(OperationError::from)
    })
    .await
    .into_output()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::classify::ErrorCode;
    use crate::domains::tools::definitions::testing::call;

    #[tokio::test]
    async fn test_fix_issues_refreshes_unmatched() {
        let env = call(&router(), StubServer::new().into_arc(), "fix_issues", json!({"library_id": "1"})).await;
        assert!(env.is_success());
        let data = env.data().unwrap();
        assert_eq!(data["requested"], json!(1));
        assert_eq!(data["items"][0]["item"], json!("101"));
    }

    #[tokio::test]
    async fn test_analyze_recommends_fix() {
        let env = call(&router(), StubServer::new().into_arc(), "analyze", json!({"library_id": "1"})).await;
        let recs = env.data().unwrap()["recommendations"].as_array().unwrap().clone();
        assert!(recs[0].as_str().unwrap().contains("fix_issues"));
    }

    #[tokio::test]
    async fn test_optimize_database() {
        let env = call(&router(), StubServer::new().into_arc(), "optimize_database", json!({})).await;
        assert!(env.is_success());
    }

    #[tokio::test]
    async fn test_organize_requires_library() {
        let env = call(&router(), StubServer::new().into_arc(), "organize", json!({})).await;
        assert_eq!(env.error_code(), Some(ErrorCode::MissingParameter));
    }
}
