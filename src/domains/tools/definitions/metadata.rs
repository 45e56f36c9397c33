//! Metadata refresh, matching and analysis.

use futures::future::try_join_all;
use serde_json::json;

use super::done;
use crate::domains::tools::batch::run_batch;
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::error::OperationError;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

const MATCH_TYPES: &[&str] = &["movie", "show", "episode", "artist", "album", "track"];

pub fn router() -> DomainRouter {
    DomainRouter::new("metadata", "Refresh, match and analyze item metadata")
        .operation(
            OperationSpec::new("refresh", "Refresh one item or one library", refresh)
                .param(Param::optional("item_id", ParamKind::Str))
                .param(Param::optional("library_id", ParamKind::Str))
                .param(Param::optional("force", ParamKind::Bool).default(false))
                .any_of(&["item_id", "library_id"]),
        )
        .operation(
            OperationSpec::new("refresh_all", "Refresh every library", refresh_all)
                .param(Param::optional("force", ParamKind::Bool).default(false))
                .long_running(),
        )
        .operation(
            OperationSpec::new("fix_match", "Rematch an item to an agent result", fix_match)
                .param(Param::required("item_id", ParamKind::Str))
                .param(Param::required("match_id", ParamKind::Str).describe("Agent guid from 'match'"))
                .param(Param::required("media_type", ParamKind::Enum(MATCH_TYPES))),
        )
        .operation(
            OperationSpec::new("update", "Edit item fields", update)
                .param(Param::required("item_id", ParamKind::Str))
                .param(Param::required("metadata", ParamKind::Object)),
        )
        .operation(
            OperationSpec::new("analyze", "Find unmatched and incomplete items", analyze)
                .param(Param::optional("library_id", ParamKind::Str))
                .long_running(),
        )
        .operation(
            OperationSpec::new("match", "List match candidates for an item", match_candidates)
                .param(Param::required("item_id", ParamKind::Str)),
        )
        .operation(
            OperationSpec::new("organize", "Refresh unmatched items in a library", organize)
                .param(Param::required("library_id", ParamKind::Str))
                .param(Param::optional("dry_run", ParamKind::Bool).default(true)),
        )
}

async fn refresh(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let force = p.flag("force");
    match (p.text("item_id"), p.text("library_id")) {
        (Some(item), _) => {
            ctx.server.refresh_item(item, force).await?;
            done(format!("Metadata refresh started for item {}", item), json!({"item_id": item}))
        }
        (None, Some(library)) => {
            ctx.server.refresh_library(library, force).await?;
            done(
                format!("Metadata refresh started for library {}", library),
                json!({"library_id": library}),
            )
        }
        (None, None) => Err(OperationError::missing_any(&["item_id", "library_id"])),
    }
}

async fn refresh_all(ctx: HandlerContext) -> OperationResult {
    let force = ctx.params.flag("force");
    let libraries = ctx.server.list_libraries().await?;
    let server = &ctx.server;
    run_batch(
        libraries.into_iter().map(|l| l.id).collect(),
        |id| async move {
            server
                .refresh_library(&id, force)
                .await
                .map_err(OperationError::from)
        },
    )
    .await
    .into_output()
}

async fn fix_match(ctx: HandlerContext) -> OperationResult {
    let item = ctx
        .server
        .apply_match(ctx.params.require("item_id")?, ctx.params.require("match_id")?)
        .await?;
    OperationOutput::json(&item)
}

async fn update(ctx: HandlerContext) -> OperationResult {
    let fields = ctx.params.object("metadata").cloned().unwrap_or_default();
    let item = ctx.server.update_item(ctx.params.require("item_id")?, fields).await?;
    OperationOutput::json(&item)
}

async fn analyze(ctx: HandlerContext) -> OperationResult {
    let ids: Vec<String> = match ctx.params.text("library_id") {
        Some(id) => vec![id.to_string()],
        None => ctx
            .server
            .list_libraries()
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect(),
    };
    let server = &ctx.server;
    let reports = try_join_all(ids.iter().map(|id| server.analyze_library(id))).await?;
    OperationOutput::json(&reports)
}

async fn match_candidates(ctx: HandlerContext) -> OperationResult {
    let candidates = ctx.server.match_candidates(ctx.params.require("item_id")?).await?;
    OperationOutput::json(&candidates)
}

async fn organize(ctx: HandlerContext) -> OperationResult {
    let report = ctx
        .server
        .organize_library(ctx.params.require("library_id")?, ctx.params.flag("dry_run"))
        .await?;
    OperationOutput::json(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::classify::ErrorCode;
    use crate::domains::tools::definitions::testing::call;

    #[tokio::test]
    async fn test_refresh_needs_a_target() {
        let env = call(&router(), StubServer::new().into_arc(), "refresh", json!({"force": true})).await;
        assert_eq!(env.error_code(), Some(ErrorCode::MissingParameter));
        assert!(env.error().unwrap().contains("item_id"));
        assert!(env.error().unwrap().contains("library_id"));
    }

    #[tokio::test]
    async fn test_refresh_item() {
        let env = call(&router(), StubServer::new().into_arc(), "refresh", json!({"item_id": 100})).await;
        assert!(env.is_success());
        assert_eq!(env.data().unwrap()["item_id"], json!("100"));
    }

    #[tokio::test]
    async fn test_refresh_all_is_a_batch() {
        let env = call(&router(), StubServer::new().into_arc(), "refresh_all", json!({})).await;
        assert!(env.is_success());
        assert_eq!(env.data().unwrap()["succeeded"], json!(3));
    }

    #[tokio::test]
    async fn test_analyze_every_library() {
        let env = call(&router(), StubServer::new().into_arc(), "analyze", json!({})).await;
        assert_eq!(env.count(), Some(3));
    }

    #[tokio::test]
    async fn test_fix_match_validates_type() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "fix_match",
            json!({"item_id": "100", "match_id": "plex://movie/x", "media_type": "book"}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidParameter));
        assert!(env.suggestions().iter().any(|s| s.contains("movie")));
    }
}
