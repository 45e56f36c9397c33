//! Browsing and editing individual media items.

use crate::adapter::SearchQuery;
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

use super::page;

pub const MEDIA_TYPES: &[&str] = &[
    "movie", "show", "season", "episode", "artist", "album", "track", "photo",
];

fn limit() -> Param {
    Param::optional("limit", ParamKind::int_range(1, 1000)).default(100)
}

pub fn router() -> DomainRouter {
    DomainRouter::new("media", "Browse, search and edit media items")
        .operation(
            OperationSpec::new("browse", "Page through a library's items", browse)
                .param(Param::required("library_id", ParamKind::Str))
                .param(limit())
                .param(Param::optional("offset", ParamKind::NON_NEGATIVE).default(0)),
        )
        .operation(
            OperationSpec::new("search", "Search items with simple filters", search)
                .param(Param::required("query", ParamKind::Str))
                .param(Param::optional("library_id", ParamKind::Str))
                .param(Param::optional("media_type", ParamKind::Enum(MEDIA_TYPES)))
                .param(Param::optional("limit", ParamKind::int_range(1, 1000)).default(20))
                .param(Param::optional("genre", ParamKind::Str))
                .param(Param::optional("year", ParamKind::INT))
                .param(Param::optional("actor", ParamKind::Str))
                .param(Param::optional("director", ParamKind::Str))
                .param(Param::optional("min_rating", ParamKind::float_range(0.0, 10.0)))
                .param(Param::optional("unwatched", ParamKind::Bool)),
        )
        .operation(
            OperationSpec::new("get_details", "Full metadata for one item", get_details)
                .param(Param::required("media_key", ParamKind::Str).describe("Item rating key")),
        )
        .operation(
            OperationSpec::new("get_recent", "Recently added items", get_recent)
                .param(Param::optional("library_id", ParamKind::Str))
                .param(Param::optional("limit", ParamKind::int_range(1, 1000)).default(20)),
        )
        .operation(
            OperationSpec::new("update_metadata", "Edit item fields", update_metadata)
                .param(Param::required("media_key", ParamKind::Str))
                .param(
                    Param::required("metadata", ParamKind::Object)
                        .describe("Fields to change, e.g. {\"title\": \"...\", \"year\": 1999}"),
                ),
        )
}

async fn browse(ctx: HandlerContext) -> OperationResult {
    let found = ctx
        .server
        .library_items(ctx.params.require("library_id")?, page(&ctx.params))
        .await?;
    OperationOutput::json(&found.items)
}

async fn search(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let one = |name: &str| p.text(name).map(|v| vec![v.to_string()]).unwrap_or_default();
    let query = SearchQuery {
        query: Some(p.require("query")?.to_string()),
        library_id: p.text("library_id").map(str::to_string),
        media_type: p.text("media_type").map(str::to_string),
        year: p.int("year"),
        genres: one("genre"),
        actors: one("actor"),
        directors: one("director"),
        min_rating: p.float("min_rating"),
        unwatched: p.bool("unwatched"),
        page: page(p),
        ..SearchQuery::default()
    };
    let found = ctx.server.search(query).await?;
    OperationOutput::json(&found.items)
}

async fn get_details(ctx: HandlerContext) -> OperationResult {
    let item = ctx.server.get_item(ctx.params.require("media_key")?).await?;
    OperationOutput::json(&item)
}

async fn get_recent(ctx: HandlerContext) -> OperationResult {
    let limit = ctx.params.uint("limit").unwrap_or(20);
    let items = ctx
        .server
        .recently_added(ctx.params.text("library_id"), limit)
        .await?;
    OperationOutput::json(&items)
}

async fn update_metadata(ctx: HandlerContext) -> OperationResult {
    let fields = ctx.params.object("metadata").cloned().unwrap_or_default();
    let item = ctx
        .server
        .update_item(ctx.params.require("media_key")?, fields)
        .await?;
    OperationOutput::json(&item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::classify::ErrorCode;
    use crate::domains::tools::definitions::testing::call;
    use serde_json::json;

    #[tokio::test]
    async fn test_browse_pages() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "browse",
            json!({"library_id": "1", "limit": 2, "offset": "1"}),
        )
        .await;
        assert!(env.is_success());
        let data = env.data().unwrap();
        assert_eq!(data.as_array().unwrap().len(), 2);
        assert_eq!(data[0]["title"], json!("Ronin"));
        assert_eq!(env.count(), Some(2));
    }

    #[tokio::test]
    async fn test_browse_counts_returned_items() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "browse",
            json!({"library_id": "1", "limit": 1}),
        )
        .await;
        assert!(env.data().unwrap().is_array());
        assert_eq!(env.count(), Some(1));
    }

    #[tokio::test]
    async fn test_browse_limit_out_of_range() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "browse",
            json!({"library_id": "1", "limit": 0}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidParameter));
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let env = call(&router(), StubServer::new().into_arc(), "search", json!({"query": "  "})).await;
        assert_eq!(env.error_code(), Some(ErrorCode::MissingParameter));
    }

    #[tokio::test]
    async fn test_search_matches_titles() {
        let env = call(&router(), StubServer::new().into_arc(), "search", json!({"query": "heat"})).await;
        assert_eq!(env.count(), Some(1));
    }

    #[tokio::test]
    async fn test_get_details_not_found() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "get_details",
            json!({"media_key": "404"}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::NotFound));
        assert!(env.suggestions().iter().any(|s| s.contains("plex_search")));
    }

    #[tokio::test]
    async fn test_update_metadata_rejects_non_object() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "update_metadata",
            json!({"media_key": "100", "metadata": "title=Heat"}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidParameter));
    }
}
