//! Search, suggestions and a process-local search history.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;

use super::media::MEDIA_TYPES;
use super::{page, results};
use crate::adapter::{SearchQuery, SearchResults};
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::params::{Param, ParamKind, Params};
use crate::domains::tools::spec::{
    HandlerContext, OperationOutput, OperationResult, OperationSpec, with_state,
};

/// Maximum number of remembered searches.
pub const HISTORY_CAP: usize = 100;

const SUGGEST_LIMIT: usize = 10;

const SUMMARY_WINDOW: u64 = 1000;

const SORT_DIRS: &[&str] = &["asc", "desc"];

/// Keys of the free-form `filters` object that map onto search fields.
const FILTER_KEYS: &[&str] = &[
    "genre",
    "actor",
    "director",
    "studio",
    "country",
    "collection",
    "content_rating",
];

#[derive(Debug, Clone, Serialize)]
pub struct RecentSearch {
    pub query: String,
    pub operation: &'static str,
    pub results: u64,
    pub searched_at: String,
}

/// Search history and saved searches.
#[derive(Debug, Default)]
pub struct SearchState {
    history: RwLock<VecDeque<RecentSearch>>,
    saved: RwLock<BTreeMap<String, Value>>,
}

impl SearchState {
    async fn remember(&self, operation: &'static str, query: String, results: u64) {
        let mut history = self.history.write().await;
        history.push_front(RecentSearch {
            query,
            operation,
            results,
            searched_at: Utc::now().to_rfc3339(),
        });
        history.truncate(HISTORY_CAP);
    }

    async fn recent(&self, max: usize) -> Vec<RecentSearch> {
        self.history.read().await.iter().take(max).cloned().collect()
    }
}

pub fn router() -> DomainRouter {
    router_with(Arc::new(SearchState::default()))
}

pub fn router_with(state: Arc<SearchState>) -> DomainRouter {
    DomainRouter::new("search", "Find media by text, filters and history")
        .operation(
            OperationSpec::new("search", "Text search across libraries", with_state(&state, search))
                .param(Param::optional("query", ParamKind::Str))
                .param(
                    Param::optional("summary_contains", ParamKind::Str)
                        .describe("Match text inside item summaries"),
                )
                .param(Param::optional("library_id", ParamKind::Str))
                .param(Param::optional("media_type", ParamKind::Enum(MEDIA_TYPES)))
                .param(Param::optional("limit", ParamKind::int_range(1, 1000)).default(20))
                .any_of(&["query", "summary_contains"]),
        )
        .operation(
            OperationSpec::new(
                "advanced_search",
                "Filtered search with sorting and paging",
                with_state(&state, advanced_search),
            )
            .param(Param::optional("query", ParamKind::Str))
            .param(Param::optional("title", ParamKind::Str))
            .param(Param::optional("genre", ParamKind::StrList))
            .param(Param::optional("actor", ParamKind::StrList))
            .param(Param::optional("director", ParamKind::StrList))
            .param(Param::optional("year", ParamKind::INT))
            .param(Param::optional("studio", ParamKind::StrList))
            .param(Param::optional("collection", ParamKind::StrList))
            .param(Param::optional("library_id", ParamKind::Str))
            .param(Param::optional("media_type", ParamKind::Enum(MEDIA_TYPES)))
            .param(Param::optional("filters", ParamKind::Object))
            .param(Param::optional("min_rating", ParamKind::float_range(0.0, 10.0)))
            .param(Param::optional("max_rating", ParamKind::float_range(0.0, 10.0)))
            .param(Param::optional("min_year", ParamKind::INT))
            .param(Param::optional("max_year", ParamKind::INT))
            .param(Param::optional("unwatched", ParamKind::Bool))
            .param(Param::optional("sort_by", ParamKind::Str).default("titleSort"))
            .param(Param::optional("sort_dir", ParamKind::Enum(SORT_DIRS)).default("asc"))
            .param(Param::optional("limit", ParamKind::int_range(1, 1000)).default(50))
            .param(Param::optional("offset", ParamKind::NON_NEGATIVE).default(0))
            .any_of(&[
                "query",
                "title",
                "genre",
                "actor",
                "director",
                "year",
                "studio",
                "collection",
            ]),
        )
        .operation(
            OperationSpec::new("suggest", "Title suggestions for partial input", suggest)
                .param(Param::required("query", ParamKind::Str)),
        )
        .operation(
            OperationSpec::new(
                "recent_searches",
                "Most recent searches, newest first",
                with_state(&state, recent_searches),
            )
            .param(Param::optional("max_recent", ParamKind::int_range(1, 100)).default(10)),
        )
        .operation(
            OperationSpec::new("save_search", "Save a named search", with_state(&state, save_search))
                .param(Param::required("search_name", ParamKind::Str))
                .param(Param::optional("query", ParamKind::Str))
                .param(Param::optional("title", ParamKind::Str))
                .param(Param::optional("genre", ParamKind::Str))
                .param(Param::optional("actor", ParamKind::Str))
                .param(Param::optional("library_id", ParamKind::Str))
                .any_of(&["query", "title", "genre", "actor"]),
        )
}

async fn search(ctx: HandlerContext, state: Arc<SearchState>) -> OperationResult {
    let p = &ctx.params;
    let summary = p.text("summary_contains").map(str::to_lowercase);
    let limit = p.uint("limit").unwrap_or(20);
    let mut window = page(p);
    // Summary filtering happens here, so fetch a wider window first.
    if summary.is_some() {
        window.limit = window.limit.max(SUMMARY_WINDOW);
    }
    let query = SearchQuery {
        query: p.text("query").map(str::to_string),
        library_id: p.text("library_id").map(str::to_string),
        media_type: p.text("media_type").map(str::to_string),
        page: window,
        ..SearchQuery::default()
    };

    let SearchResults { mut items, .. } = ctx.server.search(query).await?;
    if let Some(needle) = &summary {
        items.retain(|item| {
            item.summary
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains(needle))
        });
    }
    items.truncate(limit as usize);

    let label = p
        .text("query")
        .or(p.text("summary_contains"))
        .unwrap_or_default()
        .to_string();
    state.remember("search", label, items.len() as u64).await;
    OperationOutput::json(&items)
}

fn advanced_query(p: &Params) -> SearchQuery {
    let mut query = SearchQuery {
        query: p.text("query").map(str::to_string),
        title: p.text("title").map(str::to_string),
        library_id: p.text("library_id").map(str::to_string),
        media_type: p.text("media_type").map(str::to_string),
        year: p.int("year"),
        min_year: p.int("min_year"),
        max_year: p.int("max_year"),
        genres: p.list("genre"),
        actors: p.list("actor"),
        directors: p.list("director"),
        studios: p.list("studio"),
        collections: p.list("collection"),
        min_rating: p.float("min_rating"),
        max_rating: p.float("max_rating"),
        unwatched: p.bool("unwatched"),
        sort: Some(format!(
            "{}:{}",
            p.text("sort_by").unwrap_or("titleSort"),
            p.text("sort_dir").unwrap_or("asc")
        )),
        page: page(p),
        ..SearchQuery::default()
    };

    if let Some(filters) = p.object("filters") {
        for key in FILTER_KEYS {
            let values = filter_values(filters, key);
            let target = match *key {
                "genre" => &mut query.genres,
                "actor" => &mut query.actors,
                "director" => &mut query.directors,
                "studio" => &mut query.studios,
                "country" => &mut query.countries,
                "collection" => &mut query.collections,
                _ => &mut query.content_ratings,
            };
            target.extend(values);
        }
    }
    query
}

fn filter_values(filters: &Map<String, Value>, key: &str) -> Vec<String> {
    match filters.get(key) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

async fn advanced_search(ctx: HandlerContext, state: Arc<SearchState>) -> OperationResult {
    let query = advanced_query(&ctx.params);
    let label = query
        .query
        .clone()
        .or(query.title.clone())
        .unwrap_or_else(|| "advanced".to_string());
    let found = ctx.server.search(query).await?;
    state.remember("advanced_search", label, found.total).await;
    results(&found.items, found.total)
}

async fn suggest(ctx: HandlerContext) -> OperationResult {
    let query = SearchQuery {
        query: Some(ctx.params.require("query")?.to_string()),
        page: crate::adapter::Page {
            offset: 0,
            limit: SUGGEST_LIMIT as u64,
        },
        ..SearchQuery::default()
    };
    let found = ctx.server.search(query).await?;
    let mut titles: Vec<String> = Vec::new();
    for item in found.items {
        if !titles.contains(&item.title) {
            titles.push(item.title);
        }
    }
    titles.truncate(SUGGEST_LIMIT);
    OperationOutput::json(&titles)
}

async fn recent_searches(ctx: HandlerContext, state: Arc<SearchState>) -> OperationResult {
    let max = ctx.params.uint("max_recent").unwrap_or(10) as usize;
    OperationOutput::json(&state.recent(max).await)
}

async fn save_search(ctx: HandlerContext, state: Arc<SearchState>) -> OperationResult {
    let p = &ctx.params;
    let name = p.require("search_name")?.to_string();
    let mut criteria = p.as_map().clone();
    criteria.remove("search_name");
    let saved = json!({
        "name": name,
        "criteria": criteria,
        "saved_at": Utc::now().to_rfc3339(),
    });
    state.saved.write().await.insert(name, saved.clone());
    Ok(OperationOutput::value(saved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::classify::ErrorCode;
    use crate::domains::tools::definitions::testing::call;

    #[tokio::test]
    async fn test_search_without_query_mentions_query() {
        let env = call(&router(), StubServer::new().into_arc(), "search", json!({})).await;
        assert!(!env.is_success());
        assert_eq!(env.error_code(), Some(ErrorCode::MissingParameter));
        assert!(env.error().unwrap().contains("query"));
    }

    #[tokio::test]
    async fn test_summary_contains_satisfies_any_of() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "search",
            json!({"summary_contains": "ronin"}),
        )
        .await;
        assert!(env.is_success());
        assert_eq!(env.count(), Some(1));
    }

    #[tokio::test]
    async fn test_searches_are_remembered_newest_first() {
        let state = Arc::new(SearchState::default());
        let router = router_with(state.clone());
        let server = StubServer::new().into_arc();
        call(&router, server.clone(), "search", json!({"query": "heat"})).await;
        call(&router, server.clone(), "search", json!({"query": "ronin"})).await;

        let env = call(&router, server, "recent_searches", json!({"max_recent": 1})).await;
        assert_eq!(env.count(), Some(1));
        assert_eq!(env.data().unwrap()[0]["query"], json!("ronin"));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let state = SearchState::default();
        for i in 0..(HISTORY_CAP + 5) {
            state.remember("search", i.to_string(), 0).await;
        }
        assert_eq!(state.history.read().await.len(), HISTORY_CAP);
    }

    #[tokio::test]
    async fn test_advanced_search_counts_total() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "advanced_search",
            json!({"title": "col", "sort_dir": "DESC"}),
        )
        .await;
        assert!(env.is_success());
        assert_eq!(env.count(), Some(1));
    }

    #[tokio::test]
    async fn test_advanced_search_invalid_sort_dir() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "advanced_search",
            json!({"title": "x", "sort_dir": "sideways"}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidParameter));
    }

    #[test]
    fn test_filters_object_merges() {
        let mut values = Map::new();
        values.insert("genre".into(), json!(["Drama"]));
        values.insert("filters".into(), json!({"genre": "Crime", "country": ["France"]}));
        let query = advanced_query(&Params::new(values));
        assert_eq!(query.genres, vec!["Drama", "Crime"]);
        assert_eq!(query.countries, vec!["France"]);
    }

    #[tokio::test]
    async fn test_save_search_stores_criteria() {
        let state = Arc::new(SearchState::default());
        let router = router_with(state.clone());
        let env = call(
            &router,
            StubServer::new().into_arc(),
            "save_search",
            json!({"search_name": "heists", "genre": "Crime"}),
        )
        .await;
        assert!(env.is_success());
        assert_eq!(env.data().unwrap()["criteria"]["genre"], json!("Crime"));
        assert!(state.saved.read().await.contains_key("heists"));
    }

    #[tokio::test]
    async fn test_suggest_caps_results() {
        let env = call(&router(), StubServer::new().into_arc(), "suggest", json!({"query": ""})).await;
        assert_eq!(env.error_code(), Some(ErrorCode::MissingParameter));
        let env = call(&router(), StubServer::new().into_arc(), "suggest", json!({"query": "o"})).await;
        assert!(env.count().unwrap() <= SUGGEST_LIMIT);
    }
}
