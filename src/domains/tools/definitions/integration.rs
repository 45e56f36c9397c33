//! Regional recommendations and the integration settings store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::info;

use crate::adapter::{MediaItem, Page, SearchQuery};
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::error::OperationError;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{
    HandlerContext, OperationOutput, OperationResult, OperationSpec, with_state,
};

pub const INTEGRATIONS: &[&str] = &["vienna", "european", "anime"];

const CONTENT_TYPES: &[&str] = &["movie", "show"];

const SEASONS: &[&str] = &["winter", "spring", "summer", "fall"];

const MOODS: &[&str] = &["cozy", "festive", "cultural", "scenic", "classic", "modern"];

const EUROPEAN_COUNTRIES: &[&str] = &[
    "Austria", "Belgium", "Czech Republic", "Denmark", "Finland", "France", "Germany",
    "Greece", "Hungary", "Ireland", "Italy", "Netherlands", "Norway", "Poland", "Portugal",
    "Spain", "Sweden", "Switzerland", "United Kingdom",
];

/// Minimum score for a recommendation.
const THRESHOLD: f64 = 1.5;

/// Items scanned per query.
const CANDIDATES: u64 = 1000;

fn describe(name: &str) -> &'static str {
    match name {
        "vienna" => "Vienna-flavoured recommendations from your libraries",
        "european" => "European content by country of origin",
        _ => "Anime grouped by broadcast season",
    }
}

/// Settings of one integration.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationSettings {
    pub name: String,
    pub enabled: bool,
    pub config: Map<String, Value>,
    pub configured_at: Option<String>,
    pub last_synced: Option<String>,
}

/// Process-local integration settings.
#[derive(Debug)]
pub struct IntegrationStore {
    settings: RwLock<BTreeMap<String, IntegrationSettings>>,
}

impl Default for IntegrationStore {
    fn default() -> Self {
        let settings = INTEGRATIONS
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    IntegrationSettings {
                        name: name.to_string(),
                        enabled: true,
                        config: Map::new(),
                        configured_at: None,
                        last_synced: None,
                    },
                )
            })
            .collect();
        Self {
            settings: RwLock::new(settings),
        }
    }
}

impl IntegrationStore {
    async fn get(&self, name: &str) -> Result<IntegrationSettings, OperationError> {
        self.settings
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| OperationError::not_found("integration", name))
    }

    async fn require_enabled(&self, name: &str) -> Result<(), OperationError> {
        if self.get(name).await?.enabled {
            Ok(())
        } else {
            Err(OperationError::unsupported(format!(
                "integration '{}' is disabled; enable it with operation 'configure'",
                name
            )))
        }
    }
}

pub fn router() -> DomainRouter {
    router_with(Arc::new(IntegrationStore::default()))
}

pub fn router_with(store: Arc<IntegrationStore>) -> DomainRouter {
    let integration_name = || Param::required("integration_name", ParamKind::Enum(INTEGRATIONS));
    DomainRouter::new("integration", "Regional recommendations and integration settings")
        .operation(OperationSpec::new(
            "list_integrations",
            "Known integrations and their state",
            with_state(&store, list_integrations),
        ))
        .operation(
            OperationSpec::new(
                "vienna_recommendations",
                "Recommendations scored for a Viennese audience",
                with_state(&store, vienna_recommendations),
            )
            .param(Param::required("content_type", ParamKind::Enum(CONTENT_TYPES)))
            .param(Param::optional("limit", ParamKind::int_range(1, 100)).default(10))
            .param(Param::optional("mood", ParamKind::Enum(MOODS)).default("cozy"))
            .param(Param::optional("include_european", ParamKind::Bool).default(true)),
        )
        .operation(
            OperationSpec::new(
                "european_content",
                "Items produced in European countries",
                with_state(&store, european_content),
            )
            .param(Param::optional("country", ParamKind::Str))
            .param(Param::optional("content_type", ParamKind::Enum(CONTENT_TYPES)))
            .param(Param::optional("limit", ParamKind::int_range(1, 100)).default(10)),
        )
        .operation(
            OperationSpec::new(
                "anime_season_info",
                "Anime released in a broadcast season",
                with_state(&store, anime_season_info),
            )
            .param(Param::required("year", ParamKind::int_range(1900, 2100)))
            .param(Param::required("season", ParamKind::Enum(SEASONS))),
        )
        .operation(
            OperationSpec::new("configure", "Change integration settings", with_state(&store, configure))
                .param(integration_name())
                .param(Param::required("config", ParamKind::Object)),
        )
        .operation(
            OperationSpec::new("sync", "Refresh an integration's data", with_state(&store, sync))
                .param(integration_name()),
        )
}

async fn list_integrations(_ctx: HandlerContext, store: Arc<IntegrationStore>) -> OperationResult {
    let settings = store.settings.read().await;
    let listing: Vec<Value> = settings
        .values()
        .map(|s| {
            json!({
                "name": s.name,
                "enabled": s.enabled,
                "description": describe(&s.name),
                "last_synced": s.last_synced,
            })
        })
        .collect();
    Ok(OperationOutput::value(Value::Array(listing)))
}

async fn candidates(
    ctx: &HandlerContext,
    media_type: Option<&str>,
    genres: Vec<String>,
    year: Option<i64>,
) -> Result<Vec<MediaItem>, OperationError> {
    let query = SearchQuery {
        media_type: media_type.map(str::to_string),
        genres,
        year,
        page: Page {
            offset: 0,
            limit: CANDIDATES,
        },
        ..SearchQuery::default()
    };
    Ok(ctx.server.search(query).await?.items)
}

fn mood_genres(mood: &str) -> &'static [&'static str] {
    match mood {
        "festive" => &["comedy", "music", "family", "holiday"],
        "cultural" => &["documentary", "history", "biography", "art"],
        "scenic" => &["travel", "documentary", "nature"],
        "classic" => &["classic", "drama", "romance"],
        "modern" => &["drama", "comedy", "thriller"],
        _ => &["drama", "comedy", "romance", "family"],
    }
}

/// Score an item and explain the score.
fn vienna_score(item: &MediaItem, mood: &str, include_european: bool) -> (f64, Option<&'static str>) {
    let targets = mood_genres(mood);
    let genre_match = item
        .genres
        .iter()
        .any(|g| targets.contains(&g.to_lowercase().as_str()));
    let mut score = if genre_match { 2.0 } else { 0.0 };

    match item.rating.unwrap_or(0.0) {
        r if r >= 8.0 => score += 1.0,
        r if r >= 7.0 => score += 0.5,
        _ => {}
    }

    let title = item.title.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| title.contains(w));
    let context = if has(&["vienna", "austria", "salzburg", "mozart"]) {
        score += 2.0;
        Some("Direct Austrian reference")
    } else if has(&["german", "deutschland", "berlin"]) {
        score += 1.0;
        Some("German-speaking region")
    } else if include_european && has(&["european", "europe"]) {
        score += 0.5;
        Some("European context")
    } else {
        None
    };
    (score, context)
}

async fn vienna_recommendations(ctx: HandlerContext, store: Arc<IntegrationStore>) -> OperationResult {
    store.require_enabled("vienna").await?;
    let p = &ctx.params;
    let mood = p.text("mood").unwrap_or("cozy");
    let include_european = p.bool("include_european").unwrap_or(true);
    let limit = p.uint("limit").unwrap_or(10) as usize;

    let items = candidates(&ctx, p.text("content_type"), Vec::new(), None).await?;
    let mut scored: Vec<(f64, Value)> = items
        .iter()
        .filter_map(|item| {
            let (score, context) = vienna_score(item, mood, include_european);
            (score >= THRESHOLD).then(|| {
                (
                    score,
                    json!({
                        "media_key": item.id,
                        "title": item.title,
                        "year": item.year,
                        "rating": item.rating,
                        "vienna_score": (score * 100.0).round() / 100.0,
                        "mood": mood,
                        "austrian_context": context,
                    }),
                )
            })
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(limit);
    Ok(OperationOutput::value(Value::Array(
        scored.into_iter().map(|(_, v)| v).collect(),
    )))
}

fn is_european(item: &MediaItem, country: Option<&str>) -> bool {
    match country {
        Some(wanted) => item.countries.iter().any(|c| c.eq_ignore_ascii_case(wanted)),
        None => item
            .countries
            .iter()
            .any(|c| EUROPEAN_COUNTRIES.iter().any(|e| e.eq_ignore_ascii_case(c))),
    }
}

async fn european_content(ctx: HandlerContext, store: Arc<IntegrationStore>) -> OperationResult {
    store.require_enabled("european").await?;
    let p = &ctx.params;
    let country = p.text("country");
    let items: Vec<MediaItem> = candidates(&ctx, p.text("content_type"), Vec::new(), None)
        .await?
        .into_iter()
        .filter(|item| is_european(item, country))
        .take(p.uint("limit").unwrap_or(10) as usize)
        .collect();
    OperationOutput::json(&items)
}

/// Calendar months of a broadcast season.
fn season_months(season: &str) -> [u32; 3] {
    match season {
        "winter" => [1, 2, 3],
        "spring" => [4, 5, 6],
        "summer" => [7, 8, 9],
        _ => [10, 11, 12],
    }
}

fn release_month(item: &MediaItem) -> Option<u32> {
    item.originally_available_at
        .as_deref()
        .and_then(|date| chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .map(|date| chrono::Datelike::month(&date))
}

async fn anime_season_info(ctx: HandlerContext, store: Arc<IntegrationStore>) -> OperationResult {
    store.require_enabled("anime").await?;
    let p = &ctx.params;
    let year = p.int("year").ok_or_else(|| OperationError::missing("year"))?;
    let season = p.require("season")?;
    let months = season_months(season);

    let items: Vec<MediaItem> = candidates(&ctx, None, vec!["Anime".to_string()], Some(year))
        .await?
        .into_iter()
        .filter(|item| release_month(item).is_some_and(|m| months.contains(&m)))
        .collect();

    Ok(OperationOutput::value(json!({
        "year": year,
        "season": season,
        "months": months,
        "title_count": items.len(),
        "titles": serde_json::to_value(&items)?,
    }))
    .with_count(items.len()))
}

async fn configure(ctx: HandlerContext, store: Arc<IntegrationStore>) -> OperationResult {
    let name = ctx.params.require("integration_name")?;
    let config = ctx.params.object("config").cloned().unwrap_or_default();
    let mut settings = store.settings.write().await;
    let entry = settings
        .get_mut(name)
        .ok_or_else(|| OperationError::not_found("integration", name))?;
    if let Some(enabled) = config.get("enabled").and_then(Value::as_bool) {
        entry.enabled = enabled;
    }
    entry.config.extend(config);
    entry.configured_at = Some(Utc::now().to_rfc3339());
    info!("Integration '{}' configured", name);
    OperationOutput::json(&*entry)
}

async fn sync(ctx: HandlerContext, store: Arc<IntegrationStore>) -> OperationResult {
    let name = ctx.params.require("integration_name")?;
    store.require_enabled(name).await?;

    let items = match name {
        "anime" => candidates(&ctx, None, vec!["Anime".to_string()], None).await?,
        _ => candidates(&ctx, None, Vec::new(), None).await?,
    };
    let matched = match name {
        "european" => items.iter().filter(|i| is_european(i, None)).count(),
        "vienna" => items
            .iter()
            .filter(|i| vienna_score(i, "cozy", true).0 >= THRESHOLD)
            .count(),
        _ => items.len(),
    };

    let synced_at = Utc::now().to_rfc3339();
    let mut settings = store.settings.write().await;
    if let Some(entry) = settings.get_mut(name) {
        entry.last_synced = Some(synced_at.clone());
    }
    Ok(OperationOutput::value(json!({
        "integration": name,
        "items_scanned": items.len(),
        "items_matched": matched,
        "synced_at": synced_at,
    })))
}
