//! Plex Media Server client.
//!
//! Talks to the server's JSON API with `reqwest`. Every response body is a
//! `MediaContainer` object; the helpers at the bottom of this file pull
//! loosely-typed fields out of it, since Plex mixes numbers and numeric
//! strings freely.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::*;

const CLIENT_IDENTIFIER: &str = "plex-mcp-server";
const PAGE_SIZE: u64 = 500;
const LIBRARY_URI_PREFIX: &str = "com.plexapp.plugins.library/library/metadata";

/// Percent-encode a caller-supplied id for use as one URL path segment.
fn seg(id: &str) -> Cow<'_, str> {
    urlencoding::encode(id)
}

static EMPTY: Value = Value::Null;

/// Media server backend for a single Plex Media Server.
pub struct PlexClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    command_id: AtomicU64,
    /// Quality profiles. Plex has no profile API, so they live here.
    profiles: RwLock<BTreeMap<String, QualityProfile>>,
}

impl PlexClient {
    /// Create a client for the server at `base_url`.
    ///
    /// A missing token is accepted here; every request then fails with
    /// [`AdapterError::Auth`].
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> AdapterResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::upstream(format!("failed to build HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Plex client configured for {}", base_url);

        Ok(Self {
            http,
            base_url,
            token: token.filter(|t| !t.is_empty()),
            command_id: AtomicU64::new(1),
            profiles: RwLock::new(BTreeMap::new()),
        })
    }

    /// Base URL of the server, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> String {
        if query.is_empty() {
            return format!("{}{}", self.base_url, path);
        }
        let encoded = serde_urlencoded::to_string(query).unwrap_or_default();
        format!("{}{}?{}", self.base_url, path, encoded)
    }

    /// Send one request and decode the JSON body (`Null` for empty bodies).
    #[instrument(skip(self, query, headers))]
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> AdapterResult<Value> {
        let token = self.token.as_deref().ok_or_else(|| {
            AdapterError::auth("PLEX_TOKEN is not set; configure a Plex authentication token")
        })?;

        let url = self.url(path, query);
        debug!("Plex request: {} {}", method, path);

        let mut request = self
            .http
            .request(method, &url)
            .header("X-Plex-Token", token)
            .header("X-Plex-Client-Identifier", CLIENT_IDENTIFIER)
            .header("X-Plex-Product", CLIENT_IDENTIFIER)
            .header("Accept", "application/json");
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if let Some(err) = status_error(status, path) {
            warn!("Plex returned {} for {}", status, path);
            return Err(err);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| AdapterError::upstream(format!("invalid JSON from {}: {}", path, e)))
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> AdapterResult<Value> {
        self.send(Method::GET, path, query, &[]).await
    }

    async fn put(&self, path: &str, query: &[(&str, String)]) -> AdapterResult<Value> {
        self.send(Method::PUT, path, query, &[]).await
    }

    async fn post(&self, path: &str, query: &[(&str, String)]) -> AdapterResult<Value> {
        self.send(Method::POST, path, query, &[]).await
    }

    async fn delete(&self, path: &str) -> AdapterResult<Value> {
        self.send(Method::DELETE, path, &[], &[]).await
    }

    async fn machine_identifier(&self) -> AdapterResult<String> {
        let root = self.get("/", &[]).await?;
        text(container(&root), "machineIdentifier")
            .ok_or_else(|| AdapterError::upstream("server did not report a machine identifier"))
    }

    async fn item_uri(&self, item_ids: &[String]) -> AdapterResult<String> {
        let machine = self.machine_identifier().await?;
        Ok(format!(
            "server://{}/{}/{}",
            machine,
            LIBRARY_URI_PREFIX,
            item_ids.iter().map(|id| seg(id)).collect::<Vec<_>>().join(",")
        ))
    }

    async fn metadata(&self, item_id: &str, entity: &str) -> AdapterResult<Value> {
        let path = format!("/library/metadata/{}", seg(item_id));
        let body = self
            .get(&path, &[])
            .await
            .map_err(relabel(entity, item_id))?;
        container(&body)
            .get("Metadata")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .cloned()
            .ok_or_else(|| AdapterError::not_found(entity, item_id))
    }

    async fn section_items(
        &self,
        library_id: &str,
        filters: &[(&str, String)],
        page: Page,
    ) -> AdapterResult<SearchResults> {
        let path = format!("/library/sections/{}/all", seg(library_id));
        let headers = [
            ("X-Plex-Container-Start", page.offset.to_string()),
            ("X-Plex-Container-Size", page.limit.to_string()),
        ];
        let body = self
            .send(Method::GET, &path, filters, &headers)
            .await
            .map_err(relabel("library", library_id))?;
        let c = container(&body);
        let items: Vec<MediaItem> = array(c, "Metadata").iter().map(parse_item).collect();
        let total = number_u64(c, "totalSize").unwrap_or(items.len() as u64);
        Ok(SearchResults { items, total })
    }

    async fn prefs(&self) -> AdapterResult<Vec<(String, Value)>> {
        let body = self.get("/:/prefs", &[]).await?;
        Ok(array(container(&body), "Setting")
            .iter()
            .filter_map(|s| {
                let id = text(s, "id")?;
                Some((id, s.get("value").cloned().unwrap_or(Value::Null)))
            })
            .collect())
    }

    async fn set_prefs(&self, prefs: &[(&str, String)]) -> AdapterResult<()> {
        self.put("/:/prefs", prefs).await.map(|_| ())
    }

    async fn raw_playlist_items(&self, playlist_id: &str) -> AdapterResult<Vec<Value>> {
        let path = format!("/playlists/{}/items", seg(playlist_id));
        let body = self
            .get(&path, &[])
            .await
            .map_err(relabel("playlist", playlist_id))?;
        Ok(array(container(&body), "Metadata").to_vec())
    }
}

#[async_trait]
impl MediaServer for PlexClient {
    async fn list_libraries(&self) -> AdapterResult<Vec<Library>> {
        let body = self.get("/library/sections", &[]).await?;
        Ok(array(container(&body), "Directory")
            .iter()
            .map(parse_library)
            .collect())
    }

    async fn get_library(&self, library_id: &str) -> AdapterResult<Library> {
        self.list_libraries()
            .await?
            .into_iter()
            .find(|l| l.id == library_id)
            .ok_or_else(|| AdapterError::not_found("library", library_id))
    }

    async fn create_library(&self, library: NewLibrary) -> AdapterResult<Library> {
        let mut query = vec![
            ("name", library.name.clone()),
            ("type", library.library_type.clone()),
            ("agent", library.agent.clone()),
            ("scanner", library.scanner.clone()),
            ("language", library.language.clone()),
            ("location", library.path.clone()),
        ];
        if let Some(thumb) = &library.thumb {
            query.push(("thumb", thumb.clone()));
        }
        self.post("/library/sections", &query).await?;

        self.list_libraries()
            .await?
            .into_iter()
            .find(|l| l.title == library.name)
            .ok_or_else(|| {
                AdapterError::upstream(format!(
                    "library '{}' was not listed after creation",
                    library.name
                ))
            })
    }

    async fn update_library(
        &self,
        library_id: &str,
        update: LibraryUpdate,
    ) -> AdapterResult<Library> {
        let current = self.get_library(library_id).await?;
        let mut query = vec![
            ("agent", update.agent.unwrap_or(current.agent.unwrap_or_default())),
            ("type", current.library_type),
        ];
        if let Some(name) = update.name {
            query.push(("name", name));
        }
        if let Some(scanner) = update.scanner {
            query.push(("scanner", scanner));
        }
        if let Some(language) = update.language {
            query.push(("language", language));
        }
        if let Some(thumb) = update.thumb {
            query.push(("thumb", thumb));
        }
        self.put(&format!("/library/sections/{}", seg(library_id)), &query)
            .await?;
        self.get_library(library_id).await
    }

    async fn delete_library(&self, library_id: &str) -> AdapterResult<()> {
        self.get_library(library_id).await?;
        self.delete(&format!("/library/sections/{}", seg(library_id)))
            .await
            .map(|_| ())
    }

    async fn scan_library(&self, library_id: &str, force: bool) -> AdapterResult<()> {
        let query: Vec<(&str, String)> = if force {
            vec![("force", "1".to_string())]
        } else {
            Vec::new()
        };
        self.get(&format!("/library/sections/{}/refresh", seg(library_id)), &query)
            .await
            .map_err(relabel("library", library_id))
            .map(|_| ())
    }

    async fn refresh_library(&self, library_id: &str, _force: bool) -> AdapterResult<()> {
        self.get(
            &format!("/library/sections/{}/refresh", seg(library_id)),
            &[("force", "1".to_string())],
        )
        .await
        .map_err(relabel("library", library_id))
        .map(|_| ())
    }

    async fn optimize_library(&self, library_id: &str) -> AdapterResult<()> {
        self.get_library(library_id).await?;
        self.put("/library/optimize", &[("async", "1".to_string())])
            .await
            .map(|_| ())
    }

    async fn empty_trash(&self, library_id: &str) -> AdapterResult<()> {
        self.put(&format!("/library/sections/{}/emptyTrash", seg(library_id)), &[])
            .await
            .map_err(relabel("library", library_id))
            .map(|_| ())
    }

    async fn add_library_location(&self, library_id: &str, path: &str) -> AdapterResult<Library> {
        let current = self.get_library(library_id).await?;
        let mut locations = current.locations.clone();
        if !locations.iter().any(|l| l == path) {
            locations.push(path.to_string());
        }
        let mut query = vec![
            ("agent", current.agent.clone().unwrap_or_default()),
            ("type", current.library_type.clone()),
        ];
        query.extend(locations.into_iter().map(|l| ("location", l)));
        self.put(&format!("/library/sections/{}", seg(library_id)), &query)
            .await?;
        self.get_library(library_id).await
    }

    async fn remove_library_location(
        &self,
        library_id: &str,
        path: &str,
    ) -> AdapterResult<Library> {
        let current = self.get_library(library_id).await?;
        if !current.locations.iter().any(|l| l == path) {
            return Err(AdapterError::not_found("location", path));
        }
        let mut query = vec![
            ("agent", current.agent.clone().unwrap_or_default()),
            ("type", current.library_type.clone()),
        ];
        query.extend(
            current
                .locations
                .iter()
                .filter(|l| l.as_str() != path)
                .map(|l| ("location", l.clone())),
        );
        self.put(&format!("/library/sections/{}", seg(library_id)), &query)
            .await?;
        self.get_library(library_id).await
    }

    async fn clean_bundles(&self, library_id: Option<&str>) -> AdapterResult<()> {
        if let Some(id) = library_id {
            self.get_library(id).await?;
        }
        self.put("/library/clean/bundles", &[]).await.map(|_| ())
    }

    async fn analyze_library(&self, library_id: &str) -> AdapterResult<LibraryAnalysis> {
        let mut analysis = LibraryAnalysis {
            library_id: library_id.to_string(),
            total_items: 0,
            unmatched: Vec::new(),
            missing_summary: 0,
            missing_year: 0,
            by_type: Map::new(),
        };

        let mut page = Page {
            offset: 0,
            limit: PAGE_SIZE,
        };
        loop {
            let results = self.section_items(library_id, &[], page).await?;
            let fetched = results.items.len() as u64;
            for item in &results.items {
                analysis.total_items += 1;
                if item.is_unmatched() {
                    analysis.unmatched.push(item.id.clone());
                }
                if item.summary.as_deref().unwrap_or("").is_empty() {
                    analysis.missing_summary += 1;
                }
                if item.year.is_none() {
                    analysis.missing_year += 1;
                }
                let count = analysis
                    .by_type
                    .entry(item.media_type.clone())
                    .or_insert(Value::from(0u64));
                *count = Value::from(count.as_u64().unwrap_or(0) + 1);
            }
            page.offset += fetched;
            if fetched == 0 || page.offset >= results.total {
                break;
            }
        }
        Ok(analysis)
    }

    async fn organize_library(
        &self,
        library_id: &str,
        dry_run: bool,
    ) -> AdapterResult<OrganizeReport> {
        let analysis = self.analyze_library(library_id).await?;
        let mut refreshed = 0;
        if !dry_run {
            for item_id in &analysis.unmatched {
                match self.refresh_item(item_id, true).await {
                    Ok(()) => refreshed += 1,
                    Err(e) => warn!("Failed to refresh {}: {}", item_id, e),
                }
            }
        }
        Ok(OrganizeReport {
            library_id: library_id.to_string(),
            dry_run,
            candidates: analysis.unmatched,
            refreshed,
        })
    }

    async fn library_items(&self, library_id: &str, page: Page) -> AdapterResult<SearchResults> {
        self.section_items(library_id, &[], page).await
    }

    #[instrument(skip(self, query))]
    async fn search(&self, query: SearchQuery) -> AdapterResult<SearchResults> {
        let mut candidates: Vec<MediaItem> = Vec::new();

        if let (Some(text_query), None) = (&query.query, &query.library_id) {
            let body = self
                .get(
                    "/hubs/search",
                    &[
                        ("query", text_query.clone()),
                        ("limit", (query.page.offset + query.page.limit).to_string()),
                    ],
                )
                .await?;
            for hub in array(container(&body), "Hub") {
                candidates.extend(array(hub, "Metadata").iter().map(parse_item));
            }
        } else {
            let filters = section_filters(&query);
            let libraries = match &query.library_id {
                Some(id) => vec![id.clone()],
                None => self
                    .list_libraries()
                    .await?
                    .into_iter()
                    .map(|l| l.id)
                    .collect(),
            };
            let everything = Page {
                offset: 0,
                limit: PAGE_SIZE,
            };
            for library_id in libraries {
                let results = self.section_items(&library_id, &filters, everything).await?;
                candidates.extend(results.items);
            }
        }

        let matching: Vec<MediaItem> = candidates
            .into_iter()
            .filter(|item| matches_query(item, &query))
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.page.offset as usize)
            .take(query.page.limit as usize)
            .collect();
        Ok(SearchResults { items, total })
    }

    async fn get_item(&self, item_id: &str) -> AdapterResult<MediaItem> {
        self.metadata(item_id, "item").await.map(|m| parse_item(&m))
    }

    async fn recently_added(
        &self,
        library_id: Option<&str>,
        limit: u64,
    ) -> AdapterResult<Vec<MediaItem>> {
        let path = match library_id {
            Some(id) => format!("/library/sections/{}/recentlyAdded", seg(id)),
            None => "/library/recentlyAdded".to_string(),
        };
        let headers = [
            ("X-Plex-Container-Start", "0".to_string()),
            ("X-Plex-Container-Size", limit.to_string()),
        ];
        let body = self.send(Method::GET, &path, &[], &headers).await?;
        Ok(array(container(&body), "Metadata")
            .iter()
            .take(limit as usize)
            .map(parse_item)
            .collect())
    }

    async fn update_item(
        &self,
        item_id: &str,
        fields: Map<String, Value>,
    ) -> AdapterResult<MediaItem> {
        let mut query: Vec<(String, String)> = Vec::new();
        for (field, value) in &fields {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            query.push((format!("{}.value", field), value));
            query.push((format!("{}.locked", field), "1".to_string()));
        }
        let borrowed: Vec<(&str, String)> =
            query.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        self.put(&format!("/library/metadata/{}", seg(item_id)), &borrowed)
            .await
            .map_err(relabel("item", item_id))?;
        self.get_item(item_id).await
    }

    async fn refresh_item(&self, item_id: &str, force: bool) -> AdapterResult<()> {
        let query: Vec<(&str, String)> = if force {
            vec![("force", "1".to_string())]
        } else {
            Vec::new()
        };
        self.put(&format!("/library/metadata/{}/refresh", seg(item_id)), &query)
            .await
            .map_err(relabel("item", item_id))
            .map(|_| ())
    }

    async fn match_candidates(&self, item_id: &str) -> AdapterResult<Vec<MatchCandidate>> {
        let body = self
            .get(
                &format!("/library/metadata/{}/matches", seg(item_id)),
                &[("manual", "1".to_string())],
            )
            .await
            .map_err(relabel("item", item_id))?;
        Ok(array(container(&body), "SearchResult")
            .iter()
            .filter_map(|r| {
                Some(MatchCandidate {
                    guid: text(r, "guid")?,
                    name: text(r, "name").unwrap_or_default(),
                    year: number_i64(r, "year"),
                    score: number_i64(r, "score"),
                })
            })
            .collect())
    }

    async fn apply_match(&self, item_id: &str, guid: &str) -> AdapterResult<MediaItem> {
        self.put(
            &format!("/library/metadata/{}/match", seg(item_id)),
            &[("guid", guid.to_string())],
        )
        .await
        .map_err(relabel("item", item_id))?;
        self.get_item(item_id).await
    }

    async fn list_playlists(&self) -> AdapterResult<Vec<Playlist>> {
        let body = self.get("/playlists", &[]).await?;
        Ok(array(container(&body), "Metadata")
            .iter()
            .map(parse_playlist)
            .collect())
    }

    async fn get_playlist(&self, playlist_id: &str) -> AdapterResult<Playlist> {
        let body = self
            .get(&format!("/playlists/{}", seg(playlist_id)), &[])
            .await
            .map_err(relabel("playlist", playlist_id))?;
        array(container(&body), "Metadata")
            .first()
            .map(parse_playlist)
            .ok_or_else(|| AdapterError::not_found("playlist", playlist_id))
    }

    async fn playlist_items(&self, playlist_id: &str) -> AdapterResult<Vec<MediaItem>> {
        Ok(self
            .raw_playlist_items(playlist_id)
            .await?
            .iter()
            .map(parse_item)
            .collect())
    }

    async fn create_playlist(
        &self,
        title: &str,
        items: &[String],
        summary: Option<&str>,
    ) -> AdapterResult<Playlist> {
        let first = items
            .first()
            .ok_or_else(|| AdapterError::upstream("a playlist needs at least one item"))?;
        let first = self.get_item(first).await?;
        let uri = self.item_uri(items).await?;

        let body = self
            .post(
                "/playlists",
                &[
                    ("type", playlist_kind(&first.media_type).to_string()),
                    ("title", title.to_string()),
                    ("smart", "0".to_string()),
                    ("uri", uri),
                ],
            )
            .await?;
        let created = array(container(&body), "Metadata")
            .first()
            .map(parse_playlist)
            .ok_or_else(|| AdapterError::upstream("server did not return the new playlist"))?;

        match summary {
            Some(summary) => {
                self.update_playlist(&created.id, None, Some(summary))
                    .await
            }
            None => Ok(created),
        }
    }

    async fn update_playlist(
        &self,
        playlist_id: &str,
        title: Option<&str>,
        summary: Option<&str>,
    ) -> AdapterResult<Playlist> {
        let mut query = Vec::new();
        if let Some(title) = title {
            query.push(("title", title.to_string()));
        }
        if let Some(summary) = summary {
            query.push(("summary", summary.to_string()));
        }
        self.put(&format!("/playlists/{}", seg(playlist_id)), &query)
            .await
            .map_err(relabel("playlist", playlist_id))?;
        self.get_playlist(playlist_id).await
    }

    async fn delete_playlist(&self, playlist_id: &str) -> AdapterResult<()> {
        self.delete(&format!("/playlists/{}", seg(playlist_id)))
            .await
            .map_err(relabel("playlist", playlist_id))
            .map(|_| ())
    }

    async fn add_to_playlist(&self, playlist_id: &str, item_id: &str) -> AdapterResult<()> {
        self.get_item(item_id).await?;
        let uri = self.item_uri(&[item_id.to_string()]).await?;
        self.put(
            &format!("/playlists/{}/items", seg(playlist_id)),
            &[("uri", uri)],
        )
        .await
        .map_err(relabel("playlist", playlist_id))
        .map(|_| ())
    }

    async fn remove_from_playlist(&self, playlist_id: &str, item_id: &str) -> AdapterResult<()> {
        let entries = self.raw_playlist_items(playlist_id).await?;
        let entry = entries
            .iter()
            .find(|e| text(e, "ratingKey").as_deref() == Some(item_id))
            .and_then(|e| text(e, "playlistItemID"))
            .ok_or_else(|| AdapterError::not_found("item", item_id))?;
        self.delete(&format!("/playlists/{}/items/{}", seg(playlist_id), seg(&entry)))
            .await
            .map(|_| ())
    }

    async fn list_collections(&self, library_id: &str) -> AdapterResult<Vec<Collection>> {
        let body = self
            .get(&format!("/library/sections/{}/collections", seg(library_id)), &[])
            .await
            .map_err(relabel("library", library_id))?;
        Ok(array(container(&body), "Metadata")
            .iter()
            .map(|m| parse_collection(m, Some(library_id)))
            .collect())
    }

    async fn get_collection(&self, collection_id: &str) -> AdapterResult<Collection> {
        let meta = self.metadata(collection_id, "collection").await?;
        if text(&meta, "type").as_deref() != Some("collection") {
            return Err(AdapterError::not_found("collection", collection_id));
        }
        Ok(parse_collection(&meta, None))
    }

    async fn create_collection(
        &self,
        library_id: &str,
        title: &str,
        summary: Option<&str>,
    ) -> AdapterResult<Collection> {
        let library = self.get_library(library_id).await?;
        let body = self
            .post(
                "/library/collections",
                &[
                    ("type", section_type_code(&library.library_type).to_string()),
                    ("title", title.to_string()),
                    ("smart", "0".to_string()),
                    ("sectionId", library_id.to_string()),
                ],
            )
            .await?;
        let created = array(container(&body), "Metadata")
            .first()
            .map(|m| parse_collection(m, Some(library_id)))
            .ok_or_else(|| AdapterError::upstream("server did not return the new collection"))?;

        match summary {
            Some(summary) => {
                self.update_collection(&created.id, None, Some(summary))
                    .await
            }
            None => Ok(created),
        }
    }

    async fn update_collection(
        &self,
        collection_id: &str,
        title: Option<&str>,
        summary: Option<&str>,
    ) -> AdapterResult<Collection> {
        let mut query = Vec::new();
        if let Some(title) = title {
            query.push(("title.value", title.to_string()));
            query.push(("title.locked", "1".to_string()));
        }
        if let Some(summary) = summary {
            query.push(("summary.value", summary.to_string()));
            query.push(("summary.locked", "1".to_string()));
        }
        self.put(&format!("/library/metadata/{}", seg(collection_id)), &query)
            .await
            .map_err(relabel("collection", collection_id))?;
        self.get_collection(collection_id).await
    }

    async fn delete_collection(&self, collection_id: &str) -> AdapterResult<()> {
        self.delete(&format!("/library/collections/{}", seg(collection_id)))
            .await
            .map_err(relabel("collection", collection_id))
            .map(|_| ())
    }

    async fn add_to_collection(&self, collection_id: &str, item_id: &str) -> AdapterResult<()> {
        self.get_item(item_id).await?;
        let uri = self.item_uri(&[item_id.to_string()]).await?;
        self.put(
            &format!("/library/collections/{}/items", seg(collection_id)),
            &[("uri", uri)],
        )
        .await
        .map_err(relabel("collection", collection_id))
        .map(|_| ())
    }

    async fn remove_from_collection(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> AdapterResult<()> {
        self.delete(&format!(
            "/library/collections/{}/items/{}",
            collection_id, item_id
        ))
        .await
        .map_err(relabel("item", item_id))
        .map(|_| ())
    }

    async fn sessions(&self) -> AdapterResult<Vec<Session>> {
        let body = self.get("/status/sessions", &[]).await?;
        Ok(array(container(&body), "Metadata")
            .iter()
            .map(parse_session)
            .collect())
    }

    async fn clients(&self) -> AdapterResult<Vec<Client>> {
        let body = self.get("/clients", &[]).await?;
        Ok(array(container(&body), "Server")
            .iter()
            .map(|c| Client {
                id: text(c, "machineIdentifier").unwrap_or_default(),
                name: text(c, "name").unwrap_or_default(),
                product: text(c, "product"),
                platform: text(c, "platform"),
                version: text(c, "version"),
                address: text(c, "address"),
                port: number_u64(c, "port").and_then(|p| u16::try_from(p).ok()),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn send_command(&self, client_id: &str, command: PlaybackCommand) -> AdapterResult<()> {
        let command_id = self.command_id.fetch_add(1, Ordering::Relaxed);
        let mut query = vec![("commandID", command_id.to_string())];
        match &command {
            PlaybackCommand::Play {
                media_key: Some(key),
                offset,
            } => {
                query.push(("key", format!("/library/metadata/{}", seg(key))));
                query.push(("machineIdentifier", self.machine_identifier().await?));
                if let Some(offset) = offset {
                    query.push(("offset", offset.to_string()));
                }
            }
            PlaybackCommand::SeekTo { offset_ms } => {
                query.push(("offset", offset_ms.to_string()));
            }
            _ => {}
        }

        let path = format!("/player/playback/{}", command.endpoint());
        let headers = [("X-Plex-Target-Client-Identifier", client_id.to_string())];
        self.send(Method::GET, &path, &query, &headers)
            .await
            .map_err(relabel("client", client_id))
            .map(|_| ())
    }

    async fn list_users(&self) -> AdapterResult<Vec<User>> {
        let body = self.get("/accounts", &[]).await?;
        Ok(array(container(&body), "Account")
            .iter()
            .filter(|a| number_u64(a, "id").unwrap_or(0) > 0)
            .map(|a| {
                let id = text(a, "id").unwrap_or_default();
                User {
                    role: Some(if id == "1" { "owner" } else { "user" }.to_string()),
                    id,
                    username: text(a, "name").unwrap_or_default(),
                    email: text(a, "email"),
                    restricted: flag(a, "restricted"),
                }
            })
            .collect())
    }

    async fn get_user(&self, user_id: &str) -> AdapterResult<User> {
        self.list_users()
            .await?
            .into_iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| AdapterError::not_found("user", user_id))
    }

    async fn server_status(&self) -> AdapterResult<ServerStatus> {
        let root = self.get("/", &[]).await?;
        let c = container(&root);
        let sessions = self.get("/status/sessions", &[]).await?;
        Ok(ServerStatus {
            name: text(c, "friendlyName").unwrap_or_default(),
            version: text(c, "version").unwrap_or_default(),
            platform: text(c, "platform"),
            machine_identifier: text(c, "machineIdentifier"),
            active_sessions: number_u64(container(&sessions), "size").unwrap_or(0),
            active_transcodes: number_u64(c, "transcoderActiveVideoSessions").unwrap_or(0),
        })
    }

    async fn health(&self) -> AdapterResult<ServerHealth> {
        let started = Instant::now();
        let checked_at = chrono::Utc::now().to_rfc3339();
        match self.server_status().await {
            Ok(status) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                let mut warnings = Vec::new();
                if latency_ms > 2_000 {
                    warnings.push(format!("slow response: {} ms", latency_ms));
                }
                if status.active_transcodes > 0 && status.active_transcodes >= status.active_sessions {
                    warnings.push("every active session is transcoding".to_string());
                }
                Ok(ServerHealth {
                    reachable: true,
                    latency_ms,
                    version: Some(status.version),
                    active_sessions: status.active_sessions,
                    active_transcodes: status.active_transcodes,
                    warnings,
                    checked_at,
                })
            }
            Err(AdapterError::Upstream(reason)) => Ok(ServerHealth {
                reachable: false,
                latency_ms: started.elapsed().as_millis() as u64,
                version: None,
                active_sessions: 0,
                active_transcodes: 0,
                warnings: vec![reason],
                checked_at,
            }),
            Err(other) => Err(other),
        }
    }

    #[instrument(skip(self, _options))]
    async fn run_maintenance(
        &self,
        task: MaintenanceTask,
        _options: Map<String, Value>,
    ) -> AdapterResult<MaintenanceReport> {
        let started = Instant::now();
        let mut details = Map::new();
        let mut warnings = Vec::new();

        match task {
            MaintenanceTask::Optimize => {
                self.put("/library/optimize", &[("async", "1".to_string())])
                    .await?;
            }
            MaintenanceTask::CleanBundles => {
                self.put("/library/clean/bundles", &[]).await?;
            }
            MaintenanceTask::EmptyTrash => {
                let libraries = self.list_libraries().await?;
                let mut emptied = 0u64;
                for library in &libraries {
                    match self.empty_trash(&library.id).await {
                        Ok(()) => emptied += 1,
                        Err(e) => warnings.push(format!("{}: {}", library.title, e)),
                    }
                }
                details.insert("libraries".to_string(), Value::from(emptied));
            }
            MaintenanceTask::RefreshLibraries => {
                self.get("/library/sections/all/refresh", &[]).await?;
            }
            MaintenanceTask::BackupDatabase => {
                self.post("/butler/BackupDatabase", &[]).await?;
            }
            MaintenanceTask::DeepAnalysis => {
                self.post("/butler/DeepMediaAnalysis", &[]).await?;
            }
        }

        let status = if warnings.is_empty() {
            "completed"
        } else {
            "completed_with_warnings"
        };
        Ok(MaintenanceReport {
            task,
            status: status.to_string(),
            details,
            duration_ms: started.elapsed().as_millis() as u64,
            warnings,
        })
    }

    async fn transcode_settings(&self) -> AdapterResult<Map<String, Value>> {
        Ok(self
            .prefs()
            .await?
            .into_iter()
            .filter(|(id, _)| id.starts_with("Transcoder"))
            .collect())
    }

    async fn update_transcode_settings(
        &self,
        settings: Map<String, Value>,
    ) -> AdapterResult<Map<String, Value>> {
        let prefs: Vec<(&str, String)> = settings
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    Value::Bool(true) => "1".to_string(),
                    Value::Bool(false) => "0".to_string(),
                    other => other.to_string(),
                };
                (k.as_str(), value)
            })
            .collect();
        self.set_prefs(&prefs).await?;
        self.transcode_settings().await
    }

    async fn transcode_sessions(&self) -> AdapterResult<Vec<TranscodeSession>> {
        let body = self.get("/transcode/sessions", &[]).await?;
        Ok(array(container(&body), "TranscodeSession")
            .iter()
            .map(|t| TranscodeSession {
                id: text(t, "key").unwrap_or_default(),
                progress: number_f64(t, "progress"),
                speed: number_f64(t, "speed"),
                throttled: flag(t, "throttled"),
                video_decision: text(t, "videoDecision"),
                audio_decision: text(t, "audioDecision"),
                container: text(t, "container"),
            })
            .collect())
    }

    async fn bandwidth(&self, time_range: &str) -> AdapterResult<BandwidthReport> {
        let timespan = match time_range {
            "hour" => 4,
            "week" => 2,
            "month" => 1,
            _ => 3,
        };
        let body = self
            .get(
                "/statistics/bandwidth",
                &[("timespan", timespan.to_string())],
            )
            .await?;

        let mut report = BandwidthReport {
            time_range: time_range.to_string(),
            total_bytes: 0,
            lan_bytes: 0,
            wan_bytes: 0,
            samples: 0,
        };
        for sample in array(container(&body), "StatisticsBandwidth") {
            let bytes = number_u64(sample, "bytes").unwrap_or(0);
            report.total_bytes += bytes;
            report.samples += 1;
            if flag(sample, "lan") {
                report.lan_bytes += bytes;
            } else {
                report.wan_bytes += bytes;
            }
        }
        Ok(report)
    }

    async fn throttling(&self) -> AdapterResult<ThrottleSettings> {
        let prefs = self.prefs().await?;
        let rate = |key: &str| {
            prefs
                .iter()
                .find(|(id, _)| id == key)
                .and_then(|(_, v)| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
        };
        let download_limit = rate("WanPerStreamMaxUploadRate");
        let upload_limit = rate("WanTotalMaxUploadRate");
        Ok(ThrottleSettings {
            enabled: download_limit.unwrap_or(0) > 0 || upload_limit.unwrap_or(0) > 0,
            download_limit,
            upload_limit,
        })
    }

    async fn set_throttling(&self, settings: ThrottleSettings) -> AdapterResult<ThrottleSettings> {
        let (per_stream, total) = if settings.enabled {
            (
                settings.download_limit.unwrap_or(0),
                settings.upload_limit.unwrap_or(0),
            )
        } else {
            (0, 0)
        };
        self.set_prefs(&[
            ("WanPerStreamMaxUploadRate", per_stream.to_string()),
            ("WanTotalMaxUploadRate", total.to_string()),
        ])
        .await?;
        self.throttling().await
    }

    async fn list_profiles(&self) -> AdapterResult<Vec<QualityProfile>> {
        Ok(self.profiles.read().await.values().cloned().collect())
    }

    async fn get_profile(&self, name: &str) -> AdapterResult<QualityProfile> {
        self.profiles
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| AdapterError::not_found("profile", name))
    }

    async fn save_profile(&self, profile: QualityProfile) -> AdapterResult<QualityProfile> {
        let mut profiles = self.profiles.write().await;
        if profile.is_default {
            for existing in profiles.values_mut() {
                existing.is_default = false;
            }
        }
        profiles.insert(profile.name.clone(), profile.clone());
        Ok(profile)
    }

    async fn delete_profile(&self, name: &str) -> AdapterResult<()> {
        self.profiles
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AdapterError::not_found("profile", name))
    }

    async fn set_default_profile(&self, name: &str) -> AdapterResult<QualityProfile> {
        let mut profiles = self.profiles.write().await;
        if !profiles.contains_key(name) {
            return Err(AdapterError::not_found("profile", name));
        }
        let mut chosen = None;
        for (key, profile) in profiles.iter_mut() {
            profile.is_default = key == name;
            if profile.is_default {
                chosen = Some(profile.clone());
            }
        }
        chosen.ok_or_else(|| AdapterError::not_found("profile", name))
    }
}

// ============================================================================
// Response decoding
// ============================================================================

/// Map an HTTP status to an adapter error, `None` on success.
fn status_error(status: StatusCode, path: &str) -> Option<AdapterError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AdapterError::auth(format!("server rejected the token ({})", status))
        }
        StatusCode::NOT_FOUND => AdapterError::not_found("resource", path),
        _ => AdapterError::upstream(format!("{} returned {}", path, status)),
    })
}

/// Give a generic 404 the entity name the caller knows about.
fn relabel<'a>(entity: &'a str, id: &'a str) -> impl FnOnce(AdapterError) -> AdapterError + 'a {
    move |err| match err {
        AdapterError::NotFound { .. } => AdapterError::not_found(entity, id),
        other => other,
    }
}

fn container(body: &Value) -> &Value {
    body.get("MediaContainer").unwrap_or(&EMPTY)
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_u64(value: &Value, key: &str) -> Option<u64> {
    match value.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn number_i64(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn number_f64(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn flag(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        Some(Value::String(s)) => s == "1" || s == "true",
        _ => false,
    }
}

fn tags(value: &Value, key: &str) -> Vec<String> {
    array(value, key)
        .iter()
        .filter_map(|t| text(t, "tag"))
        .collect()
}

fn parse_library(d: &Value) -> Library {
    Library {
        id: text(d, "key").unwrap_or_default(),
        title: text(d, "title").unwrap_or_default(),
        library_type: text(d, "type").unwrap_or_default(),
        agent: text(d, "agent"),
        scanner: text(d, "scanner"),
        language: text(d, "language"),
        uuid: text(d, "uuid"),
        locations: array(d, "Location")
            .iter()
            .filter_map(|l| text(l, "path"))
            .collect(),
        item_count: None,
        updated_at: number_i64(d, "updatedAt"),
        scanned_at: number_i64(d, "scannedAt"),
    }
}

fn parse_item(m: &Value) -> MediaItem {
    MediaItem {
        id: text(m, "ratingKey").unwrap_or_default(),
        title: text(m, "title").unwrap_or_default(),
        media_type: text(m, "type").unwrap_or_default(),
        year: number_i64(m, "year"),
        summary: text(m, "summary"),
        guid: text(m, "guid"),
        rating: number_f64(m, "rating"),
        audience_rating: number_f64(m, "audienceRating"),
        content_rating: text(m, "contentRating"),
        studio: text(m, "studio"),
        duration: number_u64(m, "duration"),
        view_count: number_u64(m, "viewCount"),
        added_at: number_i64(m, "addedAt"),
        originally_available_at: text(m, "originallyAvailableAt"),
        library_id: text(m, "librarySectionID"),
        genres: tags(m, "Genre"),
        directors: tags(m, "Director"),
        actors: tags(m, "Role"),
        countries: tags(m, "Country"),
        thumb: text(m, "thumb"),
    }
}

fn parse_playlist(m: &Value) -> Playlist {
    Playlist {
        id: text(m, "ratingKey").unwrap_or_default(),
        title: text(m, "title").unwrap_or_default(),
        playlist_type: text(m, "playlistType").unwrap_or_default(),
        summary: text(m, "summary").filter(|s| !s.is_empty()),
        smart: flag(m, "smart"),
        item_count: number_u64(m, "leafCount").unwrap_or(0),
        duration: number_u64(m, "duration"),
        created_at: number_i64(m, "addedAt"),
        updated_at: number_i64(m, "updatedAt"),
    }
}

fn parse_collection(m: &Value, library_id: Option<&str>) -> Collection {
    Collection {
        id: text(m, "ratingKey").unwrap_or_default(),
        title: text(m, "title").unwrap_or_default(),
        summary: text(m, "summary").filter(|s| !s.is_empty()),
        library_id: library_id
            .map(str::to_string)
            .or_else(|| text(m, "librarySectionID")),
        item_count: number_u64(m, "childCount").unwrap_or(0),
        smart: flag(m, "smart"),
    }
}

fn parse_session(m: &Value) -> Session {
    let player = m.get("Player").unwrap_or(&EMPTY);
    let user = m.get("User").unwrap_or(&EMPTY);
    Session {
        id: m
            .get("Session")
            .and_then(|s| text(s, "id"))
            .or_else(|| text(m, "sessionKey"))
            .unwrap_or_default(),
        title: text(m, "title").unwrap_or_default(),
        media_type: text(m, "type").unwrap_or_default(),
        grandparent_title: text(m, "grandparentTitle"),
        user: text(user, "title"),
        player: text(player, "title"),
        player_id: text(player, "machineIdentifier"),
        state: text(player, "state"),
        duration: number_u64(m, "duration"),
        view_offset: number_u64(m, "viewOffset"),
        transcoding: m.get("TranscodeSession").is_some(),
    }
}

fn playlist_kind(media_type: &str) -> &'static str {
    match media_type {
        "track" | "album" | "artist" => "audio",
        "photo" => "photo",
        _ => "video",
    }
}

fn section_type_code(library_type: &str) -> u8 {
    match library_type {
        "show" => 2,
        "artist" | "music" => 8,
        "photo" => 13,
        _ => 1,
    }
}

/// Server-side filters for a section listing.
fn section_filters(query: &SearchQuery) -> Vec<(&'static str, String)> {
    let mut filters = Vec::new();
    if let Some(title) = query.title.as_ref().or(query.query.as_ref()) {
        filters.push(("title", title.clone()));
    }
    if let Some(year) = query.year {
        filters.push(("year", year.to_string()));
    }
    let multi = [
        ("genre", &query.genres),
        ("actor", &query.actors),
        ("director", &query.directors),
        ("studio", &query.studios),
        ("country", &query.countries),
        ("collection", &query.collections),
        ("contentRating", &query.content_ratings),
    ];
    for (key, values) in multi {
        if !values.is_empty() {
            filters.push((key, values.join(",")));
        }
    }
    if query.unwatched == Some(true) {
        filters.push(("unwatched", "1".to_string()));
    }
    if let Some(sort) = &query.sort {
        filters.push(("sort", sort.clone()));
    }
    filters
}

/// Filters the server cannot apply itself.
fn matches_query(item: &MediaItem, query: &SearchQuery) -> bool {
    if let Some(kind) = &query.media_type {
        if !item.media_type.eq_ignore_ascii_case(kind) {
            return false;
        }
    }
    let year = item.year.unwrap_or(0);
    if query.min_year.is_some_and(|min| year < min) || query.max_year.is_some_and(|max| year > max)
    {
        return false;
    }
    let rating = item.rating.or(item.audience_rating).unwrap_or(0.0);
    if query.min_rating.is_some_and(|min| rating < min)
        || query.max_rating.is_some_and(|max| rating > max)
    {
        return false;
    }
    if query.unwatched == Some(true) && !item.is_unwatched() {
        return false;
    }
    true
}
