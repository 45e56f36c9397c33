//! In-memory media server used by dispatch tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::*;

/// Build a minimal media item.
pub fn media_item(id: &str, title: &str) -> MediaItem {
    MediaItem {
        id: id.to_string(),
        title: title.to_string(),
        media_type: "movie".to_string(),
        year: Some(2001),
        summary: Some(format!("{} summary", title)),
        guid: Some(format!("plex://movie/{}", id)),
        rating: Some(7.5),
        audience_rating: None,
        content_rating: None,
        studio: None,
        duration: Some(6_000_000),
        view_count: None,
        added_at: Some(1_700_000_000),
        originally_available_at: None,
        library_id: Some("1".to_string()),
        genres: Vec::new(),
        directors: Vec::new(),
        actors: Vec::new(),
        countries: Vec::new(),
        thumb: None,
    }
}

/// Build a minimal library.
pub fn library(id: &str, title: &str, library_type: &str) -> Library {
    Library {
        id: id.to_string(),
        title: title.to_string(),
        library_type: library_type.to_string(),
        agent: None,
        scanner: None,
        language: Some("en".to_string()),
        uuid: None,
        locations: vec![format!("/media/{}", title.to_lowercase())],
        item_count: Some(3),
        updated_at: None,
        scanned_at: None,
    }
}

pub fn playlist(id: &str, title: &str) -> Playlist {
    Playlist {
        id: id.to_string(),
        title: title.to_string(),
        playlist_type: "video".to_string(),
        summary: None,
        smart: false,
        item_count: 0,
        duration: None,
        created_at: None,
        updated_at: None,
    }
}

fn collection(id: &str, title: &str, library_id: &str) -> Collection {
    Collection {
        id: id.to_string(),
        title: title.to_string(),
        summary: None,
        library_id: Some(library_id.to_string()),
        item_count: 0,
        smart: false,
    }
}

/// Stub server with canned data.
///
/// Libraries, items, playlists and collections are fixed at construction. `fail_with`
/// forces every implemented call to return that error, `delay` makes each
/// call sleep first so cancellation can be observed.
pub struct StubServer {
    pub libraries: Vec<Library>,
    pub items: Vec<MediaItem>,
    pub playlists: Vec<Playlist>,
    pub collections: Vec<Collection>,
    pub fail_with: Option<AdapterError>,
    pub delay: Option<Duration>,
    calls: AtomicUsize,
    playlist_adds: Mutex<BTreeMap<String, Vec<String>>>,
}

impl StubServer {
    pub fn new() -> Self {
        Self {
            libraries: vec![
                library("1", "Movies", "movie"),
                library("2", "Shows", "show"),
                library("3", "Music", "music"),
            ],
            items: vec![
                media_item("100", "Heat"),
                media_item("101", "Ronin"),
                media_item("102", "Collateral"),
            ],
            playlists: vec![playlist("500", "Favourites")],
            collections: vec![collection("700", "Heist Films", "1")],
            fail_with: None,
            delay: None,
            calls: AtomicUsize::new(0),
            playlist_adds: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn failing(err: AdapterError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::new()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn into_arc(self) -> Arc<dyn MediaServer> {
        Arc::new(self)
    }

    /// Number of adapter calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> AdapterResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn find_item(&self, id: &str) -> AdapterResult<MediaItem> {
        self.items
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| AdapterError::not_found("item", id))
    }
}

impl Default for StubServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaServer for StubServer {
    async fn list_libraries(&self) -> AdapterResult<Vec<Library>> {
        self.enter().await?;
        Ok(self.libraries.clone())
    }

    async fn get_library(&self, library_id: &str) -> AdapterResult<Library> {
        self.enter().await?;
        self.libraries
            .iter()
            .find(|l| l.id == library_id)
            .cloned()
            .ok_or_else(|| AdapterError::not_found("library", library_id))
    }

    async fn scan_library(&self, library_id: &str, _force: bool) -> AdapterResult<()> {
        self.get_library(library_id).await.map(|_| ())
    }

    async fn refresh_library(&self, library_id: &str, _force: bool) -> AdapterResult<()> {
        self.get_library(library_id).await.map(|_| ())
    }

    async fn analyze_library(&self, library_id: &str) -> AdapterResult<LibraryAnalysis> {
        self.get_library(library_id).await?;
        Ok(LibraryAnalysis {
            library_id: library_id.to_string(),
            total_items: self.items.len() as u64,
            unmatched: vec!["101".to_string()],
            missing_summary: 0,
            missing_year: 0,
            by_type: Map::from_iter([("movie".to_string(), Value::from(self.items.len()))]),
        })
    }

    async fn library_items(&self, library_id: &str, page: Page) -> AdapterResult<SearchResults> {
        self.get_library(library_id).await?;
        let items: Vec<MediaItem> = self
            .items
            .iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(SearchResults {
            total: self.items.len() as u64,
            items,
        })
    }

    async fn search(&self, query: SearchQuery) -> AdapterResult<SearchResults> {
        self.enter().await?;
        let needle = query
            .query
            .or(query.title)
            .unwrap_or_default()
            .to_lowercase();
        let items: Vec<MediaItem> = self
            .items
            .iter()
            .filter(|i| i.title.to_lowercase().contains(&needle))
            .take(query.page.limit as usize)
            .cloned()
            .collect();
        Ok(SearchResults {
            total: items.len() as u64,
            items,
        })
    }

    async fn get_item(&self, item_id: &str) -> AdapterResult<MediaItem> {
        self.enter().await?;
        self.find_item(item_id)
    }

    async fn refresh_item(&self, item_id: &str, _force: bool) -> AdapterResult<()> {
        self.enter().await?;
        self.find_item(item_id).map(|_| ())
    }

    async fn list_playlists(&self) -> AdapterResult<Vec<Playlist>> {
        self.enter().await?;
        Ok(self.playlists.clone())
    }

    async fn get_playlist(&self, playlist_id: &str) -> AdapterResult<Playlist> {
        self.enter().await?;
        let adds = self
            .playlist_adds
            .lock()
            .map_err(|_| AdapterError::upstream("stub poisoned"))?;
        self.playlists
            .iter()
            .find(|p| p.id == playlist_id)
            .cloned()
            .map(|mut p| {
                p.item_count = adds.get(playlist_id).map(|v| v.len() as u64).unwrap_or(0);
                p
            })
            .ok_or_else(|| AdapterError::not_found("playlist", playlist_id))
    }

    async fn add_to_playlist(&self, playlist_id: &str, item_id: &str) -> AdapterResult<()> {
        self.enter().await?;
        self.find_item(item_id)?;
        let mut adds = self
            .playlist_adds
            .lock()
            .map_err(|_| AdapterError::upstream("stub poisoned"))?;
        adds.entry(playlist_id.to_string())
            .or_default()
            .push(item_id.to_string());
        Ok(())
    }

    async fn playlist_items(&self, playlist_id: &str) -> AdapterResult<Vec<MediaItem>> {
        self.get_playlist(playlist_id).await?;
        let adds = self
            .playlist_adds
            .lock()
            .map_err(|_| AdapterError::upstream("stub poisoned"))?;
        adds.get(playlist_id)
            .into_iter()
            .flatten()
            .map(|id| self.find_item(id))
            .collect()
    }

    async fn remove_from_playlist(&self, playlist_id: &str, item_id: &str) -> AdapterResult<()> {
        self.enter().await?;
        let mut adds = self
            .playlist_adds
            .lock()
            .map_err(|_| AdapterError::upstream("stub poisoned"))?;
        let entries = adds.entry(playlist_id.to_string()).or_default();
        let before = entries.len();
        entries.retain(|id| id != item_id);
        if entries.len() == before {
            return Err(AdapterError::not_found("item", item_id));
        }
        Ok(())
    }

    async fn list_collections(&self, library_id: &str) -> AdapterResult<Vec<Collection>> {
        self.get_library(library_id).await?;
        Ok(self
            .collections
            .iter()
            .filter(|c| c.library_id.as_deref() == Some(library_id))
            .cloned()
            .collect())
    }

    async fn get_collection(&self, collection_id: &str) -> AdapterResult<Collection> {
        self.enter().await?;
        self.collections
            .iter()
            .find(|c| c.id == collection_id)
            .cloned()
            .ok_or_else(|| AdapterError::not_found("collection", collection_id))
    }

    async fn add_to_collection(&self, collection_id: &str, item_id: &str) -> AdapterResult<()> {
        self.get_collection(collection_id).await?;
        self.find_item(item_id).map(|_| ())
    }

    async fn sessions(&self) -> AdapterResult<Vec<Session>> {
        self.enter().await?;
        Ok(Vec::new())
    }

    async fn clients(&self) -> AdapterResult<Vec<Client>> {
        self.enter().await?;
        Ok(vec![Client {
            id: "client-1".to_string(),
            name: "Living Room".to_string(),
            product: Some("Plex for Android (TV)".to_string()),
            platform: Some("Android".to_string()),
            version: None,
            address: Some("192.168.1.20".to_string()),
            port: Some(32500),
        }])
    }

    async fn list_users(&self) -> AdapterResult<Vec<User>> {
        self.enter().await?;
        Ok(vec![User {
            id: "1".to_string(),
            username: "owner".to_string(),
            email: Some("owner@example.com".to_string()),
            role: Some("owner".to_string()),
            restricted: false,
        }])
    }

    async fn recently_added(
        &self,
        _library_id: Option<&str>,
        limit: u64,
    ) -> AdapterResult<Vec<MediaItem>> {
        self.enter().await?;
        Ok(self.items.iter().take(limit as usize).cloned().collect())
    }

    async fn server_status(&self) -> AdapterResult<ServerStatus> {
        self.enter().await?;
        Ok(ServerStatus {
            name: "stub".to_string(),
            version: "1.40.0".to_string(),
            platform: Some("Linux".to_string()),
            machine_identifier: Some("abc123".to_string()),
            active_sessions: 0,
            active_transcodes: 0,
        })
    }

    async fn run_maintenance(
        &self,
        task: MaintenanceTask,
        _options: Map<String, Value>,
    ) -> AdapterResult<MaintenanceReport> {
        self.enter().await?;
        Ok(MaintenanceReport {
            task,
            status: "completed".to_string(),
            details: Map::new(),
            duration_ms: 0,
            warnings: Vec::new(),
        })
    }

    async fn send_command(&self, _client_id: &str, _command: PlaybackCommand) -> AdapterResult<()> {
        self.enter().await
    }
}
