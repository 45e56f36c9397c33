//! Media-server adapter.
//!
//! The dispatch core never talks HTTP itself. Every backend capability is an
//! async method on [`MediaServer`]; handlers receive an
//! `Arc<dyn MediaServer>` and await exactly one (or a batch of) these calls.
//!
//! - `error.rs` - [`AdapterError`], the failure kinds a backend may raise
//! - `model.rs` - plain data records returned by the backend
//! - `plex.rs` - [`PlexClient`], the reqwest-backed implementation
//!
//! Every capability has a default body that reports
//! [`AdapterError::Unsupported`], so a backend only implements what it can
//! actually do.

mod error;
pub mod model;
mod plex;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use error::{AdapterError, AdapterResult};
pub use model::*;
pub use plex::PlexClient;

fn unsupported<T>(capability: &str) -> AdapterResult<T> {
    Err(AdapterError::unsupported(format!(
        "{} is not available on this media server",
        capability
    )))
}

/// Async interface to the media server.
///
/// Implementations own their connection resources and must be safe to call
/// from many concurrent dispatches. They never retry on behalf of the caller
/// unless they know the request is idempotent.
#[async_trait]
pub trait MediaServer: Send + Sync {
    // ------------------------------------------------------------------
    // Libraries
    // ------------------------------------------------------------------

    async fn list_libraries(&self) -> AdapterResult<Vec<Library>> {
        unsupported("listing libraries")
    }

    async fn get_library(&self, _library_id: &str) -> AdapterResult<Library> {
        unsupported("reading a library")
    }

    async fn create_library(&self, _library: NewLibrary) -> AdapterResult<Library> {
        unsupported("creating libraries")
    }

    async fn update_library(
        &self,
        _library_id: &str,
        _update: LibraryUpdate,
    ) -> AdapterResult<Library> {
        unsupported("updating libraries")
    }

    async fn delete_library(&self, _library_id: &str) -> AdapterResult<()> {
        unsupported("deleting libraries")
    }

    async fn scan_library(&self, _library_id: &str, _force: bool) -> AdapterResult<()> {
        unsupported("scanning libraries")
    }

    async fn refresh_library(&self, _library_id: &str, _force: bool) -> AdapterResult<()> {
        unsupported("refreshing library metadata")
    }

    async fn optimize_library(&self, _library_id: &str) -> AdapterResult<()> {
        unsupported("optimizing libraries")
    }

    async fn empty_trash(&self, _library_id: &str) -> AdapterResult<()> {
        unsupported("emptying library trash")
    }

    async fn add_library_location(&self, _library_id: &str, _path: &str) -> AdapterResult<Library> {
        unsupported("adding library locations")
    }

    async fn remove_library_location(
        &self,
        _library_id: &str,
        _path: &str,
    ) -> AdapterResult<Library> {
        unsupported("removing library locations")
    }

    async fn clean_bundles(&self, _library_id: Option<&str>) -> AdapterResult<()> {
        unsupported("cleaning bundles")
    }

    async fn analyze_library(&self, _library_id: &str) -> AdapterResult<LibraryAnalysis> {
        unsupported("analyzing libraries")
    }

    async fn organize_library(
        &self,
        _library_id: &str,
        _dry_run: bool,
    ) -> AdapterResult<OrganizeReport> {
        unsupported("organizing libraries")
    }

    // ------------------------------------------------------------------
    // Items and search
    // ------------------------------------------------------------------

    async fn library_items(&self, _library_id: &str, _page: Page) -> AdapterResult<SearchResults> {
        unsupported("browsing library items")
    }

    async fn search(&self, _query: SearchQuery) -> AdapterResult<SearchResults> {
        unsupported("searching")
    }

    async fn get_item(&self, _item_id: &str) -> AdapterResult<MediaItem> {
        unsupported("reading item details")
    }

    async fn recently_added(
        &self,
        _library_id: Option<&str>,
        _limit: u64,
    ) -> AdapterResult<Vec<MediaItem>> {
        unsupported("listing recently added items")
    }

    async fn update_item(
        &self,
        _item_id: &str,
        _fields: Map<String, Value>,
    ) -> AdapterResult<MediaItem> {
        unsupported("editing item metadata")
    }

    async fn refresh_item(&self, _item_id: &str, _force: bool) -> AdapterResult<()> {
        unsupported("refreshing item metadata")
    }

    async fn match_candidates(&self, _item_id: &str) -> AdapterResult<Vec<MatchCandidate>> {
        unsupported("listing match candidates")
    }

    async fn apply_match(&self, _item_id: &str, _guid: &str) -> AdapterResult<MediaItem> {
        unsupported("fixing matches")
    }

    // ------------------------------------------------------------------
    // Playlists
    // ------------------------------------------------------------------

    async fn list_playlists(&self) -> AdapterResult<Vec<Playlist>> {
        unsupported("listing playlists")
    }

    async fn get_playlist(&self, _playlist_id: &str) -> AdapterResult<Playlist> {
        unsupported("reading playlists")
    }

    async fn playlist_items(&self, _playlist_id: &str) -> AdapterResult<Vec<MediaItem>> {
        unsupported("listing playlist items")
    }

    async fn create_playlist(
        &self,
        _title: &str,
        _items: &[String],
        _summary: Option<&str>,
    ) -> AdapterResult<Playlist> {
        unsupported("creating playlists")
    }

    async fn update_playlist(
        &self,
        _playlist_id: &str,
        _title: Option<&str>,
        _summary: Option<&str>,
    ) -> AdapterResult<Playlist> {
        unsupported("updating playlists")
    }

    async fn delete_playlist(&self, _playlist_id: &str) -> AdapterResult<()> {
        unsupported("deleting playlists")
    }

    async fn add_to_playlist(&self, _playlist_id: &str, _item_id: &str) -> AdapterResult<()> {
        unsupported("adding playlist items")
    }

    async fn remove_from_playlist(&self, _playlist_id: &str, _item_id: &str) -> AdapterResult<()> {
        unsupported("removing playlist items")
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    async fn list_collections(&self, _library_id: &str) -> AdapterResult<Vec<Collection>> {
        unsupported("listing collections")
    }

    async fn get_collection(&self, _collection_id: &str) -> AdapterResult<Collection> {
        unsupported("reading collections")
    }

    async fn create_collection(
        &self,
        _library_id: &str,
        _title: &str,
        _summary: Option<&str>,
    ) -> AdapterResult<Collection> {
        unsupported("creating collections")
    }

    async fn update_collection(
        &self,
        _collection_id: &str,
        _title: Option<&str>,
        _summary: Option<&str>,
    ) -> AdapterResult<Collection> {
        unsupported("updating collections")
    }

    async fn delete_collection(&self, _collection_id: &str) -> AdapterResult<()> {
        unsupported("deleting collections")
    }

    async fn add_to_collection(&self, _collection_id: &str, _item_id: &str) -> AdapterResult<()> {
        unsupported("adding collection items")
    }

    async fn remove_from_collection(
        &self,
        _collection_id: &str,
        _item_id: &str,
    ) -> AdapterResult<()> {
        unsupported("removing collection items")
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    async fn sessions(&self) -> AdapterResult<Vec<Session>> {
        unsupported("listing sessions")
    }

    async fn clients(&self) -> AdapterResult<Vec<Client>> {
        unsupported("listing clients")
    }

    async fn send_command(&self, _client_id: &str, _command: PlaybackCommand) -> AdapterResult<()> {
        unsupported("remote playback control")
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    async fn list_users(&self) -> AdapterResult<Vec<User>> {
        unsupported("listing users")
    }

    async fn get_user(&self, _user_id: &str) -> AdapterResult<User> {
        unsupported("reading users")
    }

    async fn create_user(&self, _user: NewUser) -> AdapterResult<User> {
        unsupported("creating users")
    }

    async fn update_user(&self, _user_id: &str, _update: UserUpdate) -> AdapterResult<User> {
        unsupported("updating users")
    }

    async fn delete_user(&self, _user_id: &str) -> AdapterResult<()> {
        unsupported("deleting users")
    }

    async fn set_user_permissions(
        &self,
        _user_id: &str,
        _permissions: Map<String, Value>,
    ) -> AdapterResult<User> {
        unsupported("changing user permissions")
    }

    // ------------------------------------------------------------------
    // Server administration
    // ------------------------------------------------------------------

    async fn server_status(&self) -> AdapterResult<ServerStatus> {
        unsupported("reading server status")
    }

    async fn health(&self) -> AdapterResult<ServerHealth> {
        unsupported("health checks")
    }

    async fn run_maintenance(
        &self,
        _task: MaintenanceTask,
        _options: Map<String, Value>,
    ) -> AdapterResult<MaintenanceReport> {
        unsupported("server maintenance")
    }

    async fn restart_server(&self) -> AdapterResult<()> {
        unsupported("restarting the server")
    }

    async fn update_server(&self) -> AdapterResult<()> {
        unsupported("updating the server")
    }

    // ------------------------------------------------------------------
    // Transcoding and quality
    // ------------------------------------------------------------------

    async fn transcode_settings(&self) -> AdapterResult<Map<String, Value>> {
        unsupported("reading transcoder settings")
    }

    async fn update_transcode_settings(
        &self,
        _settings: Map<String, Value>,
    ) -> AdapterResult<Map<String, Value>> {
        unsupported("changing transcoder settings")
    }

    async fn transcode_sessions(&self) -> AdapterResult<Vec<TranscodeSession>> {
        unsupported("listing transcode sessions")
    }

    async fn bandwidth(&self, _time_range: &str) -> AdapterResult<BandwidthReport> {
        unsupported("bandwidth statistics")
    }

    async fn throttling(&self) -> AdapterResult<ThrottleSettings> {
        unsupported("reading streaming limits")
    }

    async fn set_throttling(&self, _settings: ThrottleSettings) -> AdapterResult<ThrottleSettings> {
        unsupported("changing streaming limits")
    }

    async fn list_profiles(&self) -> AdapterResult<Vec<QualityProfile>> {
        unsupported("listing quality profiles")
    }

    async fn get_profile(&self, _name: &str) -> AdapterResult<QualityProfile> {
        unsupported("reading quality profiles")
    }

    async fn save_profile(&self, _profile: QualityProfile) -> AdapterResult<QualityProfile> {
        unsupported("saving quality profiles")
    }

    async fn delete_profile(&self, _name: &str) -> AdapterResult<()> {
        unsupported("deleting quality profiles")
    }

    async fn set_default_profile(&self, _name: &str) -> AdapterResult<QualityProfile> {
        unsupported("changing the default quality profile")
    }
}
