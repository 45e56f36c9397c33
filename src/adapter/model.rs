//! Domain data returned by the media server.
//!
//! These are plain serializable records. Handlers pass them through to the
//! response envelope as JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A library section (Movies, TV Shows, Music...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub library_type: String,
    pub agent: Option<String>,
    pub scanner: Option<String>,
    pub language: Option<String>,
    pub uuid: Option<String>,
    pub locations: Vec<String>,
    pub item_count: Option<u64>,
    pub updated_at: Option<i64>,
    pub scanned_at: Option<i64>,
}

/// Fields for creating a library section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLibrary {
    pub name: String,
    pub library_type: String,
    pub path: String,
    pub agent: String,
    pub scanner: String,
    pub language: String,
    pub thumb: Option<String>,
}

/// Partial update of library settings. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryUpdate {
    pub name: Option<String>,
    pub agent: Option<String>,
    pub scanner: Option<String>,
    pub language: Option<String>,
    pub thumb: Option<String>,
}

impl LibraryUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.agent.is_none()
            && self.scanner.is_none()
            && self.language.is_none()
            && self.thumb.is_none()
    }
}

/// A playable or browsable item (movie, episode, album, track...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub year: Option<i64>,
    pub summary: Option<String>,
    pub guid: Option<String>,
    pub rating: Option<f64>,
    pub audience_rating: Option<f64>,
    pub content_rating: Option<String>,
    pub studio: Option<String>,
    /// Duration in milliseconds.
    pub duration: Option<u64>,
    pub view_count: Option<u64>,
    pub added_at: Option<i64>,
    pub originally_available_at: Option<String>,
    pub library_id: Option<String>,
    pub genres: Vec<String>,
    pub directors: Vec<String>,
    pub actors: Vec<String>,
    pub countries: Vec<String>,
    pub thumb: Option<String>,
}

impl MediaItem {
    /// Whether the item has never been played.
    pub fn is_unwatched(&self) -> bool {
        self.view_count.unwrap_or(0) == 0
    }

    /// Whether the item is still matched only to local files.
    pub fn is_unmatched(&self) -> bool {
        match &self.guid {
            None => true,
            Some(guid) => guid.starts_with("local://"),
        }
    }
}

/// Paging window for item listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
        }
    }
}

/// Filters for item searches. Empty fields are not applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub library_id: Option<String>,
    pub media_type: Option<String>,
    pub title: Option<String>,
    pub year: Option<i64>,
    pub min_year: Option<i64>,
    pub max_year: Option<i64>,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub directors: Vec<String>,
    pub studios: Vec<String>,
    pub countries: Vec<String>,
    pub collections: Vec<String>,
    pub content_ratings: Vec<String>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub unwatched: Option<bool>,
    pub sort: Option<String>,
    pub page: Page,
}

/// A search hit list together with the number of matches before paging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub items: Vec<MediaItem>,
    pub total: u64,
}

/// A candidate metadata match for an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub guid: String,
    pub name: String,
    pub year: Option<i64>,
    pub score: Option<i64>,
}

/// A playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub playlist_type: String,
    pub summary: Option<String>,
    pub smart: bool,
    pub item_count: u64,
    /// Total duration in milliseconds.
    pub duration: Option<u64>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// A library collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub library_id: Option<String>,
    pub item_count: u64,
    pub smart: bool,
}

/// An active playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub media_type: String,
    pub grandparent_title: Option<String>,
    pub user: Option<String>,
    pub player: Option<String>,
    pub player_id: Option<String>,
    pub state: Option<String>,
    pub duration: Option<u64>,
    pub view_offset: Option<u64>,
    pub transcoding: bool,
}

/// A playback client (player device).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub product: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub address: Option<String>,
    pub port: Option<u16>,
}

/// A remote-control command sent to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackCommand {
    Play { media_key: Option<String>, offset: Option<u64> },
    Pause,
    Stop,
    SkipNext,
    SkipPrevious,
    StepForward,
    StepBack,
    SeekTo { offset_ms: u64 },
}

impl PlaybackCommand {
    /// Remote-control endpoint name for this command.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Play { media_key: Some(_), .. } => "playMedia",
            Self::Play { .. } => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::SkipNext => "skipNext",
            Self::SkipPrevious => "skipPrevious",
            Self::StepForward => "stepForward",
            Self::StepBack => "stepBack",
            Self::SeekTo { .. } => "seekTo",
        }
    }
}

/// Server account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub restricted: bool,
}

/// Fields for creating an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
    pub restricted: bool,
}

/// Partial account update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub restricted: Option<bool>,
}

/// Snapshot of the server's identity and load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub name: String,
    pub version: String,
    pub platform: Option<String>,
    pub machine_identifier: Option<String>,
    pub active_sessions: u64,
    pub active_transcodes: u64,
}

/// Health probe result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerHealth {
    pub reachable: bool,
    pub latency_ms: u64,
    pub version: Option<String>,
    pub active_sessions: u64,
    pub active_transcodes: u64,
    pub warnings: Vec<String>,
    pub checked_at: String,
}

/// Server-wide maintenance tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceTask {
    Optimize,
    CleanBundles,
    EmptyTrash,
    RefreshLibraries,
    BackupDatabase,
    DeepAnalysis,
}

impl MaintenanceTask {
    pub const NAMES: &'static [&'static str] = &[
        "optimize",
        "clean_bundles",
        "empty_trash",
        "refresh_libraries",
        "backup_database",
        "deep_analysis",
    ];

    /// Parse a task from its snake_case name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "optimize" => Some(Self::Optimize),
            "clean_bundles" => Some(Self::CleanBundles),
            "empty_trash" => Some(Self::EmptyTrash),
            "refresh_libraries" => Some(Self::RefreshLibraries),
            "backup_database" => Some(Self::BackupDatabase),
            "deep_analysis" => Some(Self::DeepAnalysis),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Optimize => "optimize",
            Self::CleanBundles => "clean_bundles",
            Self::EmptyTrash => "empty_trash",
            Self::RefreshLibraries => "refresh_libraries",
            Self::BackupDatabase => "backup_database",
            Self::DeepAnalysis => "deep_analysis",
        }
    }
}

/// Outcome of a maintenance task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub task: MaintenanceTask,
    pub status: String,
    pub details: Map<String, Value>,
    pub duration_ms: u64,
    pub warnings: Vec<String>,
}

/// An in-progress transcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeSession {
    pub id: String,
    pub progress: Option<f64>,
    pub speed: Option<f64>,
    pub throttled: bool,
    pub video_decision: Option<String>,
    pub audio_decision: Option<String>,
    pub container: Option<String>,
}

/// Aggregated bandwidth for a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandwidthReport {
    pub time_range: String,
    pub total_bytes: u64,
    pub lan_bytes: u64,
    pub wan_bytes: u64,
    pub samples: u64,
}

/// Streaming limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThrottleSettings {
    pub enabled: bool,
    /// Kbps, 0 means unlimited.
    pub download_limit: Option<u64>,
    /// Kbps, 0 means unlimited.
    pub upload_limit: Option<u64>,
}

/// A named quality/transcode profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub name: String,
    pub settings: Map<String, Value>,
    pub is_default: bool,
}

/// Library analysis summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryAnalysis {
    pub library_id: String,
    pub total_items: u64,
    pub unmatched: Vec<String>,
    pub missing_summary: u64,
    pub missing_year: u64,
    pub by_type: Map<String, Value>,
}

/// Result of an organize pass over a library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizeReport {
    pub library_id: String,
    pub dry_run: bool,
    pub candidates: Vec<String>,
    pub refreshed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maintenance_task_names_roundtrip() {
        for name in MaintenanceTask::NAMES {
            let task = MaintenanceTask::parse(name).unwrap();
            assert_eq!(task.name(), *name);
        }
        assert!(MaintenanceTask::parse("defrag").is_none());
    }

    #[test]
    fn test_playback_endpoint() {
        let play = PlaybackCommand::Play {
            media_key: Some("12".into()),
            offset: None,
        };
        assert_eq!(play.endpoint(), "playMedia");
        assert_eq!(PlaybackCommand::SeekTo { offset_ms: 5 }.endpoint(), "seekTo");
    }

    #[test]
    fn test_unmatched_detection() {
        let mut item = crate::adapter::testing::media_item("1", "Heat");
        item.guid = Some("local://1".into());
        assert!(item.is_unmatched());
        item.guid = Some("plex://movie/5d776".into());
        assert!(!item.is_unmatched());
    }

    #[test]
    fn test_library_update_is_empty() {
        assert!(LibraryUpdate::default().is_empty());
        let update = LibraryUpdate {
            thumb: Some("x".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
