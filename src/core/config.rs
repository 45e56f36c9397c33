//! Configuration management for the MCP server.
//!
//! This module provides a centralized configuration structure populated from
//! environment variables (and a `.env` file, if present) on top of defaults.

use super::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::domains::tools::Timeouts;

/// Main configuration structure for the MCP server.
///
/// This struct contains all configurable aspects of the server, organized
/// by domain for clarity and maintainability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Media server connection.
    pub plex: PlexConfig,

    /// Handler deadlines.
    pub dispatch: DispatchConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,
}

/// Connection settings for the Plex Media Server.
#[derive(Clone, Serialize, Deserialize)]
pub struct PlexConfig {
    /// Base URL, e.g. `http://localhost:32400`.
    pub url: String,

    /// `X-Plex-Token` sent with every request.
    pub token: Option<String>,

    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
}

/// Custom Debug implementation to redact the token from logs.
impl std::fmt::Debug for PlexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlexConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl PlexConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:32400".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

/// Deadlines applied to operation handlers, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub timeout_secs: u64,
    pub long_running_timeout_secs: u64,
}

impl DispatchConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            default: Duration::from_secs(self.timeout_secs),
            long_running: Duration::from_secs(self.long_running_timeout_secs),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let timeouts = Timeouts::default();
        Self {
            timeout_secs: timeouts.default.as_secs(),
            long_running_timeout_secs: timeouts.long_running.as_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "plex-mcp-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            transport: TransportConfig::default(),
            plex: PlexConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

/// Parse a positive number of seconds, keeping `fallback` otherwise.
fn secs_var(name: &str, fallback: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                warn!("Ignoring {}={:?}: expected a positive number of seconds", name, raw);
                fallback
            }
        },
        Err(_) => fallback,
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Server settings are prefixed with `MCP_`, media server settings with
    /// `PLEX_`. For example: `MCP_SERVER_NAME`, `PLEX_URL`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        // Load transport configuration from environment
        config.transport = TransportConfig::from_env();

        if let Ok(url) = std::env::var("PLEX_URL").or_else(|_| std::env::var("PLEX_SERVER_URL")) {
            config.plex.url = url;
        }

        config.plex.token = std::env::var("PLEX_TOKEN").ok().filter(|t| !t.is_empty());

        config.plex.timeout_secs = secs_var("PLEX_TIMEOUT_SECS", config.plex.timeout_secs);
        config.dispatch.timeout_secs =
            secs_var("MCP_DISPATCH_TIMEOUT_SECS", config.dispatch.timeout_secs);
        config.dispatch.long_running_timeout_secs = secs_var(
            "MCP_LONG_RUNNING_TIMEOUT_SECS",
            config.dispatch.long_running_timeout_secs,
        );

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests run serially
    static ENV_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_plex_from_env() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("PLEX_URL", "http://plex.lan:32400");
            std::env::set_var("PLEX_TOKEN", "test_token_12345");
            std::env::set_var("PLEX_TIMEOUT_SECS", "5");
        }
        let config = Config::from_env();
        assert_eq!(config.plex.url, "http://plex.lan:32400");
        assert_eq!(config.plex.token.as_deref(), Some("test_token_12345"));
        assert_eq!(config.plex.timeout(), Duration::from_secs(5));
        unsafe {
            std::env::remove_var("PLEX_URL");
            std::env::remove_var("PLEX_TOKEN");
            std::env::remove_var("PLEX_TIMEOUT_SECS");
        }
    }

    #[test]
    fn test_legacy_url_variable() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        unsafe {
            std::env::remove_var("PLEX_URL");
            std::env::set_var("PLEX_SERVER_URL", "http://legacy:32400");
        }
        let config = Config::from_env();
        assert_eq!(config.plex.url, "http://legacy:32400");
        unsafe {
            std::env::remove_var("PLEX_SERVER_URL");
        }
    }

    #[test]
    fn test_bad_timeout_keeps_default() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("MCP_DISPATCH_TIMEOUT_SECS", "soon");
            std::env::set_var("MCP_LONG_RUNNING_TIMEOUT_SECS", "900");
        }
        let config = Config::from_env();
        let timeouts = config.dispatch.timeouts();
        assert_eq!(timeouts.default, Duration::from_secs(60));
        assert_eq!(timeouts.long_running, Duration::from_secs(900));
        unsafe {
            std::env::remove_var("MCP_DISPATCH_TIMEOUT_SECS");
            std::env::remove_var("MCP_LONG_RUNNING_TIMEOUT_SECS");
        }
    }

    #[test]
    fn test_token_redacted_in_debug() {
        let plex = PlexConfig {
            token: Some("super_secret_token".to_string()),
            ..PlexConfig::default()
        };
        let debug_str = format!("{:?}", plex);
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("super_secret_token"));
    }

    #[test]
    fn test_default_points_at_local_server() {
        let config = Config::default();
        assert_eq!(config.plex.url, "http://localhost:32400");
        assert!(config.plex.token.is_none());
    }
}
