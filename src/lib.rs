//! Plex MCP Server Library
//!
//! This crate exposes a Plex Media Server to MCP clients as a small set of
//! grouped tools, one per functional domain (`plex_library`, `plex_playlist`,
//! `plex_streaming`, ...). Each tool takes an `operation` argument and answers
//! with a uniform response envelope.
//!
//! # Architecture
//!
//! - **adapter**: The `MediaServer` trait and its Plex implementation
//! - **core**: Configuration, error handling, the MCP handler and transports
//! - **domains**: The tools, their operation tables and dispatch
//!
//! # Example
//!
//! ```rust,no_run
//! use plex_mcp_server::{core::McpServer, core::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let server = McpServer::new(config)?;
//!     // Start the server...
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
