//! Domains module containing the MCP-facing business logic.
//!
//! The server only exposes tools. Each Plex functional area (libraries,
//! playlists, streaming, ...) is one tool inside [`tools`].

pub mod tools;
