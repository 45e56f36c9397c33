//! Tools domain module.
//!
//! Every functional area of the media server is one MCP tool (`plex_<domain>`)
//! whose `operation` argument selects an entry in that domain's table.
//!
//! ## Architecture
//!
//! - `definitions/` - One file per domain: operation specs and their handlers
//! - `spec.rs` - Operation descriptors and the handler context
//! - `params.rs` - Parameter declarations and validation
//! - `dispatch.rs` - Per-domain routing, deadlines and cancellation
//! - `batch.rs` - Best-effort multi-item operations
//! - `classify.rs` / `envelope.rs` - Failure classification and the response shape
//! - `registry.rs` - Table of domains, shared by every transport
//! - `router.rs` - rmcp ToolRouter built from the registry
//!
//! ## Adding an Operation
//!
//! 1. Write the handler in the domain's file under `definitions/`
//! 2. Declare it with `OperationSpec::new` in that file's `router()`
//!
//! The registry, the tool schemas and the help domain pick it up from there.

mod batch;
mod classify;
pub mod definitions;
pub mod dispatch;
pub mod envelope;
mod error;
pub mod params;
mod registry;
pub mod router;
pub mod spec;

pub use classify::{ClassifiedFailure, ErrorCode};
pub use dispatch::{DomainRouter, Timeouts};
pub use envelope::ResponseEnvelope;
pub use error::OperationError;
pub use registry::ToolRegistry;
pub use router::build_tool_router;
