//! Domain definitions.
//!
//! One file per domain. Each exposes a `router()` that builds the domain's
//! [`DomainRouter`](super::dispatch::DomainRouter) from its operation specs;
//! handlers live next to the spec that declares them.

pub mod collections;
pub mod help;
pub mod integration;
pub mod library;
pub mod media;
pub mod metadata;
pub mod organization;
pub mod performance;
pub mod playlist;
pub mod quality;
pub mod reporting;
pub mod search;
pub mod server;
pub mod streaming;
pub mod user;

use serde_json::{Map, Value, json};

use super::params::Params;
use super::spec::{OperationOutput, OperationResult};
use crate::adapter::Page;

/// Acknowledgement for actions that return no record.
pub(crate) fn done(message: impl Into<String>, extra: Value) -> OperationResult {
    let mut body = Map::new();
    body.insert("message".into(), Value::String(message.into()));
    if let Value::Object(extra) = extra {
        body.extend(extra);
    }
    Ok(OperationOutput::value(Value::Object(body)))
}

/// Paging window from the usual `limit`/`offset` parameters.
pub(crate) fn page(params: &Params) -> Page {
    let default = Page::default();
    Page {
        offset: params.uint("offset").unwrap_or(default.offset),
        limit: params.uint("limit").unwrap_or(default.limit),
    }
}

/// `{results, total}` body, counted by `total`.
pub(crate) fn results<T: serde::Serialize>(items: &[T], total: u64) -> OperationResult {
    let body = json!({
        "results": serde_json::to_value(items)?,
        "total": total,
    });
    Ok(OperationOutput::value(body).with_count(total as usize))
}
