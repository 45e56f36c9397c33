//! Playlists and their items.

use std::collections::BTreeMap;

use serde_json::json;

use super::done;
use crate::domains::tools::batch::{run_batch, run_batch_in_order};
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::error::OperationError;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

fn playlist_id() -> Param {
    Param::required("playlist_id", ParamKind::Str)
}

fn items() -> Param {
    Param::required("items", ParamKind::StrList).describe("Item rating keys")
}

pub fn router() -> DomainRouter {
    DomainRouter::new("playlist", "Create, edit and inspect playlists")
        .operation(OperationSpec::new("list", "List playlists", list))
        .operation(OperationSpec::new("get", "Get a playlist with its items", get).param(playlist_id()))
        .operation(
            OperationSpec::new("create", "Create a playlist from items", create)
                .param(Param::required("title", ParamKind::Str))
                .param(items())
                .param(Param::optional("description", ParamKind::Str)),
        )
        .operation(
            OperationSpec::new("update", "Rename or describe a playlist", update)
                .param(playlist_id())
                .param(Param::optional("title", ParamKind::Str))
                .param(Param::optional("description", ParamKind::Str))
                .any_of(&["title", "description"]),
        )
        .operation(OperationSpec::new("delete", "Delete a playlist", delete).param(playlist_id()))
        .operation(
            OperationSpec::new("add_items", "Append items to a playlist", add_items)
                .param(playlist_id())
                .param(items()),
        )
        .operation(
            OperationSpec::new("remove_items", "Remove items from a playlist", remove_items)
                .param(playlist_id())
                .param(items()),
        )
        .operation(
            OperationSpec::new("get_analytics", "Item count, duration and type mix", get_analytics)
                .param(playlist_id()),
        )
}

async fn list(ctx: HandlerContext) -> OperationResult {
    OperationOutput::json(&ctx.server.list_playlists().await?)
}

async fn get(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("playlist_id")?;
    let playlist = ctx.server.get_playlist(id).await?;
    let items = ctx.server.playlist_items(id).await?;
    Ok(OperationOutput::value(json!({
        "playlist": serde_json::to_value(&playlist)?,
        "items": serde_json::to_value(&items)?,
    })))
}

async fn create(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let playlist = ctx
        .server
        .create_playlist(p.require("title")?, &p.list("items"), p.text("description"))
        .await?;
    OperationOutput::json(&playlist)
}

async fn update(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let playlist = ctx
        .server
        .update_playlist(p.require("playlist_id")?, p.text("title"), p.text("description"))
        .await?;
    OperationOutput::json(&playlist)
}

async fn delete(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("playlist_id")?;
    ctx.server.delete_playlist(id).await?;
    done(format!("Playlist {} deleted", id), json!({"playlist_id": id}))
}

async fn add_items(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("playlist_id")?;
    // An unknown playlist fails the whole call rather than every item.
    ctx.server.get_playlist(id).await?;
    let server = &ctx.server;
    run_batch_in_order(ctx.params.list("items"), |item| async move {
        server
            .add_to_playlist(id, &item)
            .await
            .map_err(OperationError::from)
    })
    .await
    .into_output()
}

async fn remove_items(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("playlist_id")?;
    ctx.server.get_playlist(id).await?;
    let server = &ctx.server;
    run_batch(ctx.params.list("items"), |item| async move {
        server
            .remove_from_playlist(id, &item)
            .await
            .map_err(OperationError::from)
    })
    .await
    .into_output()
}

async fn get_analytics(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("playlist_id")?;
    let playlist = ctx.server.get_playlist(id).await?;
    let items = ctx.server.playlist_items(id).await?;

    let total_ms: u64 = items.iter().filter_map(|i| i.duration).sum();
    let mut by_type: BTreeMap<&str, u64> = BTreeMap::new();
    for item in &items {
        *by_type.entry(item.media_type.as_str()).or_default() += 1;
    }
    let rated: Vec<f64> = items.iter().filter_map(|i| i.rating).collect();
    let average_rating = if rated.is_empty() {
        None
    } else {
        Some(rated.iter().sum::<f64>() / rated.len() as f64)
    };

    Ok(OperationOutput::value(json!({
        "playlist_id": playlist.id,
        "title": playlist.title,
        "item_count": items.len(),
        "total_duration_ms": total_ms,
        "total_duration_minutes": total_ms / 60_000,
        "by_type": by_type,
        "average_rating": average_rating,
        "unwatched": items.iter().filter(|i| i.is_unwatched()).count(),
    })))
}
