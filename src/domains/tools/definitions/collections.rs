//! Collections inside library sections.

use futures::future::try_join_all;
use serde_json::json;

use super::done;
use crate::adapter::Collection;
use crate::domains::tools::batch::{run_batch, run_batch_in_order};
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::error::OperationError;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

fn collection_id() -> Param {
    Param::required("collection_id", ParamKind::Str)
}

fn items() -> Param {
    Param::required("items", ParamKind::StrList)
}

pub fn router() -> DomainRouter {
    DomainRouter::new("collections", "Group library items into collections")
        .operation(
            OperationSpec::new("list", "List collections of one or every library", list)
                .param(Param::optional("library_id", ParamKind::Str)),
        )
        .operation(OperationSpec::new("get", "Get a collection", get).param(collection_id()))
        .operation(
            OperationSpec::new("create", "Create a collection", create)
                .param(Param::required("library_id", ParamKind::Str))
                .param(Param::required("title", ParamKind::Str))
                .param(Param::optional("summary", ParamKind::Str)),
        )
        .operation(
            OperationSpec::new("update", "Edit a collection", update)
                .param(collection_id())
                .param(Param::optional("title", ParamKind::Str))
                .param(Param::optional("summary", ParamKind::Str))
                .any_of(&["title", "summary"]),
        )
        .operation(OperationSpec::new("delete", "Delete a collection", delete).param(collection_id()))
        .operation(
            OperationSpec::new("add_items", "Add items to a collection", add_items)
                .param(collection_id())
                .param(items()),
        )
        .operation(
            OperationSpec::new("remove_items", "Remove items from a collection", remove_items)
                .param(collection_id())
                .param(items()),
        )
}

async fn list(ctx: HandlerContext) -> OperationResult {
    let collections: Vec<Collection> = match ctx.params.text("library_id") {
        Some(id) => ctx.server.list_collections(id).await?,
        None => {
            let libraries = ctx.server.list_libraries().await?;
            let server = &ctx.server;
            try_join_all(
                libraries
                    .iter()
                    .map(|library| server.list_collections(&library.id)),
            )
            .await?
            .into_iter()
            .flatten()
            .collect()
        }
    };
    OperationOutput::json(&collections)
}

async fn get(ctx: HandlerContext) -> OperationResult {
    let collection = ctx.server.get_collection(ctx.params.require("collection_id")?).await?;
    OperationOutput::json(&collection)
}

async fn create(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let collection = ctx
        .server
        .create_collection(p.require("library_id")?, p.require("title")?, p.text("summary"))
        .await?;
    OperationOutput::json(&collection)
}

async fn update(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let collection = ctx
        .server
        .update_collection(p.require("collection_id")?, p.text("title"), p.text("summary"))
        .await?;
    OperationOutput::json(&collection)
}

async fn delete(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("collection_id")?;
    ctx.server.delete_collection(id).await?;
    done(format!("Collection {} deleted", id), json!({"collection_id": id}))
}

async fn add_items(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("collection_id")?;
    ctx.server.get_collection(id).await?;
    let server = &ctx.server;
    run_batch_in_order(ctx.params.list("items"), |item| async move {
        server
            .add_to_collection(id, &item)
            .await
            .map_err(OperationError::from)
    })
    .await
    .into_output()
}

async fn remove_items(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("collection_id")?;
    ctx.server.get_collection(id).await?;
    let server = &ctx.server;
    run_batch(ctx.params.list("items"), |item| async move {
        server
            .remove_from_collection(id, &item)
            .await
            .map_err(OperationError::from)
    })
    .await
    .into_output()
}
