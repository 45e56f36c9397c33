//! Library sections: listing, lifecycle, scanning and folder management.

use serde_json::json;
use tracing::instrument;

use super::done;
use crate::adapter::{LibraryUpdate, NewLibrary};
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

pub const LIBRARY_TYPES: &[&str] = &["movie", "show", "music", "photo"];

/// Default metadata agent and scanner for a library type.
fn agent_defaults(library_type: &str) -> (&'static str, &'static str) {
    match library_type {
        "show" => ("tv.plex.agents.series", "Plex TV Series"),
        "music" => ("tv.plex.agents.music", "Plex Music"),
        "photo" => ("com.plexapp.agents.none", "Plex Photo Scanner"),
        _ => ("tv.plex.agents.movie", "Plex Movie"),
    }
}

fn library_id() -> Param {
    Param::required("library_id", ParamKind::Str).describe("Library section id")
}

pub fn router() -> DomainRouter {
    DomainRouter::new("library", "Manage library sections, scans and folders")
        .operation(OperationSpec::new("list", "List all libraries", list))
        .operation(OperationSpec::new("get", "Get one library", get).param(library_id()))
        .operation(
            OperationSpec::new("create", "Create a library", create)
                .param(Param::required("name", ParamKind::Str))
                .param(Param::required("library_type", ParamKind::Enum(LIBRARY_TYPES)))
                .param(Param::required("path", ParamKind::Str).describe("Root folder on the server"))
                .param(Param::optional("agent", ParamKind::Str))
                .param(Param::optional("scanner", ParamKind::Str))
                .param(Param::optional("language", ParamKind::Str).default("en"))
                .param(Param::optional("thumb", ParamKind::Str)),
        )
        .operation(
            OperationSpec::new("update", "Update library settings", update)
                .param(library_id())
                .param(Param::optional("name", ParamKind::Str))
                .param(Param::optional("agent", ParamKind::Str))
                .param(Param::optional("scanner", ParamKind::Str))
                .param(Param::optional("language", ParamKind::Str))
                .param(Param::optional("thumb", ParamKind::Str))
                .any_of(&["name", "agent", "scanner", "language", "thumb"]),
        )
        .operation(OperationSpec::new("delete", "Delete a library", delete).param(library_id()))
        .operation(
            OperationSpec::new("scan", "Scan library folders for new files", scan)
                .param(library_id())
                .param(Param::optional("force", ParamKind::Bool).default(false))
                .long_running(),
        )
        .operation(
            OperationSpec::new("refresh", "Refresh library metadata", refresh)
                .param(library_id())
                .long_running(),
        )
        .operation(
            OperationSpec::new("optimize", "Optimize a library", optimize)
                .param(library_id())
                .long_running(),
        )
        .operation(
            OperationSpec::new("empty_trash", "Remove deleted items", empty_trash).param(library_id()),
        )
        .operation(
            OperationSpec::new("add_location", "Add a folder to a library", add_location)
                .param(library_id())
                .param(Param::required("path", ParamKind::Str)),
        )
        .operation(
            OperationSpec::new("remove_location", "Remove a folder from a library", remove_location)
                .param(library_id())
                .param(Param::required("path", ParamKind::Str)),
        )
        .operation(
            OperationSpec::new("clean_bundles", "Delete unused metadata bundles", clean_bundles)
                .param(Param::optional("library_id", ParamKind::Str))
                .long_running(),
        )
}

async fn list(ctx: HandlerContext) -> OperationResult {
    let libraries = ctx.server.list_libraries().await?;
    OperationOutput::json(&libraries)
}

async fn get(ctx: HandlerContext) -> OperationResult {
    let library = ctx.server.get_library(ctx.params.require("library_id")?).await?;
    OperationOutput::json(&library)
}

#[instrument(skip(ctx))]
async fn create(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let library_type = p.require("library_type")?;
    let (agent, scanner) = agent_defaults(library_type);
    let library = NewLibrary {
        name: p.require("name")?.to_string(),
        library_type: library_type.to_string(),
        path: p.require("path")?.to_string(),
        agent: p.text("agent").unwrap_or(agent).to_string(),
        scanner: p.text("scanner").unwrap_or(scanner).to_string(),
        language: p.text("language").unwrap_or("en").to_string(),
        thumb: p.text("thumb").map(str::to_string),
    };
    let created = ctx.server.create_library(library).await?;
    OperationOutput::json(&created)
}

async fn update(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let field = |name: &str| p.text(name).map(str::to_string);
    let update = LibraryUpdate {
        name: field("name"),
        agent: field("agent"),
        scanner: field("scanner"),
        language: field("language"),
        thumb: field("thumb"),
    };
    let library = ctx.server.update_library(p.require("library_id")?, update).await?;
    OperationOutput::json(&library)
}

async fn delete(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("library_id")?;
    ctx.server.delete_library(id).await?;
    done(format!("Library {} deleted", id), json!({"library_id": id}))
}

async fn scan(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("library_id")?;
    let force = ctx.params.flag("force");
    ctx.server.scan_library(id, force).await?;
    done(
        format!("Scan started for library {}", id),
        json!({"library_id": id, "force": force}),
    )
}

async fn refresh(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("library_id")?;
    ctx.server.refresh_library(id, false).await?;
    done(format!("Metadata refresh started for library {}", id), json!({"library_id": id}))
}

async fn optimize(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("library_id")?;
    ctx.server.optimize_library(id).await?;
    done(format!("Library {} optimized", id), json!({"library_id": id}))
}

async fn empty_trash(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("library_id")?;
    ctx.server.empty_trash(id).await?;
    done(format!("Trash emptied for library {}", id), json!({"library_id": id}))
}

async fn add_location(ctx: HandlerContext) -> OperationResult {
    let library = ctx
        .server
        .add_library_location(ctx.params.require("library_id")?, ctx.params.require("path")?)
        .await?;
    OperationOutput::json(&library)
}

async fn remove_location(ctx: HandlerContext) -> OperationResult {
    let library = ctx
        .server
        .remove_library_location(ctx.params.require("library_id")?, ctx.params.require("path")?)
        .await?;
    OperationOutput::json(&library)
}

async fn clean_bundles(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.text("library_id");
    ctx.server.clean_bundles(id).await?;
    done("Unused bundles cleaned", json!({"library_id": id}))
}
