//! Statistics and exportable reports.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::Utc;
use futures::future::try_join_all;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::adapter::{Library, MediaItem, Page};
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::error::OperationError;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

const FORMATS: &[&str] = &["json", "csv", "html"];

/// Items sampled per library for content reports.
const CONTENT_SAMPLE: u64 = 1000;

pub fn router() -> DomainRouter {
    DomainRouter::new("reporting", "Library statistics and exportable reports")
        .operation(
            OperationSpec::new("library_stats", "Item counts per library", library_stats)
                .param(Param::optional("library_id", ParamKind::Str)),
        )
        .operation(OperationSpec::new("usage_report", "Current playback usage", usage_report))
        .operation(
            OperationSpec::new("content_report", "Genres, decades and ratings", content_report)
                .param(Param::optional("library_id", ParamKind::Str)),
        )
        .operation(OperationSpec::new("user_activity", "Playback per account", user_activity))
        .operation(OperationSpec::new(
            "performance_report",
            "Load, transcoding and bandwidth",
            performance_report,
        ))
        .operation(
            OperationSpec::new("export_report", "Render a library report", export_report)
                .param(Param::required("format", ParamKind::Enum(FORMATS)))
                .param(Param::optional("library_id", ParamKind::Str))
                .param(
                    Param::optional("output_path", ParamKind::Str)
                        .describe("Write the report to this file instead of returning it"),
                )
                .long_running(),
        )
}

async fn libraries(ctx: &HandlerContext) -> Result<Vec<Library>, OperationError> {
    match ctx.params.text("library_id") {
        Some(id) => Ok(vec![ctx.server.get_library(id).await?]),
        None => Ok(ctx.server.list_libraries().await?),
    }
}

fn stats(libraries: &[Library]) -> Value {
    let rows: Vec<Value> = libraries
        .iter()
        .map(|l| {
            json!({
                "library_id": l.id,
                "title": l.title,
                "type": l.library_type,
                "items": l.item_count.unwrap_or(0),
                "locations": l.locations.len(),
            })
        })
        .collect();
    json!({
        "libraries": rows,
        "library_count": libraries.len(),
        "total_items": libraries.iter().filter_map(|l| l.item_count).sum::<u64>(),
    })
}

async fn library_stats(ctx: HandlerContext) -> OperationResult {
    Ok(OperationOutput::value(stats(&libraries(&ctx).await?)))
}

async fn usage_report(ctx: HandlerContext) -> OperationResult {
    let sessions = ctx.server.sessions().await?;
    let mut by_type: BTreeMap<&str, u64> = BTreeMap::new();
    for session in &sessions {
        *by_type.entry(session.media_type.as_str()).or_default() += 1;
    }
    Ok(OperationOutput::value(json!({
        "active_sessions": sessions.len(),
        "transcoding": sessions.iter().filter(|s| s.transcoding).count(),
        "by_type": by_type,
        "sessions": serde_json::to_value(&sessions)?,
    })))
}

fn content_summary(items: &[MediaItem]) -> Value {
    let mut genres: BTreeMap<&str, u64> = BTreeMap::new();
    let mut decades: BTreeMap<String, u64> = BTreeMap::new();
    let mut content_ratings: BTreeMap<&str, u64> = BTreeMap::new();
    for item in items {
        for genre in &item.genres {
            *genres.entry(genre.as_str()).or_default() += 1;
        }
        if let Some(year) = item.year {
            *decades.entry(format!("{}s", year - year.rem_euclid(10))).or_default() += 1;
        }
        if let Some(rating) = &item.content_rating {
            *content_ratings.entry(rating.as_str()).or_default() += 1;
        }
    }
    let rated: Vec<f64> = items.iter().filter_map(|i| i.rating).collect();
    let average = (!rated.is_empty()).then(|| rated.iter().sum::<f64>() / rated.len() as f64);
    json!({
        "items_sampled": items.len(),
        "unwatched": items.iter().filter(|i| i.is_unwatched()).count(),
        "unmatched": items.iter().filter(|i| i.is_unmatched()).count(),
        "average_rating": average,
        "genres": genres,
        "decades": decades,
        "content_ratings": content_ratings,
    })
}

async fn content_items(ctx: &HandlerContext, libraries: &[Library]) -> Result<Vec<MediaItem>, OperationError> {
    let page = Page {
        offset: 0,
        limit: CONTENT_SAMPLE,
    };
    let server = &ctx.server;
    let pages = try_join_all(libraries.iter().map(|l| server.library_items(&l.id, page))).await?;
    Ok(pages.into_iter().flat_map(|p| p.items).collect())
}

async fn content_report(ctx: HandlerContext) -> OperationResult {
    let libraries = libraries(&ctx).await?;
    let items = content_items(&ctx, &libraries).await?;
    Ok(OperationOutput::value(content_summary(&items)))
}

async fn user_activity(ctx: HandlerContext) -> OperationResult {
    let users = ctx.server.list_users().await?;
    let sessions = ctx.server.sessions().await?;
    let activity: Vec<Value> = users
        .iter()
        .map(|u| {
            let watching: Vec<&str> = sessions
                .iter()
                .filter(|s| s.user.as_deref() == Some(u.username.as_str()))
                .map(|s| s.title.as_str())
                .collect();
            json!({
                "user_id": u.id,
                "username": u.username,
                "active_sessions": watching.len(),
                "watching": watching,
            })
        })
        .collect();
    OperationOutput::json(&activity)
}

/// Serialize a section, or record why it is missing.
fn section<T: serde::Serialize>(
    name: &str,
    result: Result<T, crate::adapter::AdapterError>,
    warnings: &mut Vec<String>,
) -> Value {
    match result {
        Ok(value) => serde_json::to_value(value).unwrap_or(Value::Null),
        Err(err) => {
            warnings.push(format!("{} unavailable: {}", name, err));
            Value::Null
        }
    }
}

async fn performance_report(ctx: HandlerContext) -> OperationResult {
    let status = ctx.server.server_status().await?;
    let mut warnings = Vec::new();
    let transcodes = section("transcode sessions", ctx.server.transcode_sessions().await, &mut warnings);
    let bandwidth = section("bandwidth", ctx.server.bandwidth("day").await, &mut warnings);
    let throttling = section("throttling", ctx.server.throttling().await, &mut warnings);
    Ok(OperationOutput::value(json!({
        "server": serde_json::to_value(&status)?,
        "transcode_sessions": transcodes,
        "bandwidth": bandwidth,
        "throttling": throttling,
        "warnings": warnings,
        "generated_at": Utc::now().to_rfc3339(),
    })))
}

fn render_csv(stats: &Value) -> String {
    let mut out = String::from("library_id,title,type,items,locations\n");
    for row in stats["libraries"].as_array().into_iter().flatten() {
        let _ = writeln!(
            out,
            "{},{},{},{},{}",
            csv_field(&row["library_id"]),
            csv_field(&row["title"]),
            csv_field(&row["type"]),
            row["items"],
            row["locations"],
        );
    }
    out
}

fn csv_field(value: &Value) -> String {
    let text = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_html(report: &Value) -> String {
    let stats = &report["stats"];
    let mut out = String::from(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Plex library report</title></head><body>\n",
    );
    let _ = writeln!(out, "<h1>Plex library report</h1>");
    let _ = writeln!(
        out,
        "<p>Generated {}</p>",
        html_escape(report["generated_at"].as_str().unwrap_or_default())
    );
    out.push_str("<table>\n<tr><th>Library</th><th>Type</th><th>Items</th></tr>\n");
    for row in stats["libraries"].as_array().into_iter().flatten() {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            html_escape(row["title"].as_str().unwrap_or_default()),
            html_escape(row["type"].as_str().unwrap_or_default()),
            row["items"],
        );
    }
    let _ = writeln!(out, "</table>\n<p>Total items: {}</p>", stats["total_items"]);
    out.push_str("</body></html>\n");
    out
}

async fn export_report(ctx: HandlerContext) -> OperationResult {
    let format = ctx.params.require("format")?;
    let libraries = libraries(&ctx).await?;
    let items = content_items(&ctx, &libraries).await?;
    let report = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "stats": stats(&libraries),
        "content": content_summary(&items),
    });

    let rendered = match format {
        "csv" => render_csv(&report["stats"]),
        "html" => render_html(&report),
        _ => serde_json::to_string_pretty(&report)?,
    };

    match ctx.params.text("output_path") {
        Some(path) => {
            tokio::fs::write(path, &rendered).await.map_err(|e| {
                warn!("Failed to write report to {}: {}", path, e);
                OperationError::invalid("output_path", format!("cannot write file: {}", e))
            })?;
            info!("Report written to {}", path);
            Ok(OperationOutput::value(json!({
                "format": format,
                "output_path": path,
                "bytes": rendered.len(),
            })))
        }
        None => Ok(OperationOutput::value(json!({
            "format": format,
            "content": rendered,
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::classify::ErrorCode;
    use crate::domains::tools::definitions::testing::call;

    #[tokio::test]
    async fn test_library_stats_totals() {
        let env = call(&router(), StubServer::new().into_arc(), "library_stats", json!({})).await;
        let data = env.data().unwrap();
        assert_eq!(data["library_count"], json!(3));
        assert_eq!(data["total_items"], json!(9));
    }

    #[tokio::test]
    async fn test_content_report_decades() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "content_report",
            json!({"library_id": "1"}),
        )
        .await;
        assert_eq!(env.data().unwrap()["decades"]["2000s"], json!(3));
    }

    #[tokio::test]
    async fn test_performance_report_tolerates_gaps() {
        let env = call(&router(), StubServer::new().into_arc(), "performance_report", json!({})).await;
        assert!(env.is_success());
        assert_eq!(env.data().unwrap()["warnings"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_export_csv_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "export_report",
            json!({"format": "CSV", "output_path": path.to_str().unwrap()}),
        )
        .await;
        assert!(env.is_success());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("library_id,title"));
        assert!(written.contains("1,Movies,movie,3,1"));
    }

    #[tokio::test]
    async fn test_export_html_inline() {
        let env = call(&router(), StubServer::new().into_arc(), "export_report", json!({"format": "html"})).await;
        let content = env.data().unwrap()["content"].as_str().unwrap().to_string();
        assert!(content.contains("<td>Movies</td>"));
    }

    #[tokio::test]
    async fn test_export_unknown_format() {
        let env = call(&router(), StubServer::new().into_arc(), "export_report", json!({"format": "pdf"})).await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidParameter));
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field(&json!("a,b")), "\"a,b\"");
        assert_eq!(csv_field(&json!("say \"hi\"")), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field(&json!(3)), "3");
    }
}
