//! Transcoder settings, bandwidth and streaming limits.

use serde_json::{Map, Value, json};

use super::{quality, server};
use crate::adapter::{QualityProfile, ThrottleSettings};
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

const TIME_RANGES: &[&str] = &["hour", "day", "week", "month"];

const QUALITY_LEVELS: &[&str] = &["original", "4k", "1080p", "720p", "480p", "360p"];

pub fn router() -> DomainRouter {
    DomainRouter::new("performance", "Transcoding, bandwidth and throttling")
        .operation(OperationSpec::new(
            "get_transcode_settings",
            "Current transcoder settings",
            get_transcode_settings,
        ))
        .operation(
            OperationSpec::new(
                "update_transcode_settings",
                "Change transcoder settings",
                update_transcode_settings,
            )
            .param(Param::required("settings", ParamKind::Object)),
        )
        .operation(OperationSpec::new(
            "get_transcoding_status",
            "Active transcode sessions",
            get_transcoding_status,
        ))
        .operation(
            OperationSpec::new("get_bandwidth", "Bandwidth over a time range", get_bandwidth)
                .param(Param::optional("time_range", ParamKind::Enum(TIME_RANGES)).default("day")),
        )
        .operation(
            OperationSpec::new("set_quality", "Store a quality level as a profile", set_quality)
                .param(quality::profile_name())
                .param(Param::required("quality", ParamKind::Enum(QUALITY_LEVELS)))
                .param(Param::optional("bitrate", ParamKind::NON_NEGATIVE).describe("Kbps")),
        )
        .operation(OperationSpec::new("get_throttling", "Streaming limits", get_throttling))
        .operation(
            OperationSpec::new("set_throttling", "Change streaming limits", set_throttling)
                .param(Param::required("enabled", ParamKind::Bool))
                .param(Param::optional("download_limit", ParamKind::NON_NEGATIVE))
                .param(Param::optional("upload_limit", ParamKind::NON_NEGATIVE)),
        )
        .operation(OperationSpec::new("list_profiles", "List quality profiles", quality::list_profiles))
        .operation(quality::create_spec())
        .operation(
            OperationSpec::new("delete_profile", "Delete a quality profile", quality::delete_profile)
                .param(quality::profile_name()),
        )
        .operation(OperationSpec::new("get_server_status", "Server identity and load", server::status))
        .operation(OperationSpec::new("get_server_info", "Status plus library overview", server::info))
}

async fn get_transcode_settings(ctx: HandlerContext) -> OperationResult {
    Ok(OperationOutput::value(Value::Object(
        ctx.server.transcode_settings().await?,
    )))
}

async fn update_transcode_settings(ctx: HandlerContext) -> OperationResult {
    let settings = ctx.params.object("settings").cloned().unwrap_or_default();
    Ok(OperationOutput::value(Value::Object(
        ctx.server.update_transcode_settings(settings).await?,
    )))
}

async fn get_transcoding_status(ctx: HandlerContext) -> OperationResult {
    OperationOutput::json(&ctx.server.transcode_sessions().await?)
}

async fn get_bandwidth(ctx: HandlerContext) -> OperationResult {
    let range = ctx.params.text("time_range").unwrap_or("day");
    OperationOutput::json(&ctx.server.bandwidth(range).await?)
}

async fn set_quality(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let mut settings = Map::new();
    settings.insert("quality".into(), json!(p.require("quality")?));
    if let Some(bitrate) = p.uint("bitrate") {
        settings.insert("bitrate".into(), json!(bitrate));
    }
    let profile = QualityProfile {
        name: p.require("profile_name")?.to_string(),
        settings,
        is_default: false,
    };
    OperationOutput::json(&ctx.server.save_profile(profile).await?)
}

async fn get_throttling(ctx: HandlerContext) -> OperationResult {
    OperationOutput::json(&ctx.server.throttling().await?)
}

async fn set_throttling(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let settings = ThrottleSettings {
        enabled: p.flag("enabled"),
        download_limit: p.uint("download_limit"),
        upload_limit: p.uint("upload_limit"),
    };
    OperationOutput::json(&ctx.server.set_throttling(settings).await?)
}
