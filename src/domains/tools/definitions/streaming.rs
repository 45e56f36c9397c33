//! Active sessions and remote playback control.

use serde_json::json;

use super::done;
use crate::adapter::PlaybackCommand;
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::error::OperationError;
use crate::domains::tools::params::{Param, ParamKind, Params};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

const ACTIONS: &[&str] = &[
    "play",
    "pause",
    "stop",
    "skip_next",
    "skip_previous",
    "step_forward",
    "step_back",
    "seek_to",
];

fn client_id() -> Param {
    Param::required("client_id", ParamKind::Str).describe("Client machine identifier")
}

fn seek_to() -> Param {
    Param::optional("seek_to", ParamKind::NON_NEGATIVE).describe("Position in milliseconds")
}

/// A router entry for a command that needs nothing but the client.
fn simple(name: &'static str, summary: &'static str) -> OperationSpec {
    OperationSpec::new(name, summary, move |ctx: HandlerContext| async move {
        let command = command_for(name, &ctx.params)?;
        send(ctx, command).await
    })
    .param(client_id())
}

pub fn router() -> DomainRouter {
    DomainRouter::new("streaming", "Sessions, clients and playback control")
        .operation(OperationSpec::new("list_sessions", "Active playback sessions", list_sessions))
        .operation(OperationSpec::new("list_clients", "Controllable clients", list_clients))
        .operation(
            OperationSpec::new("play", "Play an item on a client", play)
                .param(client_id())
                .param(Param::required("media_key", ParamKind::Str))
                .param(Param::optional("offset", ParamKind::NON_NEGATIVE)),
        )
        .operation(simple("pause", "Pause playback"))
        .operation(simple("stop", "Stop playback"))
        .operation(simple("skip_next", "Skip to the next item"))
        .operation(simple("skip_previous", "Skip to the previous item"))
        .operation(
            OperationSpec::new("seek", "Seek to a position", seek)
                .param(client_id())
                .param(Param {
                    required: true,
                    ..seek_to()
                }),
        )
        .operation(
            OperationSpec::new("control", "Send any playback action", control)
                .param(client_id())
                .param(Param::required("action", ParamKind::Enum(ACTIONS)))
                .param(seek_to()),
        )
}

/// Map an action name to a command. `seek_to` needs the position parameter.
fn command_for(action: &str, params: &Params) -> Result<PlaybackCommand, OperationError> {
    let command = match action {
        "play" => PlaybackCommand::Play {
            media_key: None,
            offset: None,
        },
        "pause" => PlaybackCommand::Pause,
        "stop" => PlaybackCommand::Stop,
        "skip_next" => PlaybackCommand::SkipNext,
        "skip_previous" => PlaybackCommand::SkipPrevious,
        "step_forward" => PlaybackCommand::StepForward,
        "step_back" => PlaybackCommand::StepBack,
        "seek_to" => PlaybackCommand::SeekTo {
            offset_ms: params
                .uint("seek_to")
                .ok_or_else(|| OperationError::missing("seek_to"))?,
        },
        other => {
            return Err(OperationError::invalid_choice(
                "action",
                format!("'{}' is not a playback action", other),
                ACTIONS,
            ));
        }
    };
    Ok(command)
}

async fn send(ctx: HandlerContext, command: PlaybackCommand) -> OperationResult {
    let client = ctx.params.require("client_id")?;
    ctx.server.send_command(client, command.clone()).await?;
    done(
        format!("Sent {} to client {}", command.endpoint(), client),
        json!({"client_id": client, "command": command.endpoint()}),
    )
}

async fn list_sessions(ctx: HandlerContext) -> OperationResult {
    OperationOutput::json(&ctx.server.sessions().await?)
}

async fn list_clients(ctx: HandlerContext) -> OperationResult {
    OperationOutput::json(&ctx.server.clients().await?)
}

async fn play(ctx: HandlerContext) -> OperationResult {
    let command = PlaybackCommand::Play {
        media_key: Some(ctx.params.require("media_key")?.to_string()),
        offset: ctx.params.uint("offset"),
    };
    send(ctx, command).await
}

async fn seek(ctx: HandlerContext) -> OperationResult {
    let command = command_for("seek_to", &ctx.params)?;
    send(ctx, command).await
}

async fn control(ctx: HandlerContext) -> OperationResult {
    let command = command_for(ctx.params.require("action")?, &ctx.params)?;
    send(ctx, command).await
}
