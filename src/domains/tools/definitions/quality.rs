//! Named quality profiles.

use serde_json::json;

use super::done;
use crate::adapter::QualityProfile;
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

pub(super) fn profile_name() -> Param {
    Param::required("profile_name", ParamKind::Str)
}

pub(super) fn create_spec() -> OperationSpec {
    OperationSpec::new("create_profile", "Create or replace a profile", create_profile)
        .param(profile_name())
        .param(Param::required("settings", ParamKind::Object).describe("Transcoder settings"))
        .param(Param::optional("is_default", ParamKind::Bool).default(false))
}

pub fn router() -> DomainRouter {
    DomainRouter::new("quality", "Manage named quality profiles")
        .operation(OperationSpec::new("list_profiles", "List profiles", list_profiles))
        .operation(OperationSpec::new("get_profile", "Get a profile", get_profile).param(profile_name()))
        .operation(create_spec())
        .operation(
            OperationSpec::new("update_profile", "Change a profile's settings", update_profile)
                .param(profile_name())
                .param(Param::required("settings", ParamKind::Object)),
        )
        .operation(
            OperationSpec::new("delete_profile", "Delete a profile", delete_profile).param(profile_name()),
        )
        .operation(
            OperationSpec::new("set_default", "Make a profile the default", set_default)
                .param(profile_name()),
        )
}

pub(super) async fn list_profiles(ctx: HandlerContext) -> OperationResult {
    OperationOutput::json(&ctx.server.list_profiles().await?)
}

async fn get_profile(ctx: HandlerContext) -> OperationResult {
    let profile = ctx.server.get_profile(ctx.params.require("profile_name")?).await?;
    OperationOutput::json(&profile)
}

pub(super) async fn create_profile(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let profile = QualityProfile {
        name: p.require("profile_name")?.to_string(),
        settings: p.object("settings").cloned().unwrap_or_default(),
        is_default: p.flag("is_default"),
    };
    OperationOutput::json(&ctx.server.save_profile(profile).await?)
}

async fn update_profile(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let mut profile = ctx.server.get_profile(p.require("profile_name")?).await?;
    if let Some(settings) = p.object("settings") {
        profile.settings.extend(settings.clone());
    }
    OperationOutput::json(&ctx.server.save_profile(profile).await?)
}

pub(super) async fn delete_profile(ctx: HandlerContext) -> OperationResult {
    let name = ctx.params.require("profile_name")?;
    ctx.server.delete_profile(name).await?;
    done(format!("Profile '{}' deleted", name), json!({"profile_name": name}))
}

async fn set_default(ctx: HandlerContext) -> OperationResult {
    let profile = ctx
        .server
        .set_default_profile(ctx.params.require("profile_name")?)
        .await?;
    OperationOutput::json(&profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::classify::ErrorCode;
    use crate::domains::tools::definitions::testing::call;

    #[tokio::test]
    async fn test_create_requires_settings_object() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "create_profile",
            json!({"profile_name": "mobile"}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::MissingParameter));
        assert!(env.error().unwrap().contains("settings"));
    }

    #[tokio::test]
    async fn test_stub_has_no_profiles() {
        let env = call(&router(), StubServer::new().into_arc(), "list_profiles", json!({})).await;
        assert_eq!(env.error_code(), Some(ErrorCode::NotSupported));
    }
}
