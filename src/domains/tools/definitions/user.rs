//! Server accounts and their permissions.

use serde_json::json;

use super::done;
use crate::adapter::{NewUser, UserUpdate};
use crate::domains::tools::dispatch::DomainRouter;
use crate::domains::tools::error::OperationError;
use crate::domains::tools::params::{Param, ParamKind};
use crate::domains::tools::spec::{HandlerContext, OperationOutput, OperationResult, OperationSpec};

pub const ROLES: &[&str] = &["owner", "admin", "user", "managed", "shared"];

fn user_id() -> Param {
    Param::required("user_id", ParamKind::Str)
}

fn check_email(email: &str) -> Result<(), OperationError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(OperationError::invalid("email", "expected an address like name@example.com")),
    }
}

pub fn router() -> DomainRouter {
    DomainRouter::new("user", "Accounts and permissions")
        .operation(OperationSpec::new("list", "List accounts", list))
        .operation(OperationSpec::new("get", "Get an account", get).param(user_id()))
        .operation(
            OperationSpec::new("create", "Create an account", create)
                .param(Param::required("username", ParamKind::Str).min_len(3))
                .param(Param::required("email", ParamKind::Str))
                .param(Param::required("password", ParamKind::Str).min_len(8))
                .param(Param::optional("role", ParamKind::Enum(ROLES)))
                .param(Param::optional("restricted", ParamKind::Bool).default(false)),
        )
        .operation(
            OperationSpec::new("update", "Change account fields", update)
                .param(user_id())
                .param(Param::optional("username", ParamKind::Str).min_len(3))
                .param(Param::optional("email", ParamKind::Str))
                .param(Param::optional("password", ParamKind::Str).min_len(8))
                .param(Param::optional("role", ParamKind::Enum(ROLES)))
                .param(Param::optional("restricted", ParamKind::Bool))
                .any_of(&["username", "email", "password", "role", "restricted"]),
        )
        .operation(OperationSpec::new("delete", "Delete an account", delete).param(user_id()))
        .operation(
            OperationSpec::new("update_permissions", "Replace an account's permissions", update_permissions)
                .param(user_id())
                .param(Param::required("permissions", ParamKind::Object)),
        )
}

async fn list(ctx: HandlerContext) -> OperationResult {
    OperationOutput::json(&ctx.server.list_users().await?)
}

async fn get(ctx: HandlerContext) -> OperationResult {
    OperationOutput::json(&ctx.server.get_user(ctx.params.require("user_id")?).await?)
}

async fn create(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    let email = p.require("email")?;
    check_email(email)?;
    let user = NewUser {
        username: p.require("username")?.to_string(),
        email: email.to_string(),
        password: p.require("password")?.to_string(),
        role: p.text("role").map(str::to_string),
        restricted: p.flag("restricted"),
    };
    OperationOutput::json(&ctx.server.create_user(user).await?)
}

async fn update(ctx: HandlerContext) -> OperationResult {
    let p = &ctx.params;
    if let Some(email) = p.text("email") {
        check_email(email)?;
    }
    let field = |name: &str| p.text(name).map(str::to_string);
    let update = UserUpdate {
        username: field("username"),
        email: field("email"),
        password: field("password"),
        role: field("role"),
        restricted: p.bool("restricted"),
    };
    OperationOutput::json(&ctx.server.update_user(p.require("user_id")?, update).await?)
}

async fn delete(ctx: HandlerContext) -> OperationResult {
    let id = ctx.params.require("user_id")?;
    ctx.server.delete_user(id).await?;
    done(format!("User {} deleted", id), json!({"user_id": id}))
}

async fn update_permissions(ctx: HandlerContext) -> OperationResult {
    let permissions = ctx.params.object("permissions").cloned().unwrap_or_default();
    let user = ctx
        .server
        .set_user_permissions(ctx.params.require("user_id")?, permissions)
        .await?;
    OperationOutput::json(&user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::StubServer;
    use crate::domains::tools::classify::ErrorCode;
    use crate::domains::tools::definitions::testing::call;

    #[tokio::test]
    async fn test_short_password_rejected() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "create",
            json!({"username": "alice", "email": "a@example.com", "password": "short"}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidParameter));
        assert!(env.error().unwrap().contains("password"));
        assert!(!env.error().unwrap().contains("short"));
    }

    #[tokio::test]
    async fn test_bad_email_rejected() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "create",
            json!({"username": "alice", "email": "alice", "password": "long enough"}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidParameter));
    }

    #[tokio::test]
    async fn test_create_not_supported_by_backend() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "create",
            json!({"username": "alice", "email": "a@example.com", "password": "long enough"}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::NotSupported));
    }

    #[tokio::test]
    async fn test_unknown_role() {
        let env = call(
            &router(),
            StubServer::new().into_arc(),
            "update",
            json!({"user_id": "2", "role": "superuser"}),
        )
        .await;
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidParameter));
    }

    #[tokio::test]
    async fn test_list() {
        let env = call(&router(), StubServer::new().into_arc(), "list", json!({})).await;
        assert_eq!(env.count(), Some(1));
    }
}
