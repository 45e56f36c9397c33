//! Operation descriptors.
//!
//! An [`OperationSpec`] is built once at startup and never changes: a name, a
//! one-line summary, the declared parameters, optional any-of groups and the
//! async handler. Handlers receive a [`HandlerContext`] and are the only code
//! that calls the media server.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Value, json};

use super::error::OperationError;
use super::params::{Param, Params};
use crate::adapter::MediaServer;

/// What a handler returns on success.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutput {
    pub data: Value,
    /// Explicit count for object-shaped results such as `{results, total}`.
    pub count: Option<usize>,
}

impl OperationOutput {
    pub fn value(data: Value) -> Self {
        Self { data, count: None }
    }

    /// Serialize any record into an output.
    pub fn json<T: Serialize>(data: &T) -> Result<Self, OperationError> {
        Ok(Self::value(serde_json::to_value(data)?))
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

/// Handler result type.
pub type OperationResult = Result<OperationOutput, OperationError>;

/// Everything a handler may use for one call.
#[derive(Clone)]
pub struct HandlerContext {
    pub params: Params,
    pub server: Arc<dyn MediaServer>,
}

pub type Handler = Arc<dyn Fn(HandlerContext) -> BoxFuture<'static, OperationResult> + Send + Sync>;

/// Bind shared state to a handler that needs it.
pub fn with_state<S, F, Fut>(
    state: &Arc<S>,
    handler: F,
) -> impl Fn(HandlerContext) -> Fut + Send + Sync + 'static
where
    S: Send + Sync + 'static,
    F: Fn(HandlerContext, Arc<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OperationResult> + Send + 'static,
{
    let state = state.clone();
    move |ctx| handler(ctx, state.clone())
}

/// Immutable descriptor of one operation.
#[derive(Clone)]
pub struct OperationSpec {
    name: &'static str,
    summary: &'static str,
    params: Vec<Param>,
    any_of: Vec<&'static [&'static str]>,
    long_running: bool,
    handler: Handler,
}

impl std::fmt::Debug for OperationSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("any_of", &self.any_of)
            .field("long_running", &self.long_running)
            .finish_non_exhaustive()
    }
}

impl OperationSpec {
    pub fn new<F, Fut>(name: &'static str, summary: &'static str, handler: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        Self {
            name,
            summary,
            params: Vec::new(),
            any_of: Vec::new(),
            long_running: false,
            handler: Arc::new(move |ctx| handler(ctx).boxed()),
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Require at least one of `names` to be provided.
    pub fn any_of(mut self, names: &'static [&'static str]) -> Self {
        self.any_of.push(names);
        self
    }

    /// Run under the long-running deadline instead of the default one.
    pub fn long_running(mut self) -> Self {
        self.long_running = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn summary(&self) -> &'static str {
        self.summary
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn param_named(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn any_of_groups(&self) -> &[&'static [&'static str]] {
        &self.any_of
    }

    pub fn is_long_running(&self) -> bool {
        self.long_running
    }

    pub fn required(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.required)
    }

    pub fn optional(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| !p.required)
    }

    /// Start the handler.
    pub fn invoke(&self, ctx: HandlerContext) -> BoxFuture<'static, OperationResult> {
        (self.handler)(ctx)
    }

    /// An example call showing every required parameter (and the first
    /// member of each any-of group).
    pub fn example(&self, domain: &str) -> String {
        let mut args = vec![format!("operation=\"{}\"", self.name)];
        args.extend(
            self.required()
                .map(|p| format!("{}={}", p.name, p.example_value())),
        );
        for group in &self.any_of {
            if let Some(param) = group.first().and_then(|n| self.param_named(n)) {
                args.push(format!("{}={}", param.name, param.example_value()));
            }
        }
        format!("plex_{}({})", domain, args.join(", "))
    }

    /// Self-description for the help domain.
    pub fn describe(&self, domain: &str) -> Value {
        let optional: Vec<Value> = self
            .optional()
            .map(|p| {
                json!({
                    "name": p.name,
                    "type": p.kind.schema_type(),
                    "default": p.default,
                })
            })
            .collect();
        json!({
            "name": self.name,
            "summary": self.summary,
            "required": self.required().map(|p| p.name).collect::<Vec<_>>(),
            "optional": optional,
            "any_of": self.any_of,
            "long_running": self.long_running,
            "example": self.example(domain),
        })
    }
}
