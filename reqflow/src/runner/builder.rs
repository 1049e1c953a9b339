//! Fluent handler configuration.

use crate::context::InvocationContext;
use crate::errors::{EngineError, StepError};
use crate::event::{PlatformContext, PlatformEvent, PlatformResponse};
use crate::registry::{PluginRegistry, PluginSelector};
use crate::steps::{AsyncFnStep, FnStep, Step, StepFn, StepResult};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// The full method list advertised for CORS preflight when none is given.
const DEFAULT_PREFLIGHT_METHODS: [&str; 14] = [
    "POST", "PUT", "GET", "OPTIONS", "DELETE", "PATCH", "COPY", "HEAD", "LINK",
    "UNLINK", "PURGE", "LOCK", "PROPFIND", "VIEW",
];

/// Trait for catch handlers.
///
/// A catch handler receives the accumulated failures and the invocation
/// context; it is expected to emit the response itself. Whatever it leaves
/// unemitted becomes an empty 200 once the runner ends the invocation.
#[async_trait]
pub trait CatchFn: Send + Sync {
    /// Handles the accumulated failures for one invocation.
    async fn call(&self, errors: &[StepError], ctx: &InvocationContext);
}

/// A synchronous catch handler built from a closure.
pub struct FnCatch<F>
where
    F: Fn(&[StepError], &InvocationContext) + Send + Sync,
{
    func: F,
}

impl<F> FnCatch<F>
where
    F: Fn(&[StepError], &InvocationContext) + Send + Sync,
{
    /// Wraps a synchronous closure as a catch handler.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> CatchFn for FnCatch<F>
where
    F: Fn(&[StepError], &InvocationContext) + Send + Sync,
{
    async fn call(&self, errors: &[StepError], ctx: &InvocationContext) {
        (self.func)(errors, ctx);
    }
}

type FinallyHook = Arc<dyn Fn(Value) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone)]
pub(crate) struct CorsConfig {
    pub(crate) origin: String,
    pub(crate) methods: String,
}

/// Default plugins for a handler, as a name-to-step mapping.
#[derive(Default)]
pub struct PipelineConfig {
    plugins: Vec<(String, Step)>,
}

impl PipelineConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named plugin.
    #[must_use]
    pub fn plugin(mut self, name: impl Into<String>, step: Step) -> Self {
        self.plugins.push((name.into(), step));
        self
    }
}

/// A configured request handler: the terminal callback plus everything
/// that runs around it.
///
/// Handlers are built once at setup time and reused across invocations;
/// [`run`](Handler::run) is `&self` and every invocation gets its own
/// context.
pub struct Handler {
    pub(crate) terminal: Arc<dyn StepFn>,
    pub(crate) registry: Arc<PluginRegistry>,
    pub(crate) befores: Vec<Step>,
    pub(crate) filter: Option<Vec<PluginSelector>>,
    pub(crate) excludes: Vec<String>,
    pub(crate) catch: Option<Arc<dyn CatchFn>>,
    pub(crate) finally_hook: Option<FinallyHook>,
    pub(crate) event_defaults: serde_json::Map<String, Value>,
    pub(crate) context_defaults: serde_json::Map<String, Value>,
    pub(crate) cors: Option<CorsConfig>,
    pub(crate) debug: bool,
}

impl Handler {
    /// Creates a handler around a terminal step.
    #[must_use]
    pub fn new(terminal: Arc<dyn StepFn>) -> Self {
        Self {
            terminal,
            registry: Arc::new(PluginRegistry::new()),
            befores: Vec::new(),
            filter: None,
            excludes: Vec::new(),
            catch: None,
            finally_hook: None,
            event_defaults: serde_json::Map::new(),
            context_defaults: serde_json::Map::new(),
            cors: None,
            debug: false,
        }
    }

    /// Creates a handler from a synchronous terminal closure.
    #[must_use]
    pub fn sync<F>(terminal: F) -> Self
    where
        F: Fn(&InvocationContext) -> StepResult + Send + Sync + 'static,
    {
        Self::new(Arc::new(FnStep::new(terminal)))
    }

    /// Creates a handler from an async terminal closure.
    #[must_use]
    pub fn future<F, Fut>(terminal: F) -> Self
    where
        F: Fn(InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        Self::new(Arc::new(AsyncFnStep::new(terminal)))
    }

    /// Creates a handler with default plugins from a configuration mapping.
    #[must_use]
    pub fn with_config(config: PipelineConfig, terminal: Arc<dyn StepFn>) -> Self {
        let registry = PluginRegistry::new();
        for (name, step) in config.plugins {
            registry.register(name, step);
        }
        Self::new(terminal).registry(Arc::new(registry))
    }

    /// Uses the given plugin registry for this handler.
    #[must_use]
    pub fn registry(mut self, registry: Arc<PluginRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Appends an explicit before step. Explicit steps run after the
    /// resolved registry steps, in the order they were added.
    #[must_use]
    pub fn before(mut self, step: Step) -> Self {
        self.befores.push(step);
        self
    }

    /// Sets the plugin include filter.
    #[must_use]
    pub fn plugins<I>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = PluginSelector>,
    {
        self.filter = Some(selectors.into_iter().collect());
        self
    }

    /// Adds plugin names to the exclusion list.
    #[must_use]
    pub fn exclude_plugins<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets the catch handler.
    #[must_use]
    pub fn catch_with(mut self, catch: Arc<dyn CatchFn>) -> Self {
        self.catch = Some(catch);
        self
    }

    /// Sets a synchronous catch closure.
    #[must_use]
    pub fn catch_sync<F>(self, catch: F) -> Self
    where
        F: Fn(&[StepError], &InvocationContext) + Send + Sync + 'static,
    {
        self.catch_with(Arc::new(FnCatch::new(catch)))
    }

    /// Sets the finally hook, invoked after the terminal or catch handler
    /// with the terminal handler's resolved value (JSON null on the failure
    /// path). A failing hook is logged and never produces a second response.
    #[must_use]
    pub fn finally_with<F>(mut self, hook: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.finally_hook = Some(Arc::new(hook));
        self
    }

    /// Shallow-merges default fields over every incoming platform event.
    ///
    /// Non-object values are ignored.
    #[must_use]
    pub fn event(mut self, defaults: Value) -> Self {
        match defaults {
            Value::Object(fields) => self.event_defaults.extend(fields),
            other => debug!(?other, "non-object event defaults ignored"),
        }
        self
    }

    /// Shallow-merges default fields over every incoming platform context.
    ///
    /// Non-object values are ignored.
    #[must_use]
    pub fn context(mut self, defaults: Value) -> Self {
        match defaults {
            Value::Object(fields) => self.context_defaults.extend(fields),
            other => debug!(?other, "non-object context defaults ignored"),
        }
        self
    }

    /// Enables CORS header injection with the default preflight method list.
    #[must_use]
    pub fn cors(self, origin: impl Into<String>) -> Self {
        self.cors_config(origin.into(), DEFAULT_PREFLIGHT_METHODS.join(", "))
    }

    /// Enables CORS header injection with an explicit method list.
    #[must_use]
    pub fn cors_with_methods(self, origin: impl Into<String>, methods: &[&str]) -> Self {
        let methods = methods
            .iter()
            .map(|m| m.to_uppercase())
            .collect::<Vec<_>>()
            .join(", ");
        self.cors_config(origin.into(), methods)
    }

    fn cors_config(mut self, origin: String, methods: String) -> Self {
        self.cors = Some(CorsConfig { origin, methods });
        self
    }

    /// Enables the debug response-wrapping mode.
    #[must_use]
    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Runs one invocation through the pipeline to its single response.
    pub async fn run(
        &self,
        event: PlatformEvent,
        context: PlatformContext,
    ) -> Result<PlatformResponse, EngineError> {
        super::engine::execute(self, event, context).await
    }

    /// Blocking adapter around [`run`](Handler::run) for hosts without an
    /// async entry point.
    pub fn run_blocking(
        &self,
        event: PlatformEvent,
        context: PlatformContext,
    ) -> Result<PlatformResponse, EngineError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(event, context))
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("befores", &self.befores.len())
            .field("filter", &self.filter)
            .field("excludes", &self.excludes)
            .field("has_catch", &self.catch.is_some())
            .field("has_finally", &self.finally_hook.is_some())
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}
