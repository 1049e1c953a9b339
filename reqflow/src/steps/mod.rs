//! Step model: the polymorphic units of pre-processing.
//!
//! A step is one of three kinds, resolved into its tagged variant once at
//! construction and never re-inspected per invocation: a single async
//! function, a parallel group of functions occupying one pipeline position,
//! or a static merge patch applied without suspension.

use crate::context::{InvocationContext, MergePatch};
use crate::errors::StepError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// The outcome of one function step or terminal handler call.
///
/// A synchronous failure and an asynchronous failure travel the same
/// channel; the runner never distinguishes them.
pub type StepResult = Result<Value, StepError>;

/// Trait for function steps and terminal handlers.
///
/// Implementations receive the shared invocation context and may mutate the
/// request and response bags directly, emit a response, or resolve to a
/// `{"req": {..}} / {"res": {..}}` patch value for the runner to merge.
#[async_trait]
pub trait StepFn: Send + Sync {
    /// Executes the step against the shared context.
    async fn call(&self, ctx: &InvocationContext) -> StepResult;
}

/// A synchronous function step.
pub struct FnStep<F>
where
    F: Fn(&InvocationContext) -> StepResult + Send + Sync,
{
    func: F,
}

impl<F> FnStep<F>
where
    F: Fn(&InvocationContext) -> StepResult + Send + Sync,
{
    /// Wraps a synchronous closure as a step.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnStep<F>
where
    F: Fn(&InvocationContext) -> StepResult + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> StepFn for FnStep<F>
where
    F: Fn(&InvocationContext) -> StepResult + Send + Sync,
{
    async fn call(&self, ctx: &InvocationContext) -> StepResult {
        (self.func)(ctx)
    }
}

/// An async function step.
///
/// The closure receives its own handle to the shared context, so the
/// returned future owns everything it touches.
pub struct AsyncFnStep<F, Fut>
where
    F: Fn(InvocationContext) -> Fut + Send + Sync,
    Fut: Future<Output = StepResult> + Send,
{
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnStep<F, Fut>
where
    F: Fn(InvocationContext) -> Fut + Send + Sync,
    Fut: Future<Output = StepResult> + Send,
{
    /// Wraps an async closure as a step.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> fmt::Debug for AsyncFnStep<F, Fut>
where
    F: Fn(InvocationContext) -> Fut + Send + Sync,
    Fut: Future<Output = StepResult> + Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnStep").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> StepFn for AsyncFnStep<F, Fut>
where
    F: Fn(InvocationContext) -> Fut + Send + Sync,
    Fut: Future<Output = StepResult> + Send,
{
    async fn call(&self, ctx: &InvocationContext) -> StepResult {
        (self.func)(ctx.clone()).await
    }
}

/// A unit of pre-processing occupying one pipeline position.
#[derive(Clone)]
pub enum Step {
    /// A single function step.
    Function(Arc<dyn StepFn>),

    /// An ordered group of function steps, all invoked concurrently; the
    /// group is one position in the outer sequence.
    Parallel(Vec<Arc<dyn StepFn>>),

    /// A static patch applied synchronously.
    Merge(MergePatch),
}

impl Step {
    /// Creates a function step from a synchronous closure.
    pub fn sync<F>(func: F) -> Self
    where
        F: Fn(&InvocationContext) -> StepResult + Send + Sync + 'static,
    {
        Self::Function(Arc::new(FnStep::new(func)))
    }

    /// Creates a function step from an async closure.
    pub fn future<F, Fut>(func: F) -> Self
    where
        F: Fn(InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        Self::Function(Arc::new(AsyncFnStep::new(func)))
    }

    /// Creates a function step from a shared trait object.
    pub fn function(step: Arc<dyn StepFn>) -> Self {
        Self::Function(step)
    }

    /// Creates a parallel group from function steps.
    ///
    /// Nested parallel groups contribute their members in order; merge
    /// steps have no function to run concurrently and are skipped.
    #[must_use]
    pub fn group(steps: Vec<Self>) -> Self {
        let mut members = Vec::new();
        for step in steps {
            match step {
                Self::Function(f) => members.push(f),
                Self::Parallel(inner) => members.extend(inner),
                Self::Merge(_) => {
                    tracing::debug!("merge step dropped from parallel group");
                }
            }
        }
        Self::Parallel(members)
    }

    /// Creates a merge step from a patch value.
    ///
    /// The value is interpreted once, here: an object with `req`/`res`
    /// object fields patches those parts, any other object patches the
    /// request bag.
    #[must_use]
    pub fn merge(value: Value) -> Self {
        Self::Merge(MergePatch::from_value(value))
    }

    /// Returns a short label for the step kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Function(_) => "function",
            Self::Parallel(_) => "parallel",
            Self::Merge(_) => "merge",
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Step::Function"),
            Self::Parallel(members) => {
                write!(f, "Step::Parallel({} members)", members.len())
            }
            Self::Merge(patch) => f.debug_tuple("Step::Merge").field(patch).finish(),
        }
    }
}
