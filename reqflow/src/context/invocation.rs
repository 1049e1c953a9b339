//! The per-invocation execution context.

use super::{FieldBag, MergePatch};
use crate::errors::StepError;
use crate::event::{PlatformContext, PlatformEvent, RawInvocation};
use crate::facade::{jsonp_callback, request_fields, Response};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

struct ContextInner {
    invocation_id: Uuid,
    req: FieldBag,
    res: Response,
    raw: RwLock<RawInvocation>,
    errors: RwLock<Vec<StepError>>,
}

/// The mutable state for one invocation.
///
/// A cheap handle: clones share the same underlying state, which is how the
/// context is threaded through every step of a run, including concurrent
/// members of a parallel group. Created at invocation start and discarded
/// once the terminal handler and finally hook have completed; never shared
/// across invocations.
#[derive(Clone)]
pub struct InvocationContext {
    inner: Arc<ContextInner>,
}

impl InvocationContext {
    /// Builds the context for one platform invocation.
    ///
    /// Normally called by the runner; exposed for tests that exercise steps
    /// in isolation.
    #[must_use]
    pub fn new(event: PlatformEvent, context: PlatformContext) -> Self {
        let req = FieldBag::from_object(request_fields(&event));
        let res = Response::new(jsonp_callback(&event));
        Self {
            inner: Arc::new(ContextInner {
                invocation_id: Uuid::new_v4(),
                req,
                res,
                raw: RwLock::new(RawInvocation::new(event, context)),
                errors: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Returns the invocation id.
    #[must_use]
    pub fn invocation_id(&self) -> Uuid {
        self.inner.invocation_id
    }

    /// Returns the request field bag.
    #[must_use]
    pub fn req(&self) -> &FieldBag {
        &self.inner.req
    }

    /// Returns the response facade.
    #[must_use]
    pub fn res(&self) -> &Response {
        &self.inner.res
    }

    /// Returns a copy of the raw platform inputs.
    #[must_use]
    pub fn raw(&self) -> RawInvocation {
        self.inner.raw.read().clone()
    }

    /// Updates the raw platform inputs mid-run.
    pub fn update_raw(&self, f: impl FnOnce(&mut RawInvocation)) {
        f(&mut self.inner.raw.write());
    }

    /// Applies a merge patch: `req` into the request bag, `res` into the
    /// response's field bag.
    pub fn apply_patch(&self, patch: &MergePatch) {
        if let Some(fields) = &patch.req {
            self.inner.req.merge(fields);
        }
        if let Some(fields) = &patch.res {
            self.inner.res.fields().merge(fields);
        }
    }

    /// Merges a function step's resolved value, when it is patch-shaped.
    ///
    /// Anything other than `{"req": {..}}` / `{"res": {..}}` is ignored.
    pub fn merge_step_value(&self, value: &Value) {
        if let Some(patch) = MergePatch::from_step_value(value) {
            self.apply_patch(&patch);
        }
    }

    /// Appends a normalized failure to the accumulator.
    pub fn push_error(&self, error: StepError) {
        self.inner.errors.write().push(error);
    }

    /// Returns the accumulated failures in occurrence order.
    #[must_use]
    pub fn errors(&self) -> Vec<StepError> {
        self.inner.errors.read().clone()
    }

    /// Returns true if any step failed so far.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.inner.errors.read().is_empty()
    }
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("invocation_id", &self.inner.invocation_id)
            .field("req_fields", &self.inner.req.len())
            .field("errors", &self.inner.errors.read().len())
            .finish_non_exhaustive()
    }
}
