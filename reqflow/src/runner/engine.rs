//! The pipeline execution engine.
//!
//! One invocation moves through four phases: resolve the effective step
//! list, execute it in order (parallel groups settle as one position),
//! dispatch exactly one of the terminal handler, catch handler, or default
//! error responder, then run the finally hook. Nothing escapes this module
//! as an unhandled failure; every outcome funnels into the sentinel-guarded
//! response.

use super::builder::Handler;
use crate::context::InvocationContext;
use crate::errors::EngineError;
use crate::event::{PlatformContext, PlatformEvent, PlatformResponse};
use crate::steps::Step;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub(crate) async fn execute(
    handler: &Handler,
    event: PlatformEvent,
    context: PlatformContext,
) -> Result<PlatformResponse, EngineError> {
    let event = apply_defaults(event, &handler.event_defaults)?;
    let context = apply_defaults(context, &handler.context_defaults)?;
    let keep_warm = event.keep_warm;

    let ctx = InvocationContext::new(event, context);

    if handler.debug {
        ctx.res().set_debug();
    }
    if let Some(cors) = &handler.cors {
        ctx.res()
            .header("Access-Control-Allow-Origin", cors.origin.clone());
        ctx.res()
            .header("Access-Control-Allow-Methods", cors.methods.clone());
    }

    // Keep-warm probes never reach the pipeline: no steps, no catch, no
    // finally.
    if keep_warm {
        info!(invocation_id = %ctx.invocation_id(), "keep-warm probe; pipeline skipped");
        ctx.res().json(&serde_json::json!({
            "keepingWarm": true,
            "message": "keep-warm probe handled before any step, handler, or hook ran",
        }));
        ctx.res().end();
        return ctx.res().take_response().ok_or(EngineError::NoResponse);
    }

    let mut steps = handler
        .registry
        .resolve(handler.filter.as_deref(), &handler.excludes);
    steps.extend(handler.befores.iter().cloned());
    debug!(
        invocation_id = %ctx.invocation_id(),
        steps = steps.len(),
        "pipeline resolved"
    );

    let mut failed = false;
    for (index, step) in steps.iter().enumerate() {
        // An ended response aborts the run before the next dispatch.
        if ctx.res().was_ended() {
            break;
        }
        debug!(index, kind = step.kind(), "dispatching step");
        match step {
            Step::Merge(patch) => ctx.apply_patch(patch),
            Step::Function(step_fn) => match step_fn.call(&ctx).await {
                Ok(value) => ctx.merge_step_value(&value),
                Err(error) => {
                    ctx.push_error(error);
                    failed = true;
                }
            },
            Step::Parallel(members) => {
                // All members are invoked before any is awaited and run to
                // completion even when a sibling fails; resolved patches
                // merge in member order so the final context state is
                // deterministic.
                let results =
                    join_all(members.iter().map(|member| member.call(&ctx))).await;
                for result in &results {
                    if let Ok(value) = result {
                        ctx.merge_step_value(value);
                    }
                }
                for result in results {
                    if let Err(error) = result {
                        ctx.push_error(error);
                        failed = true;
                    }
                }
            }
        }
        if failed {
            break;
        }
    }

    if !ctx.res().was_ended() {
        if failed {
            dispatch_catch(handler, &ctx).await;
            run_finally(handler, Value::Null);
        } else {
            match handler.terminal.call(&ctx).await {
                Ok(value) => run_finally(handler, value),
                Err(error) => {
                    ctx.push_error(error);
                    dispatch_catch(handler, &ctx).await;
                    run_finally(handler, Value::Null);
                }
            }
        }
    }

    ctx.res().take_response().ok_or(EngineError::NoResponse)
}

/// Routes accumulated failures to the catch handler, or to the default
/// responder when none is registered.
async fn dispatch_catch(handler: &Handler, ctx: &InvocationContext) {
    let errors = ctx.errors();
    match &handler.catch {
        Some(catch) => {
            catch.call(&errors, ctx).await;
            ctx.res().end();
        }
        None => ctx.res().error_many(400, &errors),
    }
}

fn run_finally(handler: &Handler, value: Value) {
    if let Some(hook) = &handler.finally_hook {
        if let Err(error) = hook(value) {
            warn!(%error, "finally hook failed");
        }
    }
}

fn apply_defaults<T>(
    value: T,
    defaults: &serde_json::Map<String, Value>,
) -> Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    if defaults.is_empty() {
        return Ok(value);
    }
    let mut merged = serde_json::to_value(value)?;
    if let Value::Object(object) = &mut merged {
        for (key, default) in defaults {
            object.insert(key.clone(), default.clone());
        }
    }
    serde_json::from_value(merged)
}
