//! # Reqflow
//!
//! A pipeline runner for stateless serverless request/response handlers.
//!
//! Reqflow wraps a single terminal handler with an ordered sequence of
//! preprocessing steps and guarantees exactly one response is delivered per
//! invocation:
//!
//! - **Step-based execution**: single async steps, parallel step groups, and
//!   static merge patches, run strictly in order
//! - **Plugin registry**: named reusable steps resolved per handler with
//!   include filters and exclusion lists
//! - **Failure routing**: any step or handler failure is normalized and
//!   routed to a catch handler or the default error responder
//! - **At-most-once delivery**: every emission funnels through a sentinel
//!   that silently drops duplicates
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reqflow::prelude::*;
//!
//! let handler = Handler::sync(|ctx| {
//!     ctx.res().json(&serde_json::json!({"works": true}));
//!     Ok(serde_json::Value::Null)
//! })
//! .before(Step::sync(|ctx| {
//!     ctx.req().set("user", serde_json::json!("anonymous"));
//!     Ok(serde_json::Value::Null)
//! }));
//!
//! let response = handler.run(event, context).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod errors;
pub mod event;
pub mod facade;
pub mod observability;
pub mod registry;
pub mod runner;
pub mod steps;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{FieldBag, InvocationContext, MergePatch};
    pub use crate::errors::{EngineError, StepError};
    pub use crate::event::{
        PlatformContext, PlatformEvent, PlatformResponse, RawInvocation,
    };
    pub use crate::facade::{Response, ResponseSentinel};
    pub use crate::registry::{PluginRegistry, PluginSelector};
    pub use crate::runner::{CatchFn, Handler, PipelineConfig};
    pub use crate::steps::{AsyncFnStep, FnStep, Step, StepFn, StepResult};
}
