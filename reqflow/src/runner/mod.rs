//! Pipeline construction and execution.
//!
//! This module provides:
//! - The fluent handler builder (before steps, plugin filters, catch and
//!   finally hooks, platform-input defaults, CORS, debug mode)
//! - The execution engine that drives one invocation to its single response

mod builder;
mod engine;
#[cfg(test)]
mod integration_tests;

pub use builder::{CatchFn, FnCatch, Handler, PipelineConfig};
