//! Error types for the reqflow engine.
//!
//! Failures inside a pipeline never escape the runner. Every step failure,
//! terminal-handler failure, and merge failure is normalized into a
//! [`StepError`] and accumulated on the invocation context; the crate-level
//! [`EngineError`] covers only what `run` itself can surface.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A normalized record of a single step failure.
///
/// The runner treats a synchronously failing step and an asynchronously
/// failing step identically: both end up here. Error-like sources carry a
/// `message` and, when available, a `stack` (the rendered error chain);
/// arbitrary non-error payloads pass through in `detail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepError {
    /// Human-readable failure message.
    pub message: String,

    /// Rendered error chain, when the source provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    /// Raw payload for non-error failures, passed through as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl StepError {
    /// Creates a step error with just a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            detail: None,
        }
    }

    /// Attaches a rendered error chain.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attaches a raw failure payload.
    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Normalizes an arbitrary thrown value.
    ///
    /// Objects with a string `message` field keep it as the message; any
    /// other value is stringified for the message and carried in `detail`.
    #[must_use]
    pub fn from_value(value: serde_json::Value) -> Self {
        let message = match &value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map_or_else(|| value.to_string(), ToString::to_string),
            other => other.to_string(),
        };
        Self {
            message,
            stack: None,
            detail: Some(value),
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StepError {}

impl From<anyhow::Error> for StepError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            message: err.to_string(),
            stack: Some(format!("{err:?}")),
            detail: None,
        }
    }
}

impl From<String> for StepError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for StepError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Failures surfaced by [`Handler::run`](crate::runner::Handler::run) itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The pipeline completed without any response emission.
    #[error("invocation completed without emitting a response")]
    NoResponse,

    /// The configured event or context defaults could not be applied.
    #[error("failed to apply invocation defaults: {0}")]
    Defaults(#[from] serde_json::Error),

    /// A blocking runtime could not be constructed.
    #[error("runtime error: {0}")]
    Io(#[from] std::io::Error),
}
