//! Platform invocation types.
//!
//! These model the host platform's three wire shapes: the incoming event,
//! the invocation context, and the response handed back to the platform.
//! Unknown event fields are preserved verbatim so steps can read anything
//! the platform attaches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The incoming platform event for one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformEvent {
    /// Parsed query string parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string_parameters: Option<HashMap<String, String>>,

    /// Parsed path parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_parameters: Option<HashMap<String, String>>,

    /// Request headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    /// Raw request body, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Scheduled keep-warm probe flag; short-circuits the whole pipeline.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub keep_warm: bool,

    /// Fields this engine does not model, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PlatformEvent {
    /// Creates an empty event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a query string parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_string_parameters
            .as_ref()
            .and_then(|params| params.get(name))
            .map(String::as_str)
    }
}

/// The platform-supplied invocation context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformContext {
    /// Name of the deployed function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    /// Platform-assigned request identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Fields this engine does not model, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The response delivered back to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformResponse {
    /// HTTP status code.
    pub status_code: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: String,
}

/// The unmodified platform inputs for one invocation.
///
/// Steps read this through the invocation context; configuration defaults
/// are already merged in by the time it is constructed.
#[derive(Debug, Clone)]
pub struct RawInvocation {
    /// The platform event as received.
    pub event: PlatformEvent,

    /// The platform context as received.
    pub context: PlatformContext,

    /// When the runner accepted the invocation.
    pub received_at: DateTime<Utc>,
}

impl RawInvocation {
    /// Captures the platform inputs at invocation start.
    #[must_use]
    pub fn new(event: PlatformEvent, context: PlatformContext) -> Self {
        Self {
            event,
            context,
            received_at: Utc::now(),
        }
    }
}
