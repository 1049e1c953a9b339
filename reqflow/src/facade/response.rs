//! The response emission facade.

use super::ResponseSentinel;
use crate::context::FieldBag;
use crate::errors::StepError;
use crate::event::PlatformResponse;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

const CONTENT_TYPE: &str = "Content-Type";

/// The response half of the invocation facade.
///
/// Steps and handlers emit through this; every emission operation funnels
/// into the sentinel's single delivery primitive, so a second emission after
/// one was delivered is a silent no-op. The facade also carries a field bag
/// for data steps attach to the response side of the context.
#[derive(Debug)]
pub struct Response {
    sentinel: ResponseSentinel,
    headers: RwLock<HashMap<String, String>>,
    fields: FieldBag,
    jsonp_callback: Option<String>,
    debug_wrap: AtomicBool,
}

impl Response {
    /// Creates the facade for one invocation.
    #[must_use]
    pub fn new(jsonp_callback: Option<String>) -> Self {
        Self {
            sentinel: ResponseSentinel::new(),
            headers: RwLock::new(HashMap::new()),
            fields: FieldBag::new(),
            jsonp_callback,
            debug_wrap: AtomicBool::new(false),
        }
    }

    /// Returns the bag of fields steps have attached to the response.
    #[must_use]
    pub fn fields(&self) -> &FieldBag {
        &self.fields
    }

    /// Sets a single response header.
    pub fn header(&self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.write().insert(key.into(), value.into());
    }

    /// Replaces the whole response header map.
    pub fn replace_headers(&self, headers: HashMap<String, String>) {
        *self.headers.write() = headers;
    }

    /// Returns a copy of the current response headers.
    #[must_use]
    pub fn header_map(&self) -> HashMap<String, String> {
        self.headers.read().clone()
    }

    /// Emits a 200 response with the given body.
    pub fn send(&self, body: impl Into<String>) {
        self.send_status(200, body);
    }

    /// Emits a response with an explicit status code.
    ///
    /// When no content type was set, the body is sniffed: an `<html>`
    /// substring selects `text/html`, anything else `text/plain`.
    pub fn send_status(&self, status: u16, body: impl Into<String>) {
        if self.sentinel.was_sent() {
            return;
        }
        let body = body.into();
        {
            let mut headers = self.headers.write();
            if !headers.contains_key(CONTENT_TYPE) {
                let content_type = if body.contains("<html>") {
                    "text/html"
                } else {
                    "text/plain"
                };
                headers.insert(CONTENT_TYPE.to_string(), content_type.to_string());
            }
        }
        let headers = self.header_map();
        self.finish(status, headers, body);
    }

    /// Emits a 200 JSON response.
    pub fn json(&self, value: &Value) {
        self.json_status(200, value);
    }

    /// Emits a JSON response with an explicit status code.
    ///
    /// When the request carried a `callback` or `cb` query parameter the
    /// body is wrapped as a JSONP call instead.
    pub fn json_status(&self, status: u16, value: &Value) {
        self.emit_json(status, value, self.jsonp_callback.as_deref());
    }

    /// Emits a JSONP response wrapped in the given callback name.
    pub fn jsonp(&self, status: u16, value: &Value, callback: &str) {
        self.emit_json(status, value, Some(callback));
    }

    /// Emits a 400 error response.
    pub fn error(&self, err: impl Into<StepError>) {
        self.error_status(400, err);
    }

    /// Emits an error response with an explicit status code.
    ///
    /// The body is the JSON serialization of the normalized error.
    pub fn error_status(&self, status: u16, err: impl Into<StepError>) {
        let err = err.into();
        let value = serde_json::to_value(&err)
            .unwrap_or_else(|_| serde_json::json!({"message": err.message}));
        self.emit_json(status, &value, self.jsonp_callback.as_deref());
    }

    /// Emits the default error summary: the error object itself for a
    /// single failure, the array for several.
    pub(crate) fn error_many(&self, status: u16, errors: &[StepError]) {
        let value = match errors {
            [] => serde_json::json!({"message": "pipeline failed"}),
            [single] => serde_json::to_value(single)
                .unwrap_or_else(|_| serde_json::json!({"message": single.message})),
            many => serde_json::to_value(many)
                .unwrap_or_else(|_| serde_json::json!({"message": "pipeline failed"})),
        };
        self.emit_json(status, &value, self.jsonp_callback.as_deref());
    }

    /// Emits a 301 redirect to the given location.
    ///
    /// The redirect carries only its `Location` header; the accumulated
    /// header map is not applied.
    pub fn redirect(&self, location: impl Into<String>) {
        let mut headers = HashMap::new();
        headers.insert("Location".to_string(), location.into());
        self.deliver_or_drop(PlatformResponse {
            status_code: 301,
            headers,
            body: String::new(),
        });
    }

    /// Resolves a step-style result into a JSON or error response.
    pub fn complete<E: Into<StepError>>(&self, result: Result<Value, E>) {
        match result {
            Ok(value) => self.json(&value),
            Err(err) => self.error(err),
        }
    }

    /// Signals end-of-processing, emitting an empty 200 response if none
    /// was delivered yet.
    pub fn end(&self) {
        if !self.sentinel.was_sent() {
            self.send("");
        }
        self.sentinel.mark_ended();
    }

    /// Returns true once a response has been delivered.
    #[must_use]
    pub fn was_sent(&self) -> bool {
        self.sentinel.was_sent()
    }

    /// Returns true once end-of-processing was signalled.
    #[must_use]
    pub fn was_ended(&self) -> bool {
        self.sentinel.was_ended()
    }

    /// Switches on the debug wrapping mode for delivered bodies.
    pub(crate) fn set_debug(&self) {
        self.debug_wrap.store(true, Ordering::SeqCst);
    }

    /// Takes the delivered response out of the sentinel.
    pub(crate) fn take_response(&self) -> Option<PlatformResponse> {
        self.sentinel.take()
    }

    fn emit_json(&self, status: u16, value: &Value, callback: Option<&str>) {
        if self.sentinel.was_sent() {
            return;
        }
        let text = match serde_json::to_string(value) {
            Ok(text) => text,
            Err(err) => {
                self.header(CONTENT_TYPE, "application/json");
                self.send_status(
                    400,
                    format!(r#"{{"message":"response serialization failed: {err}"}}"#),
                );
                return;
            }
        };
        match callback {
            Some(cb) => {
                self.header(CONTENT_TYPE, "application/javascript");
                self.send_status(status, format!("{cb}({text});"));
            }
            None => {
                self.header(CONTENT_TYPE, "application/json");
                self.send_status(status, text);
            }
        }
    }

    fn finish(&self, status: u16, headers: HashMap<String, String>, body: String) {
        let response = if self.debug_wrap.load(Ordering::SeqCst) {
            let wrapped = serde_json::json!({
                "statusCode": status,
                "headers": headers,
                "body": body,
            });
            PlatformResponse {
                status_code: status,
                headers,
                body: wrapped.to_string(),
            }
        } else {
            PlatformResponse {
                status_code: status,
                headers,
                body,
            }
        };
        self.deliver_or_drop(response);
    }

    fn deliver_or_drop(&self, response: PlatformResponse) {
        if !self.sentinel.deliver(response) {
            debug!("response already delivered; duplicate emission dropped");
        }
    }
}
