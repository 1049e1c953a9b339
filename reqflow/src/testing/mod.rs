//! Test fixtures for exercising handlers end to end.

use crate::event::{PlatformContext, PlatformEvent};
use std::collections::HashMap;

/// A platform event with one marker value in every request part.
///
/// Query `{"query": "true"}`, path `{"path": "true"}`, header
/// `{"header": "true"}`, and a JSON body `{"body": true}` — enough to
/// assert that each part reaches the request bag.
#[must_use]
pub fn sample_event() -> PlatformEvent {
    PlatformEvent {
        query_string_parameters: Some(single("query", "true")),
        path_parameters: Some(single("path", "true")),
        headers: Some(single("header", "true")),
        body: Some(r#"{"body":true}"#.to_string()),
        ..PlatformEvent::default()
    }
}

/// A platform context naming a test function.
#[must_use]
pub fn sample_context() -> PlatformContext {
    PlatformContext {
        function_name: Some("test-function".to_string()),
        request_id: Some("req-1".to_string()),
        ..PlatformContext::default()
    }
}

fn single(key: &str, value: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert(key.to_string(), value.to_string());
    map
}
