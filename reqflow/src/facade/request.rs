//! Initial request-field construction from the platform event.

use crate::event::PlatformEvent;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Builds the initial request bag contents for one invocation.
///
/// Path parameters are exposed under both `params` and `path`; the body is
/// JSON-parsed when parseable and kept as the raw string otherwise. Steps
/// attach further fields next to these.
#[must_use]
pub fn request_fields(event: &PlatformEvent) -> Map<String, Value> {
    let mut fields = Map::new();

    fields.insert(
        "query".to_string(),
        string_map_to_object(event.query_string_parameters.as_ref()),
    );

    let params = string_map_to_object(event.path_parameters.as_ref());
    fields.insert("params".to_string(), params.clone());
    fields.insert("path".to_string(), params);

    fields.insert(
        "headers".to_string(),
        string_map_to_object(event.headers.as_ref()),
    );

    fields.insert("body".to_string(), parse_body(event.body.as_deref()));

    fields
}

/// Finds the JSONP callback name in the query string, if any.
///
/// `callback` wins over `cb`.
#[must_use]
pub fn jsonp_callback(event: &PlatformEvent) -> Option<String> {
    event
        .query_param("callback")
        .or_else(|| event.query_param("cb"))
        .map(ToString::to_string)
}

fn string_map_to_object(map: Option<&HashMap<String, String>>) -> Value {
    let mut object = Map::new();
    if let Some(map) = map {
        for (key, value) in map {
            object.insert(key.clone(), Value::String(value.clone()));
        }
    }
    Value::Object(object)
}

fn parse_body(body: Option<&str>) -> Value {
    match body {
        None | Some("") => Value::String(String::new()),
        Some(raw) => serde_json::from_str(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event_with_body(body: &str) -> PlatformEvent {
        PlatformEvent {
            body: Some(body.to_string()),
            ..PlatformEvent::default()
        }
    }

    #[test]
    fn test_json_body_is_parsed() {
        let fields = request_fields(&event_with_body(r#"{"body":true}"#));
        assert_eq!(fields["body"], json!({"body": true}));
    }

    #[test]
    fn test_unparseable_body_stays_raw() {
        let fields = request_fields(&event_with_body("not json"));
        assert_eq!(fields["body"], json!("not json"));
    }

    #[test]
    fn test_missing_body_is_empty_string() {
        let fields = request_fields(&PlatformEvent::default());
        assert_eq!(fields["body"], json!(""));
    }

    #[test]
    fn test_params_mirrored_as_path() {
        let mut event = PlatformEvent::default();
        event.path_parameters =
            Some([("id".to_string(), "42".to_string())].into_iter().collect());
        let fields = request_fields(&event);
        assert_eq!(fields["params"], json!({"id": "42"}));
        assert_eq!(fields["path"], fields["params"]);
    }

    #[test]
    fn test_jsonp_callback_prefers_callback_over_cb() {
        let mut event = PlatformEvent::default();
        event.query_string_parameters = Some(
            [
                ("callback".to_string(), "render".to_string()),
                ("cb".to_string(), "other".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(jsonp_callback(&event), Some("render".to_string()));

        let mut event = PlatformEvent::default();
        event.query_string_parameters =
            Some([("cb".to_string(), "other".to_string())].into_iter().collect());
        assert_eq!(jsonp_callback(&event), Some("other".to_string()));
    }
}
