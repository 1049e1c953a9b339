//! Shallow merge patches.

use serde_json::{Map, Value};

/// A static patch applied to the invocation context without suspension.
///
/// A merge step carries one of these. The `req` part unions into the
/// request bag and the `res` part into the response's field bag; both are
/// shallow merges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePatch {
    /// Fields to union into the request bag.
    pub req: Option<Map<String, Value>>,

    /// Fields to union into the response's field bag.
    pub res: Option<Map<String, Value>>,
}

impl MergePatch {
    /// Creates a request-only patch.
    #[must_use]
    pub fn req(fields: Map<String, Value>) -> Self {
        Self {
            req: Some(fields),
            res: None,
        }
    }

    /// Creates a response-only patch.
    #[must_use]
    pub fn res(fields: Map<String, Value>) -> Self {
        Self {
            req: None,
            res: Some(fields),
        }
    }

    /// Interprets a merge-step value.
    ///
    /// An object with `req` and/or `res` object fields becomes a patch of
    /// those parts; any other object is treated as a bare request patch.
    /// Non-objects produce an empty patch. The interpretation happens once,
    /// when the step is constructed, never per invocation.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };

        let req_part = match map.get("req") {
            Some(Value::Object(_)) => map.remove("req"),
            _ => None,
        };
        let res_part = match map.get("res") {
            Some(Value::Object(_)) => map.remove("res"),
            _ => None,
        };

        if req_part.is_none() && res_part.is_none() {
            return Self::req(map);
        }

        Self {
            req: req_part.and_then(into_object),
            res: res_part.and_then(into_object),
        }
    }

    /// Interprets a function step's resolved value.
    ///
    /// Only the explicit `{"req": {..}}` / `{"res": {..}}` shape triggers a
    /// merge; scalars, nulls, arrays, and bare objects are no-ops and yield
    /// `None`.
    #[must_use]
    pub fn from_step_value(value: &Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };

        let req_part = match map.get("req") {
            Some(Value::Object(fields)) => Some(fields.clone()),
            _ => None,
        };
        let res_part = match map.get("res") {
            Some(Value::Object(fields)) => Some(fields.clone()),
            _ => None,
        };

        if req_part.is_none() && res_part.is_none() {
            return None;
        }

        Some(Self {
            req: req_part,
            res: res_part,
        })
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.req.as_ref().map_or(true, Map::is_empty)
            && self.res.as_ref().map_or(true, Map::is_empty)
    }
}

fn into_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
