//! Thread-safe field storage for request and response data.

use parking_lot::RwLock;
use serde_json::{Map, Value};

/// A thread-safe bag of named JSON fields.
///
/// Unlike a plain map this is shared by reference across all steps of one
/// invocation, including concurrent members of a parallel group. Writes
/// overwrite same-named fields (last write wins); merging is a shallow
/// union that never discards fields absent from the patch.
#[derive(Debug, Default)]
pub struct FieldBag {
    data: RwLock<Map<String, Value>>,
}

impl FieldBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bag from an existing object.
    #[must_use]
    pub fn from_object(data: Map<String, Value>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Gets a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    /// Checks if a field exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Sets a field, overwriting any existing value.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.data.write().insert(key.into(), value);
    }

    /// Shallow-merges a patch into the bag.
    ///
    /// Fields in the patch overwrite same-named fields; nested objects are
    /// replaced wholesale, not recursively merged.
    pub fn merge(&self, patch: &Map<String, Value>) {
        let mut data = self.data.write();
        for (key, value) in patch {
            data.insert(key.clone(), value.clone());
        }
    }

    /// Updates a field in place, inserting JSON null first if absent.
    pub fn update(&self, key: impl Into<String>, f: impl FnOnce(&mut Value)) {
        let mut data = self.data.write();
        let entry = data.entry(key.into()).or_insert(Value::Null);
        f(entry);
    }

    /// Appends a value to an array field, creating the array if needed.
    ///
    /// A non-array existing value is replaced by a one-element array before
    /// the append.
    pub fn push(&self, key: impl Into<String>, value: Value) {
        self.update(key, |entry| match entry {
            Value::Array(items) => items.push(value),
            Value::Null => *entry = Value::Array(vec![value]),
            other => {
                let first = other.take();
                *other = Value::Array(vec![first, value]);
            }
        });
    }

    /// Returns a copy of all fields.
    #[must_use]
    pub fn to_object(&self) -> Map<String, Value> {
        self.data.read().clone()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the bag has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns all field names.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }
}

impl Clone for FieldBag {
    fn clone(&self) -> Self {
        Self {
            data: RwLock::new(self.data.read().clone()),
        }
    }
}
