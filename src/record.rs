//! Record model
//!
//! Every stored value implements [`Item`]: it exposes its key and knows how to
//! merge its own patch type. [`Document`] is the schemaless variant used by the
//! CLI and HTTP surfaces; typed variants live in [`crate::models`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::storage::schema::KEY_PATH;

/// Field refreshed by `update`
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// A record that can live in a collection
pub trait Item: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Partial update for this record type
    type Patch: Clone + Send + 'static;

    fn id(&self) -> &str;

    /// Merge `patch` over the record. Must leave the id unchanged.
    fn apply(&mut self, patch: Self::Patch);

    /// Refresh the record's timestamp, if it has one
    fn touch(&mut self, _now_ms: i64) {}
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A schemaless record: an id plus arbitrary JSON fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Build a document from a JSON object with the given id.
    /// An `id` field inside the object is ignored.
    pub fn from_object(id: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        fields.remove(KEY_PATH);
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if key != KEY_PATH {
            self.fields.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.fields.get(TIMESTAMP_FIELD).and_then(Value::as_i64)
    }
}

impl Item for Document {
    type Patch = DocumentPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, patch: DocumentPatch) {
        for (key, value) in patch.fields {
            if key != KEY_PATH {
                self.fields.insert(key, value);
            }
        }
    }

    fn touch(&mut self, now_ms: i64) {
        let now = self.timestamp().map_or(now_ms, |prev| prev.max(now_ms));
        self.fields.insert(TIMESTAMP_FIELD.to_string(), Value::from(now));
    }
}

/// Field-by-field merge for [`Document`].
///
/// Present keys overwrite, an explicit `null` stores null, absent keys are
/// left alone. The key field can not be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentPatch {
    pub fields: Map<String, Value>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for DocumentPatch {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}
