//! Index document types.
//!
//! A `SolrDocument` is an open field map. The indexer does not own the metadata
//! schema, so fields are kept as JSON values and only a handful of well-known
//! keys get typed accessors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the index-safe document identifier.
pub const ID_FIELD: &str = "id";

/// Field holding the original metadata identifier.
pub const METADATA_IDENTIFIER_FIELD: &str = "metadata_identifier";

/// Field marking a dataset as the parent of other datasets.
pub const IS_PARENT_FIELD: &str = "isParent";

/// Document representation for the search index.
///
/// Serializes to a flat JSON object, which is what the Solr JSON update
/// handler expects.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SolrDocument {
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl SolrDocument {
    /// Create a document with its index id and metadata identifier set.
    ///
    /// # Example
    ///
    /// ```
    /// use solr_indexer_shared::SolrDocument;
    ///
    /// let doc = SolrDocument::new("no-met-1234", "no.met:1234");
    /// assert_eq!(doc.id(), Some("no-met-1234"));
    /// assert_eq!(doc.metadata_identifier(), Some("no.met:1234"));
    /// ```
    pub fn new(id: impl Into<String>, metadata_identifier: impl Into<String>) -> Self {
        let mut doc = Self::default();
        doc.set(ID_FIELD, id.into());
        doc.set(METADATA_IDENTIFIER_FIELD, metadata_identifier.into());
        doc
    }

    /// Create a partial document carrying only the id.
    ///
    /// Used for atomic updates, where every other field is wrapped in a
    /// modifier (see [`SolrDocument::set_atomic`]).
    pub fn partial(id: impl Into<String>) -> Self {
        let mut doc = Self::default();
        doc.set(ID_FIELD, id.into());
        doc
    }

    /// Wrap an existing field map.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The index id, if present and a string.
    pub fn id(&self) -> Option<&str> {
        self.get_str(ID_FIELD)
    }

    /// The metadata identifier, if present and a string.
    pub fn metadata_identifier(&self) -> Option<&str> {
        self.get_str(METADATA_IDENTIFIER_FIELD)
    }

    /// Whether the document is flagged as a parent dataset.
    pub fn is_parent(&self) -> bool {
        self.fields
            .get(IS_PARENT_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a string field. Single-element arrays are unwrapped.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.as_str()),
            Value::Array(items) if items.len() == 1 => items[0].as_str(),
            _ => None,
        }
    }

    /// Get a field as a list of strings. A scalar string becomes a one-element list.
    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        match self.fields.get(key) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Set a field using the Solr atomic update `set` modifier.
    pub fn set_atomic(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let mut modifier = Map::new();
        modifier.insert("set".to_string(), value.into());
        self.fields.insert(key.into(), Value::Object(modifier));
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
