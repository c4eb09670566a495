//! Search query types for the index.
//!
//! Queries are restricted to a single `FIELD:VALUE` term, which is what the
//! search command line accepts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of rows returned by a query.
pub const DEFAULT_ROWS: usize = 10;

/// A single-field search query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldQuery {
    /// The field to match.
    pub field: String,

    /// The value to match. May contain Solr wildcards.
    pub value: String,

    /// Maximum number of rows to return.
    #[serde(default = "default_rows")]
    pub rows: usize,
}

fn default_rows() -> usize {
    DEFAULT_ROWS
}

/// Error returned when a `FIELD:VALUE` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParseError(pub String);

impl fmt::Display for QueryParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not a valid search string, expected FIELD:VALUE", self.0)
    }
}

impl std::error::Error for QueryParseError {}

impl FieldQuery {
    /// Create a new query.
    ///
    /// # Example
    ///
    /// ```
    /// use solr_indexer_shared::FieldQuery;
    ///
    /// let query = FieldQuery::new("collection", "NBS");
    /// assert_eq!(query.to_query_string(), "collection:NBS");
    /// ```
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            rows: DEFAULT_ROWS,
        }
    }

    /// Set the number of rows to return.
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    /// Render as a Solr `q` parameter.
    pub fn to_query_string(&self) -> String {
        format!("{}:{}", self.field, self.value)
    }
}

impl FromStr for FieldQuery {
    type Err = QueryParseError;

    /// Parse `FIELD:VALUE`. The split happens at the first colon so values
    /// may themselves contain colons (e.g. `metadata_identifier:no.met:abc`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s
            .split_once(':')
            .ok_or_else(|| QueryParseError(s.to_string()))?;
        let field = field.trim();
        let value = value.trim();

        if field.is_empty() || value.is_empty() {
            return Err(QueryParseError(s.to_string()));
        }
        if !field.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(QueryParseError(s.to_string()));
        }

        Ok(Self::new(field, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_value() {
        let query: FieldQuery = "collection:NBS".parse().unwrap();
        assert_eq!(query.field, "collection");
        assert_eq!(query.value, "NBS");
        assert_eq!(query.rows, DEFAULT_ROWS);
    }

    #[test]
    fn test_parse_keeps_colons_in_value() {
        let query: FieldQuery = "metadata_identifier:no.met:abc".parse().unwrap();
        assert_eq!(query.field, "metadata_identifier");
        assert_eq!(query.value, "no.met:abc");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["collection", ":NBS", "collection:", "bad field:x", "a-b:c"] {
            assert!(input.parse::<FieldQuery>().is_err(), "accepted {input}");
        }
    }
}
