//! Utility functions for the indexer repository.

/// Characters in a metadata identifier that Solr does not accept in `id`.
const ID_REPLACEMENTS: [char; 3] = [':', '/', '.'];

/// Translate a metadata identifier to the index-safe id syntax.
///
/// `:`, `/` and `.` are replaced by `-`.
///
/// # Example
///
/// ```
/// use solr_indexer_repository::to_solr_id;
///
/// assert_eq!(
///     to_solr_id("no.met:b7cb7934-77ca-4439-812e-f560df3fe7eb"),
///     "no-met-b7cb7934-77ca-4439-812e-f560df3fe7eb",
/// );
/// ```
pub fn to_solr_id(metadata_identifier: &str) -> String {
    metadata_identifier.replace(ID_REPLACEMENTS, "-")
}
