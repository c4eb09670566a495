//! Date handling for index date fields.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

/// The only date syntax the index accepts: UTC with a literal `Z`.
static SOLR_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?Z$").expect("valid date regex")
});

/// An offset followed by a stray `Z`, e.g. `2020-01-01T00:00:00+00:00Z`.
static OFFSET_WITH_Z: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+-]\d{2}:\d{2}Z$").expect("valid offset regex"));

const SOLR_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Whether `date` is already in index date syntax.
pub fn is_solr_date(date: &str) -> bool {
    SOLR_DATE.is_match(date)
}

/// Rewrite a date into index date syntax.
///
/// Accepts RFC 3339 with any offset (converted to UTC), naive date-times
/// (taken as UTC) and plain dates (midnight UTC).
///
/// # Returns
///
/// `None` if the value cannot be read as a date.
pub fn normalize_date(raw: &str) -> Option<String> {
    let date = raw.trim();
    if is_solr_date(date) {
        return Some(date.to_string());
    }

    let date = if OFFSET_WITH_Z.is_match(date) {
        &date[..date.len() - 1]
    } else {
        date
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Some(parsed.with_timezone(&Utc).format(SOLR_FORMAT).to_string());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(date, format) {
            return Some(parsed.and_utc().format(SOLR_FORMAT).to_string());
        }
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return parsed
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().format(SOLR_FORMAT).to_string());
    }
    None
}
