//! MMD record to index document mapping.
//!
//! Covers the identification, temporal, spatial, keyword, personnel,
//! related information and data access parts of an MMD record.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use solr_indexer_repository::to_solr_id;
use solr_indexer_shared::SolrDocument;
use tracing::{debug, warn};

use crate::errors::IngestError;
use crate::processor::dates::normalize_date;
use crate::xml::Element;

/// Placeholder for required elements that are absent.
pub const UNKNOWN: &str = "Unknown";

/// Elements every MMD record is expected to carry.
pub const REQUIRED_ELEMENTS: [&str; 10] = [
    "metadata_version",
    "metadata_identifier",
    "title",
    "abstract",
    "metadata_status",
    "dataset_production_status",
    "collection",
    "last_metadata_update",
    "iso_topic_category",
    "keywords",
];

const PERSONNEL_ROLES: [(&str, &str); 4] = [
    ("Investigator", "investigator"),
    ("Technical contact", "technical"),
    ("Metadata author", "metadata_author"),
    ("Data center contact", "datacenter"),
];

const RELATED_INFORMATION_TYPES: [(&str, &str); 10] = [
    ("Dataset landing page", "landing_page"),
    ("Users guide", "user_guide"),
    ("Project home page", "home_page"),
    ("Observation facility", "obs_facility"),
    ("Extended metadata", "ext_metadata"),
    ("Scientific publication", "scientific_publication"),
    ("Data paper", "data_paper"),
    ("Data management plan", "data_management_plan"),
    ("Other documentation", "other_documentation"),
    ("Software", "software"),
];

const GLOBAL_ENVELOPE: &str = "ENVELOPE(-180,180,90,-90)";

/// Parse an MMD document and check that its root is `mmd`.
pub fn parse(xml: &str) -> Result<Element, IngestError> {
    let root = Element::parse(xml).map_err(|e| IngestError::build(format!("invalid XML: {}", e)))?;
    if root.name != "mmd" {
        return Err(IngestError::build(format!(
            "root element is '{}', expected 'mmd'",
            root.name
        )));
    }
    Ok(root)
}

/// Required elements that are absent or empty.
pub fn missing_required(root: &Element) -> Vec<&'static str> {
    REQUIRED_ELEMENTS
        .into_iter()
        .filter(|name| match root.child(name) {
            Some(element) => element.text().is_empty() && element.children.is_empty(),
            None => true,
        })
        .collect()
}

/// Map an MMD record to an index document.
///
/// Missing required scalar elements become [`UNKNOWN`]. A missing or
/// unreadable temporal extent, or an invalid bounding box, is a build error.
pub fn to_solr(root: &Element) -> Result<SolrDocument, IngestError> {
    let metadata_identifier = root.child_text("metadata_identifier").unwrap_or(UNKNOWN);
    let mut doc = SolrDocument::new(to_solr_id(metadata_identifier), metadata_identifier);
    let mut lists: BTreeMap<String, Vec<String>> = BTreeMap::new();

    map_last_metadata_update(root, &mut doc)?;
    doc.set(
        "metadata_status",
        root.child_text("metadata_status").unwrap_or(UNKNOWN),
    );

    let collection = root.child_texts("collection");
    if collection.is_empty() {
        doc.set("collection", UNKNOWN);
    } else {
        doc.set("collection", collection);
    }

    doc.set(
        "title",
        lang_text(root, "title").unwrap_or_else(|| UNKNOWN.to_string()),
    );
    doc.set(
        "abstract",
        lang_text(root, "abstract").unwrap_or_else(|| UNKNOWN.to_string()),
    );

    map_temporal_extent(root, &mut doc)?;
    map_geographic_extent(root, &mut doc)?;

    doc.set(
        "dataset_production_status",
        root.child_text("dataset_production_status")
            .unwrap_or(UNKNOWN),
    );
    for name in ["dataset_language", "operational_status", "access_constraint"] {
        if let Some(value) = root.child_text(name) {
            doc.set(name, value);
        }
    }
    map_use_constraint(root, &mut doc);

    let topics = root.child_texts("iso_topic_category");
    doc.set(
        "iso_topic_category",
        if topics.is_empty() {
            vec![UNKNOWN.to_string()]
        } else {
            topics
        },
    );

    map_keywords(root, &mut lists);
    map_personnel(root, &mut lists);
    map_related_information(root, &mut lists);
    map_data_access(root, &mut doc);
    map_related_dataset(root, &mut doc);
    map_storage_information(root, &mut doc);

    for (key, values) in lists {
        doc.set(key, values);
    }
    Ok(doc)
}

/// Identifier and data access fields only, for runs that touch nothing but
/// the thumbnail.
pub fn access_document(root: &Element) -> SolrDocument {
    let metadata_identifier = root.child_text("metadata_identifier").unwrap_or(UNKNOWN);
    let mut doc = SolrDocument::new(to_solr_id(metadata_identifier), metadata_identifier);
    map_data_access(root, &mut doc);
    doc
}

/// The English variant of a possibly multilingual element, else the one
/// without a language tag, else the first.
fn lang_text(root: &Element, name: &str) -> Option<String> {
    let candidates: Vec<&Element> = root
        .children_named(name)
        .filter(|e| !e.text().is_empty())
        .collect();
    candidates
        .iter()
        .find(|e| e.attr("lang") == Some("en"))
        .or_else(|| candidates.iter().find(|e| e.attr("lang").is_none()))
        .or_else(|| candidates.first())
        .map(|e| e.text().to_string())
}

fn map_last_metadata_update(root: &Element, doc: &mut SolrDocument) -> Result<(), IngestError> {
    let Some(lmu) = root.child("last_metadata_update") else {
        return Ok(());
    };

    let mut datetimes = Vec::new();
    let mut types = Vec::new();
    let mut notes = Vec::new();
    for update in lmu.children_named("update") {
        let raw = update.child_text("datetime").unwrap_or_default();
        let datetime = normalize_date(raw).ok_or_else(|| {
            IngestError::build(format!("invalid last_metadata_update datetime '{}'", raw))
        })?;
        datetimes.push(datetime);
        types.push(update.child_text("type").unwrap_or_default().to_string());
        notes.push(update.child_text("note").unwrap_or("Not provided").to_string());
    }

    if !datetimes.is_empty() {
        doc.set("last_metadata_update_datetime", datetimes);
        doc.set("last_metadata_update_type", types);
        doc.set("last_metadata_update_note", notes);
    }
    Ok(())
}

fn parse_instant(date: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(date).ok()
}

fn map_temporal_extent(root: &Element, doc: &mut SolrDocument) -> Result<(), IngestError> {
    let extents: Vec<&Element> = root.children_named("temporal_extent").collect();
    if extents.is_empty() {
        return Err(IngestError::build("missing temporal_extent start_date"));
    }

    let mut start: Option<(DateTime<FixedOffset>, String)> = None;
    let mut end: Option<(DateTime<FixedOffset>, String)> = None;
    let mut open_ended = false;

    for extent in extents {
        let raw = extent
            .child_text("start_date")
            .ok_or_else(|| IngestError::build("missing temporal_extent start_date"))?;
        let value = normalize_date(raw)
            .ok_or_else(|| IngestError::build(format!("incompatible start date '{}'", raw)))?;
        let instant = parse_instant(&value)
            .ok_or_else(|| IngestError::build(format!("incompatible start date '{}'", raw)))?;
        if start.as_ref().map_or(true, |(current, _)| instant < *current) {
            start = Some((instant, value));
        }

        match extent.child_text("end_date") {
            Some(raw) => {
                let value = normalize_date(raw)
                    .ok_or_else(|| IngestError::build(format!("incompatible end date '{}'", raw)))?;
                let instant = parse_instant(&value)
                    .ok_or_else(|| IngestError::build(format!("incompatible end date '{}'", raw)))?;
                if end.as_ref().map_or(true, |(current, _)| instant > *current) {
                    end = Some((instant, value));
                }
            }
            None => open_ended = true,
        }
    }

    let Some((_, start)) = start else {
        return Err(IngestError::build("missing temporal_extent start_date"));
    };
    doc.set("temporal_extent_start_date", start.as_str());
    match end {
        Some((_, end)) if !open_ended => {
            doc.set("temporal_extent_period_dr", format!("[{} TO {}]", start, end));
            doc.set("temporal_extent_end_date", end);
        }
        _ => doc.set("temporal_extent_period_dr", format!("[{} TO *]", start)),
    }
    Ok(())
}

/// Wrap a longitude from 0..360 into -180..180.
fn rewrap(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

fn coordinate(rectangle: &Element, name: &str) -> Result<f64, IngestError> {
    let raw = rectangle
        .child_text(name)
        .ok_or_else(|| IngestError::build(format!("missing spatial bound '{}'", name)))?;
    raw.parse::<f64>()
        .map_err(|_| IngestError::build(format!("spatial bound '{}' is not a number: {}", name, raw)))
}

fn map_geographic_extent(root: &Element, doc: &mut SolrDocument) -> Result<(), IngestError> {
    let rectangles: Vec<&Element> = root
        .children_named("geographic_extent")
        .filter_map(|e| e.child("rectangle"))
        .collect();

    let (north, south, east, west) = match rectangles.as_slice() {
        [] => return Ok(()),
        [rectangle] => {
            let north = coordinate(rectangle, "north")?;
            let south = coordinate(rectangle, "south")?;
            let east = coordinate(rectangle, "east")?;
            let west = coordinate(rectangle, "west")?;
            if north < south {
                return Err(IngestError::build(
                    "northernmost boundary is south of southernmost",
                ));
            }
            if east < west {
                return Err(IngestError::build(
                    "easternmost boundary is west of westernmost",
                ));
            }
            if [east, west].iter().any(|lon| !(-180.0..=180.0).contains(lon)) {
                return Err(IngestError::build("longitudes outside valid range"));
            }
            if [north, south].iter().any(|lat| !(-90.0..=90.0).contains(lat)) {
                return Err(IngestError::build("latitudes outside valid range"));
            }
            if let Some(srs) = rectangle.attr("srsName") {
                doc.set("geographic_extent_rectangle_srsName", srs);
            }
            (north, south, east, west)
        }
        many => {
            warn!(count = many.len(), "Multiple bounding boxes, flattening");
            let mut lats = Vec::new();
            let mut lons = Vec::new();
            for rectangle in many {
                for name in ["north", "south"] {
                    if let Ok(v) = coordinate(rectangle, name) {
                        lats.push(v);
                    }
                }
                for name in ["east", "west"] {
                    if let Ok(v) = coordinate(rectangle, name) {
                        lons.push(v);
                    }
                }
            }
            if lats.is_empty() || lons.is_empty() {
                (90.0, -90.0, 180.0, -180.0)
            } else {
                let mut min_lon = lons.iter().copied().fold(f64::INFINITY, f64::min);
                let mut max_lon = lons.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if min_lon < -180.0 {
                    min_lon = rewrap(min_lon);
                }
                if max_lon > 180.0 {
                    max_lon = rewrap(max_lon);
                }
                (
                    lats.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    lats.iter().copied().fold(f64::INFINITY, f64::min),
                    min_lon.max(max_lon),
                    min_lon.min(max_lon),
                )
            }
        }
    };

    doc.set("geographic_extent_rectangle_north", north);
    doc.set("geographic_extent_rectangle_south", south);
    doc.set("geographic_extent_rectangle_east", east);
    doc.set("geographic_extent_rectangle_west", west);

    let envelope = format!("ENVELOPE({},{},{},{})", west, east, north, south);
    if north == south && east == west {
        doc.set("polygon_rpt", format!("POINT({} {})", east, north));
    } else {
        doc.set(
            "polygon_rpt",
            format!(
                "POLYGON(({w} {s}, {e} {s}, {e} {n}, {w} {n}, {w} {s}))",
                w = west,
                e = east,
                n = north,
                s = south
            ),
        );
    }
    if envelope != GLOBAL_ENVELOPE {
        doc.set("geospatial_bounds", envelope.as_str());
    }
    doc.set("bbox", envelope);
    Ok(())
}

fn map_use_constraint(root: &Element, doc: &mut SolrDocument) {
    let Some(constraint) = root.child("use_constraint") else {
        return;
    };
    match (
        constraint.child_text("identifier"),
        constraint.child_text("resource"),
    ) {
        (Some(identifier), Some(resource)) => {
            doc.set("use_constraint_identifier", identifier);
            doc.set("use_constraint_resource", resource);
        }
        _ => {
            doc.set("use_constraint_identifier", "Not provided");
            doc.set("use_constraint_resource", "Not provided");
        }
    }
    if let Some(text) = constraint.child_text("license_text") {
        doc.set("use_constraint_license_text", text);
    }
}

fn push(lists: &mut BTreeMap<String, Vec<String>>, key: impl Into<String>, value: impl Into<String>) {
    lists.entry(key.into()).or_default().push(value.into());
}

/// `keywords_keyword` holds every keyword; `keywords_gcmd` and
/// `keywords_wigos` repeat the ones from those vocabularies for faceting.
fn map_keywords(root: &Element, lists: &mut BTreeMap<String, Vec<String>>) {
    for group in root.children_named("keywords") {
        let vocabulary = group.attr("vocabulary").unwrap_or("None");
        for keyword in group.child_texts("keyword") {
            match vocabulary.to_uppercase().as_str() {
                "GCMDSK" => push(lists, "keywords_gcmd", keyword.as_str()),
                "WIGOS" => push(lists, "keywords_wigos", keyword.as_str()),
                _ => {}
            }
            push(lists, "keywords_vocabulary", vocabulary);
            push(lists, "keywords_keyword", keyword);
        }
    }
}

fn map_personnel(root: &Element, lists: &mut BTreeMap<String, Vec<String>>) {
    for person in root.children_named("personnel") {
        let Some(role) = person.child_text("role") else {
            warn!("No role available for personnel");
            continue;
        };
        let Some((_, prefix)) = PERSONNEL_ROLES.iter().find(|(name, _)| *name == role) else {
            warn!(role = %role, "Unknown personnel role");
            continue;
        };

        push(lists, "personnel_role", role);
        for entry in &person.children {
            match entry.name.as_str() {
                "role" => push(lists, format!("personnel_{}_role", prefix), role),
                "contact_address" => {
                    for part in &entry.children {
                        if part.text().is_empty() {
                            continue;
                        }
                        let key = if part.name == "address" {
                            format!("personnel_{}_address", prefix)
                        } else {
                            format!("personnel_{}_address_{}", prefix, part.name)
                        };
                        push(lists, key, part.text());
                    }
                }
                name if !entry.text().is_empty() => {
                    if name == "name" {
                        push(lists, "personnel_name", entry.text());
                    } else if name == "organisation" {
                        push(lists, "personnel_organisation", entry.text());
                    }
                    push(lists, format!("personnel_{}_{}", prefix, name), entry.text());
                }
                _ => {}
            }
        }
    }
}

fn map_related_information(root: &Element, lists: &mut BTreeMap<String, Vec<String>>) {
    for info in root.children_named("related_information") {
        let Some(kind) = info.child_text("type") else {
            continue;
        };
        let Some((_, suffix)) = RELATED_INFORMATION_TYPES
            .iter()
            .find(|(name, _)| *name == kind)
        else {
            debug!(kind = %kind, "Ignoring related information type");
            continue;
        };
        let Some(resource) = info.child_text("resource") else {
            continue;
        };
        push(lists, format!("related_url_{}", suffix), resource);
        push(
            lists,
            format!("related_url_{}_desc", suffix),
            info.child_text("description").unwrap_or("Not Available"),
        );
    }
}

/// `data_access_url_<type>` per access entry, where the type is lower-cased
/// with spaces replaced by underscores (`OGC WMS` becomes `ogc_wms`).
fn map_data_access(root: &Element, doc: &mut SolrDocument) {
    for access in root.children_named("data_access") {
        let (Some(kind), Some(resource)) = (access.child_text("type"), access.child_text("resource"))
        else {
            continue;
        };
        let kind = kind.replace(' ', "_").to_lowercase();
        doc.set(format!("data_access_url_{}", kind), resource);

        if kind == "ogc_wms" {
            let layers: Vec<String> = access
                .children_named("wms_layers")
                .flat_map(|l| l.child_texts("wms_layer"))
                .collect();
            if !layers.is_empty() {
                debug!(layers = ?layers, "WMS layers");
                doc.set("data_access_wms_layers", layers);
            }
        }
    }
}

/// Only the parent relation is indexed.
fn map_related_dataset(root: &Element, doc: &mut SolrDocument) {
    let parent = root
        .children_named("related_dataset")
        .filter(|e| !e.text().is_empty())
        .find(|e| matches!(e.attr("relation_type"), Some("parent") | None));
    if let Some(parent) = parent {
        doc.set("related_dataset", parent.text());
        doc.set("related_dataset_id", to_solr_id(parent.text()));
    }
}

fn map_storage_information(root: &Element, doc: &mut SolrDocument) {
    let Some(storage) = root.child("storage_information") else {
        return;
    };
    for name in ["file_name", "file_location", "file_format"] {
        if let Some(value) = storage.child_text(name) {
            doc.set(format!("storage_information_{}", name), value);
        }
    }
    if let Some(size) = storage.child("file_size").filter(|e| !e.text().is_empty()) {
        match size.attr("unit") {
            Some(unit) => {
                doc.set("storage_information_file_size", size.text());
                doc.set("storage_information_file_size_unit", unit);
            }
            None => warn!("Filesize unit not specified, skipping field"),
        }
    }
    if let Some(checksum) = storage.child("checksum").filter(|e| !e.text().is_empty()) {
        match checksum.attr("type") {
            Some(kind) => {
                doc.set("storage_information_file_checksum", checksum.text());
                doc.set("storage_information_file_checksum_type", kind);
            }
            None => warn!("Checksum type is not specified, skipping field"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_mmd(identifier: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<mmd:mmd xmlns:mmd="http://www.met.no/schema/mmd" xmlns:xml="http://www.w3.org/XML/1998/namespace">
  <mmd:metadata_identifier>{identifier}</mmd:metadata_identifier>
  <mmd:title xml:lang="nb">Havis</mmd:title>
  <mmd:title xml:lang="en">Sea ice concentration</mmd:title>
  <mmd:abstract xml:lang="en">Daily sea ice concentration.</mmd:abstract>
  <mmd:metadata_status>Active</mmd:metadata_status>
  <mmd:dataset_production_status>Complete</mmd:dataset_production_status>
  <mmd:collection>ADC</mmd:collection>
  <mmd:collection>NBS</mmd:collection>
  <mmd:last_metadata_update>
    <mmd:update>
      <mmd:datetime>2021-05-01T10:00:00+02:00</mmd:datetime>
      <mmd:type>Created</mmd:type>
    </mmd:update>
  </mmd:last_metadata_update>
  <mmd:temporal_extent>
    <mmd:start_date>2020-01-01T00:00:00Z</mmd:start_date>
    <mmd:end_date>2020-12-31</mmd:end_date>
  </mmd:temporal_extent>
  <mmd:iso_topic_category>oceans</mmd:iso_topic_category>
  <mmd:keywords vocabulary="GCMDSK">
    <mmd:keyword>Earth Science &gt; Cryosphere &gt; Sea Ice</mmd:keyword>
  </mmd:keywords>
  <mmd:geographic_extent>
    <mmd:rectangle srsName="EPSG:4326">
      <mmd:north>90</mmd:north>
      <mmd:south>60</mmd:south>
      <mmd:west>-20</mmd:west>
      <mmd:east>40</mmd:east>
    </mmd:rectangle>
  </mmd:geographic_extent>
  <mmd:personnel>
    <mmd:role>Investigator</mmd:role>
    <mmd:name>Kari Nordmann</mmd:name>
    <mmd:email>kari@example.org</mmd:email>
    <mmd:organisation>MET Norway</mmd:organisation>
  </mmd:personnel>
  <mmd:data_access>
    <mmd:type>OGC WMS</mmd:type>
    <mmd:resource>https://thredds.example.org/wms/ice.nc?service=WMS&amp;version=1.3.0&amp;request=GetCapabilities</mmd:resource>
    <mmd:wms_layers>
      <mmd:wms_layer>ice_conc</mmd:wms_layer>
    </mmd:wms_layers>
  </mmd:data_access>
  <mmd:data_access>
    <mmd:type>OPeNDAP</mmd:type>
    <mmd:resource>https://thredds.example.org/dodsC/ice.nc</mmd:resource>
  </mmd:data_access>
  <mmd:related_information>
    <mmd:type>Dataset landing page</mmd:type>
    <mmd:resource>https://example.org/landing</mmd:resource>
  </mmd:related_information>
</mmd:mmd>"#
        )
    }

    #[test]
    fn test_to_solr_core_fields() {
        let root = parse(&sample_mmd("no.met:abc-123")).unwrap();
        let doc = to_solr(&root).unwrap();

        assert_eq!(doc.id(), Some("no-met-abc-123"));
        assert_eq!(doc.metadata_identifier(), Some("no.met:abc-123"));
        assert_eq!(doc.get_str("title"), Some("Sea ice concentration"));
        assert_eq!(doc.get_str("metadata_status"), Some("Active"));
        assert_eq!(doc.get_str_list("collection"), vec!["ADC", "NBS"]);
        assert_eq!(
            doc.get_str_list("last_metadata_update_datetime"),
            vec!["2021-05-01T08:00:00Z"]
        );
        assert_eq!(
            doc.get_str("temporal_extent_start_date"),
            Some("2020-01-01T00:00:00Z")
        );
        assert_eq!(
            doc.get_str("temporal_extent_end_date"),
            Some("2020-12-31T00:00:00Z")
        );
        assert_eq!(doc.get_str("bbox"), Some("ENVELOPE(-20,40,90,60)"));
        assert_eq!(
            doc.get_str("geographic_extent_rectangle_srsName"),
            Some("EPSG:4326")
        );
        assert_eq!(
            doc.get_str_list("keywords_gcmd"),
            vec!["Earth Science > Cryosphere > Sea Ice"]
        );
        assert_eq!(
            doc.get_str_list("personnel_investigator_email"),
            vec!["kari@example.org"]
        );
        assert_eq!(doc.get_str_list("personnel_organisation"), vec!["MET Norway"]);
        assert_eq!(
            doc.get_str_list("related_url_landing_page"),
            vec!["https://example.org/landing"]
        );
        assert!(doc
            .get_str("data_access_url_ogc_wms")
            .unwrap()
            .contains("GetCapabilities"));
        assert_eq!(
            doc.get_str("data_access_url_opendap"),
            Some("https://thredds.example.org/dodsC/ice.nc")
        );
        assert_eq!(doc.get_str_list("data_access_wms_layers"), vec!["ice_conc"]);
    }

    #[test]
    fn test_missing_required_elements() {
        let root = parse(&sample_mmd("x")).unwrap();
        assert_eq!(missing_required(&root), vec!["metadata_version"]);
    }

    #[test]
    fn test_missing_identifier_becomes_unknown() {
        let xml = sample_mmd("").replace("<mmd:metadata_identifier></mmd:metadata_identifier>", "");
        let doc = to_solr(&parse(&xml).unwrap()).unwrap();
        assert_eq!(doc.metadata_identifier(), Some(UNKNOWN));
    }

    #[test]
    fn test_missing_start_date_is_build_error() {
        let xml = sample_mmd("x").replace(
            "<mmd:start_date>2020-01-01T00:00:00Z</mmd:start_date>",
            "",
        );
        let result = to_solr(&parse(&xml).unwrap());
        assert!(matches!(result, Err(IngestError::BuildError(_))));
    }

    #[test]
    fn test_unreadable_start_date_is_build_error() {
        let xml = sample_mmd("x").replace("2020-01-01T00:00:00Z", "sometime in 2020");
        assert!(to_solr(&parse(&xml).unwrap()).is_err());
    }

    #[test]
    fn test_open_ended_period() {
        let xml = sample_mmd("x").replace("<mmd:end_date>2020-12-31</mmd:end_date>", "");
        let doc = to_solr(&parse(&xml).unwrap()).unwrap();
        assert!(!doc.contains("temporal_extent_end_date"));
        assert_eq!(
            doc.get_str("temporal_extent_period_dr"),
            Some("[2020-01-01T00:00:00Z TO *]")
        );
    }

    #[test]
    fn test_inverted_bbox_is_build_error() {
        let xml = sample_mmd("x")
            .replace("<mmd:north>90</mmd:north>", "<mmd:north>10</mmd:north>");
        assert!(to_solr(&parse(&xml).unwrap()).is_err());
    }

    #[test]
    fn test_wrong_root_is_build_error() {
        assert!(matches!(
            parse("<dif><title>x</title></dif>"),
            Err(IngestError::BuildError(_))
        ));
    }

    #[test]
    fn test_parent_relation() {
        let xml = sample_mmd("x").replace(
            "</mmd:mmd>",
            "<mmd:related_dataset relation_type=\"parent\">no.met:parent-1</mmd:related_dataset></mmd:mmd>",
        );
        let doc = to_solr(&parse(&xml).unwrap()).unwrap();
        assert_eq!(doc.get_str("related_dataset"), Some("no.met:parent-1"));
        assert_eq!(doc.get_str("related_dataset_id"), Some("no-met-parent-1"));
    }

    #[test]
    fn test_access_document_ignores_content() {
        let xml = sample_mmd("x").replace("2020-01-01T00:00:00Z", "not a date");
        let doc = access_document(&parse(&xml).unwrap());
        assert_eq!(doc.id(), Some("x"));
        assert!(doc.contains("data_access_url_ogc_wms"));
        assert!(!doc.contains("title"));
    }

    #[test]
    fn test_rewrap() {
        assert_eq!(rewrap(190.0), -170.0);
        assert_eq!(rewrap(-190.0), 170.0);
        assert_eq!(rewrap(10.0), 10.0);
    }
}
