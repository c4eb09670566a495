//! WMS 1.3.0 capabilities.

use tracing::debug;

use crate::errors::IngestError;
use crate::thumbnail::projection::Extent;
use crate::xml::Element;

/// Layers never picked as a fallback.
const BLACKLISTED_LAYERS: [&str; 5] = ["latitude", "longitude", "lat", "lon", "MS"];

/// A named layer offered by a WMS.
#[derive(Debug, Clone, PartialEq)]
pub struct WmsLayer {
    pub name: String,
    pub title: Option<String>,
    pub styles: Vec<String>,
    /// WGS84 extent `[west, east, south, north]`, inherited from the parent
    /// layer when the layer declares none.
    pub bbox: Option<Extent>,
}

/// Named layers of a `GetCapabilities` response, in document order.
pub fn parse_capabilities(xml: &str) -> Result<Vec<WmsLayer>, IngestError> {
    let root = Element::parse(xml)
        .map_err(|e| IngestError::thumbnail(format!("invalid WMS capabilities: {}", e)))?;
    let capability = root
        .child("Capability")
        .ok_or_else(|| IngestError::thumbnail("WMS capabilities without a Capability section"))?;

    let mut layers = Vec::new();
    for layer in capability.children_named("Layer") {
        collect_layers(layer, None, &mut layers);
    }
    debug!(layers = layers.len(), "Parsed WMS capabilities");
    Ok(layers)
}

fn collect_layers(element: &Element, inherited: Option<Extent>, out: &mut Vec<WmsLayer>) {
    let bbox = geographic_bbox(element).or(inherited);
    if let Some(name) = element.child_text("Name") {
        out.push(WmsLayer {
            name: name.to_string(),
            title: element.child_text("Title").map(str::to_string),
            styles: element
                .children_named("Style")
                .filter_map(|s| s.child_text("Name"))
                .map(str::to_string)
                .collect(),
            bbox,
        });
    }
    for child in element.children_named("Layer") {
        collect_layers(child, bbox, out);
    }
}

fn geographic_bbox(layer: &Element) -> Option<Extent> {
    let bbox = layer.child("EX_GeographicBoundingBox")?;
    let value = |name: &str| bbox.child_text(name)?.parse::<f64>().ok();
    Some([
        value("westBoundLongitude")?,
        value("eastBoundLongitude")?,
        value("southBoundLatitude")?,
        value("northBoundLatitude")?,
    ])
}

/// Choose the layer to render.
///
/// The requested layer wins when offered. Otherwise the first layer listed in
/// the record is matched by name, then by title. Otherwise the first offered
/// layer that is not a coordinate variable is used.
pub fn select_layer<'a>(
    layers: &'a [WmsLayer],
    requested: Option<&str>,
    mmd_layers: &[String],
) -> Option<&'a WmsLayer> {
    if let Some(requested) = requested {
        if let Some(layer) = layers.iter().find(|l| l.name == requested) {
            return Some(layer);
        }
    }
    if let Some(mmd_layer) = mmd_layers.first() {
        if let Some(layer) = layers.iter().find(|l| &l.name == mmd_layer) {
            return Some(layer);
        }
        if let Some(layer) = layers
            .iter()
            .find(|l| l.title.as_deref() == Some(mmd_layer.as_str()))
        {
            debug!(title = %mmd_layer, layer = %layer.name, "Matched record layer by title");
            return Some(layer);
        }
    }
    layers
        .iter()
        .find(|l| !BLACKLISTED_LAYERS.contains(&l.name.as_str()))
}

/// The requested style when the layer offers it, else the layer's first.
pub fn select_style<'a>(layer: &'a WmsLayer, requested: Option<&str>) -> Option<&'a str> {
    if let Some(requested) = requested {
        if let Some(style) = layer.styles.iter().find(|s| s.as_str() == requested) {
            return Some(style);
        }
    }
    layer.styles.first().map(String::as_str)
}
