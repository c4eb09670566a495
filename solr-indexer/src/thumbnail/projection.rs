//! Map extents for `GetMap` requests.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::thumbnail::Projection;

/// `[x0, x1, y0, y1]`: west, east, south, north in degrees.
pub type Extent = [f64; 4];

pub const GLOBAL_EXTENT: Extent = [-180.0, 180.0, -90.0, 90.0];

/// WGS84 semi-major axis in metres.
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 first eccentricity.
const WGS84_E: f64 = 0.081_819_190_842_622;
/// Latitude of true scale of EPSG:3995.
const POLAR_TRUE_SCALE_LAT: f64 = 71.0;
/// Web Mercator latitude limit.
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;
/// Points sampled along each edge of an extent.
const EDGE_SAMPLES: usize = 64;

/// Extent to render for a layer.
///
/// A fixed extent is used as given. Otherwise the layer's box is widened by
/// `zoom_level` degrees on every side, and the whole globe is used when the
/// layer has no box. The result never exceeds [`GLOBAL_EXTENT`].
pub fn thumbnail_extent(fixed: Option<Extent>, layer_bbox: Option<Extent>, zoom_level: f64) -> Extent {
    let mut extent = match (fixed, layer_bbox) {
        (Some(fixed), _) => fixed,
        (None, Some([w, e, s, n])) => [w - zoom_level, e + zoom_level, s - zoom_level, n + zoom_level],
        (None, None) => GLOBAL_EXTENT,
    };
    for (i, value) in extent.iter_mut().enumerate() {
        *value = if i % 2 == 0 {
            value.max(GLOBAL_EXTENT[i])
        } else {
            value.min(GLOBAL_EXTENT[i])
        };
    }
    extent
}

/// Bounding box `[min_x, min_y, max_x, max_y]` of a degree extent in the
/// projection's CRS units.
///
/// For projected CRSs the box is found by projecting points along the edges
/// of the extent, so curved parallels are covered.
pub fn project_extent(projection: Projection, extent: Extent) -> [f64; 4] {
    let [west, east, south, north] = extent;
    if projection == Projection::PlateCarree {
        return [west, south, east, north];
    }

    let mut bbox = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
    let steps = EDGE_SAMPLES as f64;
    for i in 0..=EDGE_SAMPLES {
        let t = i as f64 / steps;
        let lon = west + (east - west) * t;
        let lat = south + (north - south) * t;
        for (lon, lat) in [(lon, south), (lon, north), (west, lat), (east, lat)] {
            let (x, y) = project_point(projection, lon, lat);
            bbox[0] = bbox[0].min(x);
            bbox[1] = bbox[1].min(y);
            bbox[2] = bbox[2].max(x);
            bbox[3] = bbox[3].max(y);
        }
    }
    bbox
}

fn project_point(projection: Projection, lon: f64, lat: f64) -> (f64, f64) {
    match projection {
        Projection::PlateCarree => (lon, lat),
        Projection::Mercator => {
            let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
            (
                WGS84_A * lon.to_radians(),
                WGS84_A * (FRAC_PI_4 + lat / 2.0).tan().ln(),
            )
        }
        Projection::PolarStereographic => {
            let phi_c = POLAR_TRUE_SCALE_LAT.to_radians();
            let m_c = phi_c.cos() / (1.0 - (WGS84_E * phi_c.sin()).powi(2)).sqrt();
            let rho = WGS84_A * m_c * polar_t(lat.to_radians()) / polar_t(phi_c);
            let lambda = lon.to_radians();
            (rho * lambda.sin(), -rho * lambda.cos())
        }
    }
}

fn polar_t(phi: f64) -> f64 {
    if phi >= FRAC_PI_2 {
        return 0.0;
    }
    let e_sin = WGS84_E * phi.sin();
    (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - e_sin) / (1.0 + e_sin)).powf(WGS84_E / 2.0)
}
