//! Country name → bounding rectangle lookup.
//!
//! Built once, before any photo is processed, from a boundary dataset, then
//! only read. The usual source is a Natural Earth "admin 0 countries" export
//! converted to GeoJSON; each feature's envelope becomes one entry.
//!
//! ## Matching
//!
//! Lookups are trimmed and case-insensitive, and must resolve to **exactly
//! one** entry. Boundary datasets do contain colliding names (disputed
//! territories, overseas departments listed under the parent's name); picking
//! one arbitrarily would silently draw the wrong map, so a collision is a
//! miss. Callers must cope with `None` either way.

use crate::geo::{self, Coordinate, Rectangle};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Feature properties tried, in order, for the country name.
const NAME_PROPERTIES: [&str; 3] = ["NAME", "ADMIN", "name"];

#[derive(Error, Debug)]
pub enum CountryError {
    #[error("cannot read boundary dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("boundary dataset {path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("boundary dataset {0} is not a GeoJSON FeatureCollection")]
    NotFeatureCollection(String),
}

#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    entries: Vec<(String, Rectangle)>,
}

impl CountryTable {
    pub fn new(entries: Vec<(String, Rectangle)>) -> Self {
        Self { entries }
    }

    /// Load a GeoJSON `FeatureCollection` file.
    pub fn load_geojson(path: &Path) -> Result<Self, CountryError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| CountryError::Io {
            path: display.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|source| CountryError::Json {
            path: display.clone(),
            source,
        })?;
        Self::from_geojson(&value).ok_or(CountryError::NotFeatureCollection(display))
    }

    /// Build from a parsed `FeatureCollection`. Features without a name or
    /// without any coordinates are skipped.
    pub fn from_geojson(value: &Value) -> Option<Self> {
        if value.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
            return None;
        }
        let features = value.get("features")?.as_array()?;
        let entries = features
            .iter()
            .filter_map(|feature| {
                let name = feature_name(feature)?;
                let mut points = Vec::new();
                collect_positions(feature.get("geometry")?.get("coordinates")?, &mut points);
                let rect = geo::from_points(points)?;
                Some((name, rect))
            })
            .collect();
        Some(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rectangle for a country name, if exactly one entry matches.
    pub fn lookup(&self, name: &str) -> Option<Rectangle> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        let mut matches = self
            .entries
            .iter()
            .filter(|(n, _)| n.trim().to_lowercase() == wanted);
        let (_, rect) = matches.next()?;
        match matches.next() {
            Some(_) => {
                log::debug!("country name {name:?} is ambiguous in the boundary table");
                None
            }
            None => Some(*rect),
        }
    }
}

fn feature_name(feature: &Value) -> Option<String> {
    let props = feature.get("properties")?;
    NAME_PROPERTIES
        .iter()
        .filter_map(|key| props.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// Walk arbitrarily nested coordinate arrays (Polygon, MultiPolygon, …) and
/// collect every `[lon, lat]` position.
fn collect_positions(value: &Value, out: &mut Vec<Coordinate>) {
    let Some(items) = value.as_array() else {
        return;
    };
    if let [lon, lat, ..] = items.as_slice()
        && let (Some(lon), Some(lat)) = (lon.as_f64(), lat.as_f64())
    {
        out.push(Coordinate::new(lat, lon));
        return;
    }
    for item in items {
        collect_positions(item, out);
    }
}
