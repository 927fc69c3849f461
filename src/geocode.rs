//! Reverse geocoding: coordinate → optional city and country.
//!
//! The pipeline only sees the [`ReverseGeocoder`] trait. A miss is a normal
//! outcome, not an error.
//!
//! [`CityTable`] is the bundled implementation: a nearest-neighbour search
//! over a CSV of populated places (`lat,lon,city,country`, the shape of a
//! GeoNames `cities1000` extract). Anything farther than the configured
//! radius counts as a miss, so a photo taken at sea does not get labelled
//! with the nearest harbour town.

use crate::geo::Coordinate;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("cannot read city table {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result of a reverse-geocode lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Place {
    pub city: Option<String>,
    pub country: Option<String>,
}

pub trait ReverseGeocoder {
    fn reverse(&self, at: Coordinate) -> Option<Place>;
}

/// Geocoder that never matches. Used when no city table is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGeocoder;

impl ReverseGeocoder for NoGeocoder {
    fn reverse(&self, _at: Coordinate) -> Option<Place> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct City {
    pub lat: f64,
    pub lon: f64,
    pub name: String,
    pub country: String,
}

/// Nearest-city lookup over an in-memory table.
#[derive(Debug, Clone)]
pub struct CityTable {
    cities: Vec<City>,
    max_distance_km: f64,
}

impl CityTable {
    pub fn new(cities: Vec<City>, max_distance_km: f64) -> Self {
        Self {
            cities,
            max_distance_km,
        }
    }

    /// Load `lat,lon,city,country` rows. A header row is detected and
    /// skipped; rows that fail to parse are skipped with a warning.
    pub fn load(path: &Path, max_distance_km: f64) -> Result<Self, GeocodeError> {
        let to_err = |source| GeocodeError::Csv {
            path: path.display().to_string(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(to_err)?;

        let mut cities = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(to_err)?;
            match record.deserialize::<City>(None) {
                Ok(city) => cities.push(city),
                Err(e) if line == 0 => log::debug!("treating first row as header: {e}"),
                Err(e) => log::warn!("{}: skipping row {}: {e}", path.display(), line + 1),
            }
        }
        Ok(Self::new(cities, max_distance_km))
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

impl ReverseGeocoder for CityTable {
    fn reverse(&self, at: Coordinate) -> Option<Place> {
        let (city, distance) = self
            .cities
            .iter()
            .map(|c| (c, haversine_km(at, Coordinate::new(c.lat, c.lon))))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        if distance > self.max_distance_km {
            return None;
        }
        Some(Place {
            city: non_empty(&city.name),
            country: non_empty(&city.country),
        })
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = phi2 - phi1;
    let dlambda = (b.lon - a.lon).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}
