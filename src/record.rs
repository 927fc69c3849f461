//! The per-photo metadata record.
//!
//! A [`PhotoRecord`] is built in stages by [`crate::enrich`]. Each stage takes
//! the previous record by value and returns a new one through a `with_*`
//! method; nothing holds a `&mut PhotoRecord` across stages. Once enrichment
//! finishes the record is only read.

use crate::geo::{Coordinate, Rectangle};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Separator between the caption, city and country in a location string.
pub const LOCATION_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    source: PathBuf,
    coordinate: Option<Coordinate>,
    taken_at: Option<NaiveDateTime>,
    date_label: Option<String>,
    captions: Vec<String>,
    caption: Option<String>,
    city: Option<String>,
    country: Option<String>,
    location: Option<String>,
    country_rect: Option<Rectangle>,
    zoom_rect: Option<Rectangle>,
    world_rect: Option<Rectangle>,
    clock_svg: Option<PathBuf>,
}

impl PhotoRecord {
    /// An empty record for a source file.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            coordinate: None,
            taken_at: None,
            date_label: None,
            captions: Vec::new(),
            caption: None,
            city: None,
            country: None,
            location: None,
            country_rect: None,
            zoom_rect: None,
            world_rect: None,
            clock_svg: None,
        }
    }

    pub fn with_coordinate(self, coordinate: Option<Coordinate>) -> Self {
        Self { coordinate, ..self }
    }

    pub fn with_timestamp(self, taken_at: Option<NaiveDateTime>, date_label: Option<String>) -> Self {
        Self {
            taken_at,
            date_label,
            ..self
        }
    }

    pub fn with_captions(self, captions: Vec<String>, caption: Option<String>) -> Self {
        Self {
            captions,
            caption,
            ..self
        }
    }

    /// Attach reverse-geocode results and recompose the location string.
    pub fn with_place(self, city: Option<String>, country: Option<String>) -> Self {
        let location = compose_location(&[
            self.caption.as_deref(),
            city.as_deref(),
            country.as_deref(),
        ]);
        Self {
            city,
            country,
            location,
            ..self
        }
    }

    pub fn with_regions(
        self,
        country_rect: Option<Rectangle>,
        zoom_rect: Option<Rectangle>,
        world_rect: Option<Rectangle>,
    ) -> Self {
        Self {
            country_rect,
            zoom_rect,
            world_rect,
            ..self
        }
    }

    pub fn with_clock(self, clock_svg: Option<PathBuf>) -> Self {
        Self { clock_svg, ..self }
    }

    /// A record with no coordinate, no timestamp and no captions carries
    /// nothing worth aggregating.
    pub fn is_usable(&self) -> bool {
        self.coordinate.is_some() || self.taken_at.is_some() || !self.captions.is_empty()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }

    pub fn taken_at(&self) -> Option<NaiveDateTime> {
        self.taken_at
    }

    pub fn date_label(&self) -> Option<&str> {
        self.date_label.as_deref()
    }

    pub fn captions(&self) -> &[String] {
        &self.captions
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn country_rect(&self) -> Option<Rectangle> {
        self.country_rect
    }

    pub fn zoom_rect(&self) -> Option<Rectangle> {
        self.zoom_rect
    }

    pub fn world_rect(&self) -> Option<Rectangle> {
        self.world_rect
    }

    pub fn clock_svg(&self) -> Option<&Path> {
        self.clock_svg.as_deref()
    }

    /// File stem of the source, used as a last-resort display title.
    pub fn stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Short human title: selected caption, else city, else file stem.
    pub fn title(&self) -> String {
        self.caption
            .clone()
            .or_else(|| self.city.clone())
            .unwrap_or_else(|| self.stem())
    }
}

/// Join the non-empty parts with [`LOCATION_SEPARATOR`]. `None` if every part
/// is missing or blank.
pub fn compose_location(parts: &[Option<&str>]) -> Option<String> {
    let kept: Vec<&str> = parts
        .iter()
        .filter_map(|p| p.map(str::trim))
        .filter(|p| !p.is_empty())
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(LOCATION_SEPARATOR))
    }
}
