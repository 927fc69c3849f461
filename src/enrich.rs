//! Per-photo enrichment: raw metadata in, [`PhotoRecord`] out.
//!
//! Each stage takes the record by value and hands back a new one. A stage
//! whose input is missing (no GPS, no timestamp) passes the record through
//! untouched:
//!
//! ```text
//! raw ──► coordinate ──► timestamp ──► captions ──► place + regions ──► clock
//! ```
//!
//! Collaborators are borrowed for the duration of a run. The caption chooser
//! is the only one that needs `&mut` (an interactive prompt consumes input),
//! which is why enrichment runs strictly in photo order on one thread.

use crate::cache;
use crate::captions::{self, CaptionChooser};
use crate::clock;
use crate::config::LocatorConfig;
use crate::countries::CountryTable;
use crate::geo;
use crate::geocode::ReverseGeocoder;
use crate::metadata::{self, RawMetadata};
use crate::record::PhotoRecord;
use std::path::{Path, PathBuf};

/// Numeric tunables for enrichment, lifted out of [`LocatorConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichSettings {
    pub zoom_area: f64,
    pub zoom_aspect: f64,
    pub world_padding: f64,
    pub world_min_span: f64,
    /// Where clock badges go. `None` disables them.
    pub clock_dir: Option<PathBuf>,
    /// Photo directory; badge names hash the path below it.
    pub root: PathBuf,
}

impl EnrichSettings {
    pub fn from_config(config: &LocatorConfig, root: &Path, output_root: &Path) -> Self {
        Self {
            zoom_area: config.zoom.area,
            zoom_aspect: config.zoom.aspect_ratio,
            world_padding: config.world.padding_factor,
            world_min_span: config.world.min_span,
            clock_dir: config.clock.enabled.then(|| output_root.join("clocks")),
            root: root.to_path_buf(),
        }
    }
}

pub struct Enricher<'a> {
    settings: EnrichSettings,
    geocoder: &'a dyn ReverseGeocoder,
    countries: Option<&'a CountryTable>,
    chooser: &'a mut dyn CaptionChooser,
}

impl<'a> Enricher<'a> {
    pub fn new(
        settings: EnrichSettings,
        geocoder: &'a dyn ReverseGeocoder,
        countries: Option<&'a CountryTable>,
        chooser: &'a mut dyn CaptionChooser,
    ) -> Self {
        Self {
            settings,
            geocoder,
            countries,
            chooser,
        }
    }

    /// Run every stage. Returns `None` (with a warning) when the photo has
    /// no coordinate, no timestamp and no caption.
    pub fn enrich(&mut self, source: &Path, raw: &RawMetadata) -> Option<PhotoRecord> {
        let record = PhotoRecord::new(source).with_coordinate(metadata::coordinate(raw));
        let record = with_timestamp(record, raw);
        let record = self.with_captions(record, raw);
        let record = self.with_place(record);
        let record = self.with_clock(record);

        if record.is_usable() {
            Some(record)
        } else {
            log::warn!(
                "{}: no GPS, timestamp or caption; excluded",
                source.display()
            );
            None
        }
    }

    fn with_captions(&mut self, record: PhotoRecord, raw: &RawMetadata) -> PhotoRecord {
        let candidates = captions::normalize_captions(metadata::caption_candidates(raw));
        let selected = captions::select_caption(&mut *self.chooser, record.source(), &candidates);
        record.with_captions(candidates, selected)
    }

    fn with_place(&self, record: PhotoRecord) -> PhotoRecord {
        let Some(at) = record.coordinate() else {
            return record;
        };

        let place = self.geocoder.reverse(at).unwrap_or_default();
        let country_rect = match (&place.country, self.countries) {
            (Some(name), Some(table)) => {
                let rect = table.lookup(name);
                if rect.is_none() {
                    log::warn!(
                        "{}: no boundary for country {name:?}",
                        record.source().display()
                    );
                }
                rect
            }
            _ => None,
        };

        let zoom = geo::zoom_rectangle(at, self.settings.zoom_area, self.settings.zoom_aspect);
        let world = country_rect.unwrap_or_else(|| {
            geo::expand_for_world(zoom, self.settings.world_padding, self.settings.world_min_span)
        });

        record
            .with_place(place.city, place.country)
            .with_regions(country_rect, Some(zoom), Some(world))
    }

    fn with_clock(&self, record: PhotoRecord) -> PhotoRecord {
        let (Some(dir), Some(ts)) = (&self.settings.clock_dir, record.taken_at()) else {
            return record;
        };
        let key = cache::photo_key(record.source(), &self.settings.root);
        match clock::ensure_clock(dir, key, ts.time()) {
            Ok(path) => record.with_clock(Some(path)),
            Err(e) => {
                log::warn!("{}: cannot write clock badge: {e}", record.source().display());
                record
            }
        }
    }
}

fn with_timestamp(record: PhotoRecord, raw: &RawMetadata) -> PhotoRecord {
    let taken_at = metadata::first_timestamp(raw);
    let label = taken_at.as_ref().map(metadata::format_date);
    record.with_timestamp(taken_at, label)
}
