//! Fake collaborators shared by unit tests.
//!
//! Each fake stands in for one external dependency of the pipeline:
//!
//! - [`MapExtractor`]: canned metadata per file name instead of exiftool
//! - [`FixedGeocoder`]: the same place for every coordinate
//! - [`RecordingRenderer`]: records jobs and writes a placeholder output
//!
//! Interior state uses `Mutex` (not `RefCell`) so the fakes are `Sync` and
//! work with rayon.

use crate::geo::Coordinate;
use crate::geocode::{Place, ReverseGeocoder};
use crate::metadata::{ExtractError, MetadataExtractor, RawMetadata};
use crate::render::{RenderError, RenderJob, Renderer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Build a [`RawMetadata`] from literal pairs.
pub fn raw_metadata(pairs: &[(&str, &str)]) -> RawMetadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// =========================================================================
// Extractor
// =========================================================================

/// Metadata keyed by file name. Unknown files fail like a broken exiftool.
#[derive(Default)]
pub struct MapExtractor {
    entries: HashMap<String, RawMetadata>,
    calls: Mutex<Vec<PathBuf>>,
}

impl MapExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, pairs: &[(&str, &str)]) -> Self {
        self.entries.insert(file_name.to_string(), raw_metadata(pairs));
        self
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl MetadataExtractor for MapExtractor {
    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.entries
            .get(&name)
            .cloned()
            .ok_or_else(|| ExtractError::Failed {
                status: "exit status: 1".into(),
                stderr: format!("no fixture for {name}"),
            })
    }
}

// =========================================================================
// Geocoder
// =========================================================================

pub struct FixedGeocoder {
    place: Place,
    calls: Mutex<Vec<Coordinate>>,
}

impl FixedGeocoder {
    pub fn new(place: Place) -> Self {
        Self {
            place,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Coordinate> {
        self.calls.lock().unwrap().clone()
    }
}

impl ReverseGeocoder for FixedGeocoder {
    fn reverse(&self, at: Coordinate) -> Option<Place> {
        self.calls.lock().unwrap().push(at);
        Some(self.place.clone())
    }
}

// =========================================================================
// Renderer
// =========================================================================

/// Records every job. Succeeds by writing a placeholder file at the job's
/// output, unless the output file name matches `fail_on`.
#[derive(Default)]
pub struct RecordingRenderer {
    fail_on: Option<String>,
    jobs: Mutex<Vec<RenderJob>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(file_name: &str) -> Self {
        Self {
            fail_on: Some(file_name.to_string()),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn invocations(&self) -> Vec<RenderJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        self.jobs.lock().unwrap().push(job.clone());
        let name = job.output.file_name().map(|n| n.to_string_lossy().into_owned());
        if name.is_some() && name == self.fail_on {
            return Err(RenderError::Failed {
                output: job.output.clone(),
                message: "exit status: 1".into(),
            });
        }
        std::fs::write(&job.output, b"map")?;
        Ok(())
    }
}
