//! Raw photo metadata: extraction and field parsing.
//!
//! Extraction is delegated to [exiftool](https://exiftool.org/), run once per
//! photo as `exiftool -json -n <fields> <file>`. The `-n` flag makes GPS
//! values plain signed decimal degrees, so no degree/minute/second parsing is
//! needed here. The first JSON object is flattened into a
//! [`RawMetadata`] map of field name → string.
//!
//! ## Fields consulted
//!
//! | Purpose | Fields, in priority order |
//! |---|---|
//! | Coordinate | `GPSLatitude`, `GPSLongitude` |
//! | Timestamp | `DateTimeOriginal` → `CreateDate` → `ModifyDate` |
//! | Captions | `Title`, `ObjectName`, `Headline`, `Caption-Abstract`, `ImageDescription` |
//!
//! Timestamp candidates are tried in order and the first one that parses
//! wins; later fields are never looked at once one succeeds. Unparseable
//! values are skipped, not reported as errors.
//!
//! ## Failure
//!
//! A missing exiftool, a non-zero exit, or unreadable output all surface as
//! [`ExtractError`]. The pipeline treats that as "no metadata for this file"
//! and moves on.

use crate::geo::Coordinate;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Flat field name → value map for one file.
pub type RawMetadata = BTreeMap<String, String>;

pub const LATITUDE_FIELD: &str = "GPSLatitude";
pub const LONGITUDE_FIELD: &str = "GPSLongitude";
pub const TIMESTAMP_FIELDS: [&str; 3] = ["DateTimeOriginal", "CreateDate", "ModifyDate"];
pub const CAPTION_FIELDS: [&str; 5] = [
    "Title",
    "ObjectName",
    "Headline",
    "Caption-Abstract",
    "ImageDescription",
];

/// Formats seen in the wild. EXIF proper uses colons in the date part.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y:%m:%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("exiftool not available: {0}")]
    ToolMissing(std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("exiftool exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("unreadable exiftool output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of raw metadata for a photo.
///
/// `Sync` so extraction can be spread over a thread pool.
pub trait MetadataExtractor: Sync {
    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractError>;
}

/// Extractor backed by the `exiftool` executable.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: String,
}

impl ExifTool {
    pub fn new() -> Self {
        Self::with_program("exiftool")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(path: &Path) -> Vec<String> {
        let mut args = vec!["-json".to_string(), "-n".to_string()];
        let fields = [LATITUDE_FIELD, LONGITUDE_FIELD]
            .into_iter()
            .chain(TIMESTAMP_FIELDS)
            .chain(CAPTION_FIELDS);
        args.extend(fields.map(|f| format!("-{f}")));
        args.push(path.to_string_lossy().into_owned());
        args
    }
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractor for ExifTool {
    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractError> {
        let output = Command::new(&self.program)
            .args(Self::args(path))
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExtractError::ToolMissing(e),
                _ => ExtractError::Io(e),
            })?;
        if !output.status.success() {
            return Err(ExtractError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_exiftool_json(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Flatten the first object of exiftool's JSON array output.
///
/// Strings are kept as-is, numbers and booleans are stringified, arrays are
/// joined with `", "` (exiftool reports list-type tags that way), nested
/// objects and nulls are dropped. `SourceFile` is not metadata and is skipped.
pub fn parse_exiftool_json(json: &str) -> Result<RawMetadata, ExtractError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let Some(object) = value.get(0).and_then(|v| v.as_object()) else {
        return Ok(RawMetadata::new());
    };
    Ok(object
        .iter()
        .filter(|(key, _)| key.as_str() != "SourceFile")
        .filter_map(|(key, v)| scalar_to_string(v).map(|s| (key.clone(), s)))
        .collect())
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_to_string).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Null | Value::Object(_) => None,
    }
}

/// Parse a single EXIF-style timestamp. A trailing UTC offset or `Z` is
/// ignored; capture times are treated as local wall-clock times.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = strip_offset(value.trim());
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Drop a `Z`, `+HH:MM` or `-HH:MM` suffix following the time part.
fn strip_offset(value: &str) -> &str {
    if let Some(stripped) = value.strip_suffix('Z') {
        return stripped;
    }
    // Offsets start after the time, which begins at index 11 in both the
    // EXIF and ISO layouts; a '-' earlier than that belongs to the date.
    match value.char_indices().skip(11).find(|(_, c)| *c == '+' || *c == '-') {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// First timestamp candidate that parses, in [`TIMESTAMP_FIELDS`] order.
pub fn first_timestamp(raw: &RawMetadata) -> Option<NaiveDateTime> {
    TIMESTAMP_FIELDS.iter().find_map(|field| {
        let value = raw.get(*field)?;
        let parsed = parse_timestamp(value);
        if parsed.is_none() {
            log::debug!("ignoring unparseable {field} value {value:?}");
        }
        parsed
    })
}

/// Coordinate from the GPS fields, if both parse to legal values.
pub fn coordinate(raw: &RawMetadata) -> Option<Coordinate> {
    let lat = raw.get(LATITUDE_FIELD)?.trim().parse::<f64>().ok()?;
    let lon = raw.get(LONGITUDE_FIELD)?.trim().parse::<f64>().ok()?;
    let coordinate = Coordinate::new(lat, lon);
    coordinate.is_valid().then_some(coordinate)
}

/// Raw caption field values in [`CAPTION_FIELDS`] order.
pub fn caption_candidates(raw: &RawMetadata) -> Vec<&str> {
    CAPTION_FIELDS
        .iter()
        .filter_map(|field| raw.get(*field).map(String::as_str))
        .collect()
}

/// `3 March 2024`
pub fn format_date(ts: &NaiveDateTime) -> String {
    ts.format("%-d %B %Y").to_string()
}
