//! Files written next to the maps on every run.
//!
//! - `points-summary.csv`, `points-<country>.csv`, `points-unknown.csv`:
//!   deduplicated `lat,lon` rows with no header, the format the renderer's
//!   `--summary-points` flag reads.
//! - `index.csv`: one row per photo and per summary bucket, linking each
//!   source to the map produced for it.
//!
//! Unlike maps these are cheap and always rewritten, so they reflect the
//! current metadata even when every map came from the cache.

use crate::geo::Coordinate;
use crate::naming::sanitize_filename;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const INDEX_FILENAME: &str = "index.csv";

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("cannot write {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn summary_points_path(dir: &Path) -> PathBuf {
    dir.join("points-summary.csv")
}

pub fn country_points_path(dir: &Path, country: &str) -> PathBuf {
    dir.join(format!("points-{}.csv", sanitize_filename(country)))
}

pub fn unknown_points_path(dir: &Path) -> PathBuf {
    dir.join("points-unknown.csv")
}

/// Write `lat,lon` rows, one per point, without a header.
pub fn write_points(path: &Path, points: &[Coordinate]) -> Result<(), ArtifactError> {
    let to_err = |source| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(to_err)?;
    for p in points {
        writer.serialize((p.lat, p.lon)).map_err(to_err)?;
    }
    writer.flush()?;
    Ok(())
}

/// One line of `index.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexRow {
    /// `photo`, `summary`, `country` or `unknown`.
    pub kind: String,
    pub label: String,
    /// Source photo, relative to the photo directory. Empty for summaries.
    pub source: String,
    /// Map file, relative to the output directory. Empty when none exists.
    pub output: String,
}

pub fn write_index(path: &Path, rows: &[IndexRow]) -> Result<(), ArtifactError> {
    let to_err = |source| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(to_err)?;
    // serialize() only emits the header alongside the first row
    if rows.is_empty() {
        writer
            .write_record(["kind", "label", "source", "output"])
            .map_err(to_err)?;
    }
    for row in rows {
        writer.serialize(row).map_err(to_err)?;
    }
    writer.flush()?;
    Ok(())
}
