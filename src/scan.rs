//! Photo discovery.
//!
//! Walks the photo directory recursively and returns every file whose
//! extension looks like a photo, sorted by path so runs are reproducible.
//!
//! ```text
//! trip/
//! ├── locator.toml            # config, not a photo
//! ├── IMG_0001.jpg            ✓
//! ├── day2/
//! │   ├── IMG_0100.HEIC       ✓ (extensions are case-insensitive)
//! │   └── notes.txt
//! ├── .thumbnails/            # hidden, skipped entirely
//! └── locator-maps/           # output directory, skipped entirely
//! ```
//!
//! Unreadable entries are logged and skipped; only a missing or unreadable
//! root is an error.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("photo directory not found: {0}")]
    NotFound(PathBuf),
    #[error("cannot read photo directory: {0}")]
    Walk(#[from] walkdir::Error),
}

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "heic", "heif", "dng"];

/// Photos under `root`, skipping hidden entries and `exclude` (normally the
/// output directory).
pub fn scan(root: &Path, exclude: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotFound(root.to_path_buf()));
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || (!is_hidden(e) && e.path() != exclude));

    let mut photos = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_photo(entry.path()) => {
                photos.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => log::warn!("skipping unreadable entry: {e}"),
        }
    }

    photos.sort();
    Ok(photos)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_photo(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    PHOTO_EXTENSIONS.contains(&ext.as_str())
}
