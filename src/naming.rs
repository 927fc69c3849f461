//! Output file naming and directory containment.
//!
//! ## Sanitized names
//!
//! Country names and photo stems end up in file names. [`sanitize_filename`]
//! makes them safe on every common filesystem:
//!
//! - `Côte d'Ivoire` → `Côte_d'Ivoire`
//! - `IMG 0001 (copy)` → `IMG_0001_(copy)`
//! - `a/b:c*d` → `abcd`
//! - `...` → `untitled`
//!
//! Non-ASCII letters are kept; only characters that are invalid on Windows,
//! macOS or Linux (and control characters) are removed.
//!
//! ## Containment
//!
//! Every directory the tool writes into must sit strictly inside the photo
//! directory. [`contained_dir`] checks this lexically (no symlink
//! resolution, no filesystem access) so a configured
//! `output_dir = "../elsewhere"` is rejected before anything is created.
//! The photo directory itself is rejected too: maps written there would be
//! scanned as photos on the next run.
//!
//! Callers anchor the photo directory with [`absolute_root`] first, so `.`
//! and `photos/..` resolve to a real directory rather than an empty path.

use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Used when nothing survives sanitization.
pub const FALLBACK_NAME: &str = "untitled";

const MAX_NAME_LEN: usize = 80;
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("{path} escapes {root}")]
    Escapes { path: PathBuf, root: PathBuf },
    #[error("output directory must be relative to the photo directory: {0}")]
    Absolute(PathBuf),
    #[error("output directory must be a subdirectory of the photo directory, not {0}")]
    IsRoot(PathBuf),
}

/// Strip invalid characters, collapse whitespace runs to `_`, trim stray
/// dots and underscores, and cap the length.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if c.is_control() || INVALID_CHARS.contains(&c) {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push('_');
        }
        pending_space = false;
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let truncated: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    let truncated = truncated.trim_end_matches(|c| c == '.' || c == '_');

    if truncated.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        truncated.to_string()
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// A `..` that would climb above the start of a relative path is kept, so
/// the result still visibly escapes. A relative path that resolves to
/// nothing becomes `.`.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !matches!(
                    out.components().next_back(),
                    Some(Component::RootDir | Component::Prefix(_))
                ) {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// `path` made absolute against the working directory, then normalized.
pub fn absolute_root(path: &Path) -> io::Result<PathBuf> {
    Ok(normalize_lexically(&std::path::absolute(path)?))
}

/// Join `relative` onto `root` and verify the result lies below `root`.
///
/// Containment depends only on `relative`: once normalized it must name a
/// subdirectory, without a leading `..`.
pub fn contained_dir(root: &Path, relative: &Path) -> Result<PathBuf, PathError> {
    if relative.has_root() {
        return Err(PathError::Absolute(relative.to_path_buf()));
    }
    let root = normalize_lexically(root);
    let relative = normalize_lexically(relative);
    match relative.components().next() {
        Some(Component::Normal(_)) => Ok(normalize_lexically(&root.join(relative))),
        Some(Component::ParentDir) => Err(PathError::Escapes {
            path: normalize_lexically(&root.join(relative)),
            root,
        }),
        _ => Err(PathError::IsRoot(relative)),
    }
}
