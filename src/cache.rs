//! Output-existence cache for render jobs.
//!
//! Rendering a map is the slow step of a run (the renderer loads coastline
//! and border data for every invocation). Metadata extraction, geocoding and
//! aggregation always run, so caption or boundary changes show up in the
//! reports immediately without a cache bust.
//!
//! # Design
//!
//! There is no cache manifest. Every render target has an output path that
//! is a pure function of stable inputs (see [`crate::render`]), so "already
//! rendered" is simply "the output file exists". Re-running over an
//! unchanged directory therefore invokes the renderer zero times.
//!
//! Per-photo output names include a truncated SHA-256 of the photo's path
//! **relative to the photo directory** (see [`photo_key`]), not the file
//! contents: two photos called `IMG_0001.jpg` in different folders get
//! different maps, while the same photo keeps its map across runs however
//! the photo directory is spelled on the command line.
//!
//! ## Bypassing the cache
//!
//! `--overwrite` (or `render.overwrite = true`) renders every target again,
//! replacing existing files.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Truncated SHA-256 of a path, as lowercase hex. `len` is capped at 64.
pub fn path_hash(path: &Path, len: usize) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let hex = format!("{:x}", digest);
    hex[..len.min(hex.len())].to_string()
}

/// The part of `source` that identifies a photo: its path below `root`.
/// Paths outside `root` are used whole.
pub fn photo_key<'a>(source: &'a Path, root: &Path) -> &'a Path {
    source.strip_prefix(root).unwrap_or(source)
}

/// Whether a render target can be skipped.
pub fn is_cached(output: &Path, overwrite: bool) -> bool {
    !overwrite && output.is_file()
}

/// What happened to one render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Output already existed; renderer not invoked.
    Cached,
    /// Renderer ran and succeeded.
    Rendered,
    /// Renderer ran and failed, or could not be started.
    Failed,
    /// Rendering disabled or not applicable (e.g. no coordinate).
    Skipped,
}

impl RenderStatus {
    /// Whether the target's output file exists after this status.
    pub fn has_output(self) -> bool {
        matches!(self, RenderStatus::Cached | RenderStatus::Rendered)
    }
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RenderStatus::Cached => "cached",
            RenderStatus::Rendered => "rendered",
            RenderStatus::Failed => "failed",
            RenderStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Summary of render activity for a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub renders: u32,
    pub failures: u32,
}

impl CacheStats {
    pub fn record(&mut self, status: RenderStatus) {
        match status {
            RenderStatus::Cached => self.hits += 1,
            RenderStatus::Rendered => self.renders += 1,
            RenderStatus::Failed => self.failures += 1,
            RenderStatus::Skipped => {}
        }
    }

    pub fn total(&self) -> u32 {
        self.hits + self.renders + self.failures
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = if self.failures > 0 {
            format!(", {} failed", self.failures)
        } else {
            String::new()
        };
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} rendered{} ({} total)",
                self.hits,
                self.renders,
                failed,
                self.total()
            )
        } else {
            write!(f, "{} rendered{}", self.renders, failed)
        }
    }
}
