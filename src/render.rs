//! Render jobs and the external map renderer.
//!
//! A [`RenderJob`] is a fully resolved renderer invocation: an output path
//! plus the argument list. Building jobs is pure; only [`Renderer`]
//! implementations touch processes or files.
//!
//! ## Targets
//!
//! | Target | Output |
//! |--------|--------|
//! | one photo | `<sanitized stem>-<hash10>.<ext>` |
//! | collection summary | `summary.<ext>` |
//! | one country | `country-<sanitized name>.<ext>` |
//! | photos without a country | `country-unknown.<ext>` |
//!
//! Every output path is a pure function of stable inputs, which is what lets
//! [`crate::cache`] treat "file exists" as "already rendered".
//!
//! ## Failure handling
//!
//! [`Planner`] runs jobs one at a time. A renderer that exits non-zero fails
//! that job only. A renderer executable that cannot be found disables
//! rendering for the rest of the run, logging a single error.

use crate::cache::{self, CacheStats, RenderStatus, path_hash};
use crate::config::RenderConfig;
use crate::geo::Rectangle;
use crate::naming::sanitize_filename;
use crate::record::{PhotoRecord, compose_location};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

const PHOTO_HASH_LEN: usize = 10;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("renderer {program:?} not found: {source}")]
    MissingExecutable {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("renderer failed for {output}: {message}")]
    Failed { output: PathBuf, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Photo,
    Collection,
    Country,
    Unknown,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetKind::Photo => "photo",
            TargetKind::Collection => "summary",
            TargetKind::Country => "country",
            TargetKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub kind: TargetKind,
    /// Human label for logs: photo title or bucket name.
    pub label: String,
    pub output: PathBuf,
    pub args: Vec<String>,
}

/// Something that turns a [`RenderJob`] into an image file.
pub trait Renderer {
    fn render(&self, job: &RenderJob) -> Result<(), RenderError>;
}

/// Renderer backed by an external command, typically the cartopy script.
#[derive(Debug, Clone)]
pub struct MapRenderer {
    command: Vec<String>,
}

impl MapRenderer {
    /// `command[0]` is the program; the rest are passed before the job's
    /// own arguments.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Renderer for MapRenderer {
    fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        let Some((program, leading)) = self.command.split_first() else {
            return Err(RenderError::MissingExecutable {
                program: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "empty command"),
            });
        };
        let output = Command::new(program)
            .args(leading)
            .args(&job.args)
            .output()
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => RenderError::MissingExecutable {
                    program: program.clone(),
                    source,
                },
                _ => RenderError::Io(source),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.lines().rev().find(|l| !l.trim().is_empty());
            return Err(RenderError::Failed {
                output: job.output.clone(),
                message: format!("{} ({})", output.status, last.unwrap_or("no output").trim()),
            });
        }
        if !job.output.is_file() {
            return Err(RenderError::Failed {
                output: job.output.clone(),
                message: "renderer exited cleanly but wrote no file".into(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Output paths
// ============================================================================

/// `key` is the photo's path relative to the photo directory.
pub fn photo_output(dir: &Path, key: &Path, ext: &str) -> PathBuf {
    let stem = key
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!(
        "{}-{}.{ext}",
        sanitize_filename(&stem),
        path_hash(key, PHOTO_HASH_LEN)
    ))
}

pub fn collection_output(dir: &Path, ext: &str) -> PathBuf {
    dir.join(format!("summary.{ext}"))
}

pub fn country_output(dir: &Path, country: &str, ext: &str) -> PathBuf {
    dir.join(format!("country-{}.{ext}", sanitize_filename(country)))
}

pub fn unknown_output(dir: &Path, ext: &str) -> PathBuf {
    dir.join(format!("country-unknown.{ext}"))
}

// ============================================================================
// Job builders
// ============================================================================

/// Renderer options shared by every job of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub format: String,
    pub dpi: u32,
    pub fig_width: f64,
    pub clock_size: u32,
    pub min_distance_m: f64,
    pub theme: Option<PathBuf>,
}

impl From<&RenderConfig> for RenderOptions {
    fn from(config: &RenderConfig) -> Self {
        Self {
            format: config.format.clone(),
            dpi: config.dpi,
            fig_width: config.fig_width,
            clock_size: config.clock_size,
            min_distance_m: config.min_distance_m,
            theme: config.theme.clone(),
        }
    }
}

impl RenderOptions {
    fn push_common(&self, args: &mut Vec<String>, output: &Path) {
        if let Some(theme) = &self.theme {
            args.push("--theme".into());
            args.push(theme.display().to_string());
        }
        args.push("--out".into());
        args.push(output.display().to_string());
        args.push("--dpi".into());
        args.push(self.dpi.to_string());
        args.push("--fig-width".into());
        args.push(self.fig_width.to_string());
        args.push("--no-show".into());
    }
}

/// Free text is attached with `=` so a value starting with `-` is not read
/// as a flag.
fn push_text(args: &mut Vec<String>, flag: &str, value: &str) {
    args.push(format!("{flag}={value}"));
}

fn push_region(args: &mut Vec<String>, flag: &str, region: Rectangle) {
    args.push(flag.into());
    args.extend(region.as_extent().iter().map(f64::to_string));
}

/// Locator map for one photo under `root`. `None` when the record has no
/// coordinate.
pub fn photo_job(
    record: &PhotoRecord,
    root: &Path,
    dir: &Path,
    opts: &RenderOptions,
) -> Option<RenderJob> {
    let at = record.coordinate()?;
    let zoom = record.zoom_rect()?;
    let world = record.world_rect()?;
    let key = cache::photo_key(record.source(), root);
    let output = photo_output(dir, key, &opts.format);

    let title = record.title();
    let title_main = compose_location(&[record.city(), record.country()])
        .unwrap_or_else(|| title.clone());

    let mut args = Vec::new();
    push_region(&mut args, "--world-region", world);
    push_region(&mut args, "--zoom-region", zoom);
    args.push("--star".into());
    args.push(at.lat.to_string());
    args.push(at.lon.to_string());
    push_text(&mut args, "--title-main", &title_main);
    push_text(&mut args, "--title-inset", &title);
    push_text(&mut args, "--caption", record.date_label().unwrap_or_default());
    if let Some(clock) = record.clock_svg() {
        args.push("--clock-svg".into());
        args.push(clock.display().to_string());
        args.push("--clock-size".into());
        args.push(opts.clock_size.to_string());
    }
    opts.push_common(&mut args, &output);

    Some(RenderJob {
        kind: TargetKind::Photo,
        label: title,
        output,
        args,
    })
}

/// Inputs for one summary map.
#[derive(Debug, Clone, Copy)]
pub struct SummaryTarget<'a> {
    pub kind: TargetKind,
    pub label: &'a str,
    pub points_csv: &'a Path,
    pub caption: &'a str,
    pub region: Option<Rectangle>,
    pub output: &'a Path,
}

pub fn summary_job(target: SummaryTarget<'_>, opts: &RenderOptions) -> RenderJob {
    let mut args = vec![
        "--summary-points".to_string(),
        target.points_csv.display().to_string(),
        "--min-distance-m".to_string(),
        opts.min_distance_m.to_string(),
    ];
    push_text(&mut args, "--caption", target.caption);
    if let Some(region) = target.region {
        push_region(&mut args, "--world-region", region);
    }
    opts.push_common(&mut args, target.output);

    RenderJob {
        kind: target.kind,
        label: target.label.to_string(),
        output: target.output.to_path_buf(),
        args,
    }
}

// ============================================================================
// Planner
// ============================================================================

/// Runs jobs through the output cache and the renderer, keeping statistics.
pub struct Planner<'a> {
    renderer: &'a dyn Renderer,
    overwrite: bool,
    enabled: bool,
    stats: CacheStats,
}

impl<'a> Planner<'a> {
    pub fn new(renderer: &'a dyn Renderer, overwrite: bool, enabled: bool) -> Self {
        Self {
            renderer,
            overwrite,
            enabled,
            stats: CacheStats::default(),
        }
    }

    /// Existing outputs are reported as cached even when rendering is off.
    pub fn run(&mut self, job: &RenderJob) -> RenderStatus {
        let status = self.attempt(job);
        self.stats.record(status);
        status
    }

    fn attempt(&mut self, job: &RenderJob) -> RenderStatus {
        if cache::is_cached(&job.output, self.overwrite) {
            log::debug!("{} {}: cached at {}", job.kind, job.label, job.output.display());
            return RenderStatus::Cached;
        }
        if !self.enabled {
            return RenderStatus::Skipped;
        }
        if let Some(parent) = job.output.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            log::warn!("cannot create {}: {e}", parent.display());
            return RenderStatus::Failed;
        }
        match self.renderer.render(job) {
            Ok(()) => {
                log::info!("rendered {} {} → {}", job.kind, job.label, job.output.display());
                RenderStatus::Rendered
            }
            Err(e @ RenderError::MissingExecutable { .. }) => {
                log::error!("{e}; rendering disabled for this run");
                self.enabled = false;
                RenderStatus::Failed
            }
            Err(e) => {
                log::warn!("{} {}: {e}", job.kind, job.label);
                RenderStatus::Failed
            }
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn into_stats(self) -> CacheStats {
        self.stats
    }
}
