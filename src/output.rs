//! Console report for a run.
//!
//! # Information-First Display
//!
//! Every entity leads with its positional index and human title; file paths
//! follow as indented context lines. The report reads as an inventory of the
//! trip, while each line can still be traced back to a file.
//!
//! ```text
//! Photos
//! 001 Campus
//!     Source: day1/IMG_0001.jpg
//!     Location: Campus, Limerick, Ireland
//!     Date: 3 March 2024
//!     Map: rendered → IMG_0001-3f2a9c1b04.png
//! 002 IMG_0002
//!     Source: day1/IMG_0002.jpg
//!     Map: skipped
//!
//! Countries
//! 001 Ireland (1 photos)
//!     1 Photos. 3 March 2024 – 3 March 2024
//!     Map: cached → country-Ireland.png
//!
//! Unknown (1 photos)
//!     1 Photos
//!     Map: skipped
//!
//! Collection (2 photos)
//!     2 Photos. 3 March 2024 – 3 March 2024
//!     Unique points: 1
//!     Region: lon -10.5000 … -6.0000, lat 51.4000 … 55.4000
//!     Map: cached → summary.png
//!
//! Maps: 2 cached, 1 rendered (3 total)
//! ```
//!
//! # Architecture
//!
//! [`format_run_report`] returns `Vec<String>` for testability and
//! [`print_run_report`] writes it to stdout. Formatting is pure: no I/O, no
//! side effects.

use crate::geo::Rectangle;
use crate::pipeline::{MapOutcome, RunReport, SummaryReport};
use crate::render::TargetKind;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// ```text
/// 001 Ireland (5 photos)
/// 001 Campus
/// ```
fn entity_header(index: usize, title: &str, count: Option<usize>) -> String {
    match count {
        Some(n) => format!("{} {} ({} photos)", format_index(index), title, n),
        None => format!("{} {}", format_index(index), title),
    }
}

fn relative<'a>(path: &'a Path, base: &Path) -> std::borrow::Cow<'a, str> {
    path.strip_prefix(base).unwrap_or(path).to_string_lossy()
}

fn map_line(map: &MapOutcome, output_root: &Path) -> String {
    match &map.output {
        Some(path) => format!(
            "{}Map: {} → {}",
            indent(1),
            map.status,
            relative(path, output_root)
        ),
        None => format!("{}Map: {}", indent(1), map.status),
    }
}

fn region_line(region: &Rectangle) -> String {
    format!(
        "{}Region: lon {:.4} … {:.4}, lat {:.4} … {:.4}",
        indent(1),
        region.min_lon,
        region.max_lon,
        region.min_lat,
        region.max_lat
    )
}

fn summary_lines(summary: &SummaryReport, output_root: &Path) -> Vec<String> {
    vec![
        format!("{}{}", indent(1), summary.caption),
        map_line(&summary.map, output_root),
    ]
}

// ============================================================================
// Run report
// ============================================================================

pub fn format_run_report(report: &RunReport) -> Vec<String> {
    let mut lines = Vec::new();
    let out = report.output_root.as_path();

    lines.push("Photos".to_string());
    for (i, photo) in report.photos.iter().enumerate() {
        let r = &photo.record;
        lines.push(entity_header(i + 1, &r.title(), None));
        lines.push(format!("{}Source: {}", indent(1), relative(r.source(), &report.source)));
        if let Some(location) = r.location() {
            lines.push(format!("{}Location: {}", indent(1), location));
        }
        if let Some(date) = r.date_label() {
            lines.push(format!("{}Date: {}", indent(1), date));
        }
        lines.push(map_line(&photo.map, out));
    }
    let excluded = report.scanned.saturating_sub(report.photos.len());
    if excluded > 0 {
        lines.push(format!("{}({} without usable metadata)", indent(1), excluded));
    }

    let countries: Vec<(&SummaryReport, usize)> = report
        .summaries
        .iter()
        .filter(|s| s.kind == TargetKind::Country)
        .zip(report.collection.countries.iter().map(|b| b.members.len()))
        .collect();
    if !countries.is_empty() {
        lines.push(String::new());
        lines.push("Countries".to_string());
        for (i, (summary, count)) in countries.iter().enumerate() {
            lines.push(entity_header(i + 1, &summary.label, Some(*count)));
            lines.extend(summary_lines(summary, out));
        }
    }

    if let (Some(summary), Some(bucket)) = (
        report.summaries.iter().find(|s| s.kind == TargetKind::Unknown),
        &report.collection.unknown,
    ) {
        lines.push(String::new());
        lines.push(format!("{} ({} photos)", summary.label, bucket.members.len()));
        lines.extend(summary_lines(summary, out));
    }

    lines.push(String::new());
    lines.push(format!("Collection ({} photos)", report.collection.photo_count));
    lines.push(format!("{}{}", indent(1), report.collection.caption));
    lines.push(format!(
        "{}Unique points: {}",
        indent(1),
        report.collection.points.len()
    ));
    if let Some(region) = &report.collection.region {
        lines.push(region_line(region));
    }
    if let Some(summary) = report
        .summaries
        .iter()
        .find(|s| s.kind == TargetKind::Collection)
    {
        lines.push(map_line(&summary.map, out));
    }

    lines.push(String::new());
    lines.push(format!("Maps: {}", report.stats));
    lines
}

/// Print the run report to stdout.
pub fn print_run_report(report: &RunReport) {
    for line in format_run_report(report) {
        println!("{}", line);
    }
}
