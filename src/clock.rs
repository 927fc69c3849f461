//! Clock-face badge showing the time a photo was taken.
//!
//! The renderer overlays this SVG on the inset map. The file name is derived
//! from the hash of the photo key (see [`crate::cache::photo_key`]) and the
//! time of day, so the same photo always
//! maps to the same badge and an existing badge is never rewritten.

use crate::cache::path_hash;
use chrono::{NaiveTime, Timelike};
use std::f64::consts::PI;
use std::io;
use std::path::{Path, PathBuf};

const CLOCK_HASH_LEN: usize = 12;
const SIZE: f64 = 100.0;

/// `<dir>/clock-<hash12>-<HHMM>.svg`
pub fn clock_path(dir: &Path, key: &Path, time: NaiveTime) -> PathBuf {
    dir.join(format!(
        "clock-{}-{:02}{:02}.svg",
        path_hash(key, CLOCK_HASH_LEN),
        time.hour(),
        time.minute()
    ))
}

/// Write the badge unless it already exists. Returns its path either way.
pub fn ensure_clock(dir: &Path, key: &Path, time: NaiveTime) -> io::Result<PathBuf> {
    let path = clock_path(dir, key, time);
    if !path.exists() {
        std::fs::create_dir_all(dir)?;
        std::fs::write(&path, clock_svg(time))?;
    }
    Ok(path)
}

/// End point of a hand `fraction` of the way round the dial.
fn hand(fraction: f64, length: f64) -> (f64, f64) {
    let c = SIZE / 2.0;
    let angle = fraction * 2.0 * PI - PI / 2.0;
    (c + length * angle.cos(), c + length * angle.sin())
}

/// A minimal analogue clock face as SVG.
pub fn clock_svg(time: NaiveTime) -> String {
    let c = SIZE / 2.0;
    let minutes = time.minute() as f64 + time.second() as f64 / 60.0;
    let hours = (time.hour() % 12) as f64 + minutes / 60.0;
    let (hx, hy) = hand(hours / 12.0, 22.0);
    let (mx, my) = hand(minutes / 60.0, 34.0);

    let ticks: String = (0..12)
        .map(|i| {
            let (x1, y1) = hand(i as f64 / 12.0, 40.0);
            let (x2, y2) = hand(i as f64 / 12.0, 45.0);
            format!(
                r#"<line x1="{x1:.2}" y1="{y1:.2}" x2="{x2:.2}" y2="{y2:.2}" stroke="white" stroke-width="2"/>"#
            )
        })
        .collect();

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {SIZE} {SIZE}" width="{SIZE}" height="{SIZE}">
<circle cx="{c}" cy="{c}" r="48" fill="#000000" fill-opacity="0.6" stroke="white" stroke-width="2"/>
{ticks}
<line x1="{c}" y1="{c}" x2="{hx:.2}" y2="{hy:.2}" stroke="white" stroke-width="4" stroke-linecap="round"/>
<line x1="{c}" y1="{c}" x2="{mx:.2}" y2="{my:.2}" stroke="white" stroke-width="2.5" stroke-linecap="round"/>
<circle cx="{c}" cy="{c}" r="3" fill="white"/>
</svg>
"##
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn clock_path_is_stable_for_same_photo_and_time() {
        let dir = Path::new("/out/clocks");
        let a = clock_path(dir, Path::new("/photos/a.jpg"), t(14, 5));
        let b = clock_path(dir, Path::new("/photos/a.jpg"), t(14, 5));
        assert_eq!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("clock-"));
        assert!(name.ends_with("-1405.svg"));
    }

    #[test]
    fn clock_path_differs_per_photo_and_time() {
        let dir = Path::new("/out");
        let base = clock_path(dir, Path::new("/photos/a.jpg"), t(14, 5));
        assert_ne!(base, clock_path(dir, Path::new("/photos/b.jpg"), t(14, 5)));
        assert_ne!(base, clock_path(dir, Path::new("/photos/a.jpg"), t(9, 30)));
    }

    #[test]
    fn ensure_clock_writes_once() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("clocks");
        let path = ensure_clock(&dir, Path::new("a.jpg"), t(3, 0)).unwrap();
        assert!(path.exists());

        std::fs::write(&path, "marker").unwrap();
        let again = ensure_clock(&dir, Path::new("a.jpg"), t(3, 0)).unwrap();
        assert_eq!(path, again);
        assert_eq!(std::fs::read_to_string(&again).unwrap(), "marker");
    }

    #[test]
    fn svg_hands_point_at_the_time() {
        // At 3:00 the hour hand points right (x > center, y == center).
        let (x, y) = hand(3.0 / 12.0, 22.0);
        assert!((x - 72.0).abs() < 1e-9);
        assert!((y - 50.0).abs() < 1e-9);
        let svg = clock_svg(t(3, 0));
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"x2="72.00" y2="50.00""#));
    }
}
