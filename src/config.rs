//! Run configuration.
//!
//! Settings come from three layers, each overriding the one before:
//!
//! ```text
//! stock defaults  →  <photos>/locator.toml  →  command-line flags
//! ```
//!
//! All layers are `toml::Value` tables merged key by key, then deserialized
//! into [`LocatorConfig`] and validated once. Invalid values are fatal before
//! any photo is touched.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! output_dir = "locator-maps"  # Relative to the photo directory
//!
//! [zoom]
//! area = 0.02                  # Inset window area in square degrees
//! aspect_ratio = 1.5           # Inset width:height
//!
//! [world]
//! padding_factor = 6.0         # Main map = inset × factor when the country is unknown
//! min_span = 0.5               # ...but never narrower than this many degrees
//!
//! [render]
//! enabled = true
//! command = ["python3", "snapshot.py"]
//! format = "png"
//! dpi = 300
//! fig_width = 8.0
//! clock_size = 64
//! min_distance_m = 0.0         # Summary maps merge points closer than this
//! overwrite = false
//! # theme = "theme.json"
//!
//! [captions]
//! interactive = false
//!
//! [data]
//! # boundaries = "countries.geojson"
//! # cities = "cities1000.csv"
//! geocode_radius_km = 50.0
//!
//! [clock]
//! enabled = true
//!
//! [processing]
//! # max_processes = 4
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::naming::{self, PathError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory config file.
pub const CONFIG_FILENAME: &str = "locator.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Invalid output directory: {0}")]
    OutputDir(#[from] PathError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocatorConfig {
    /// Directory for maps, point lists and badges, relative to the photo root.
    pub output_dir: PathBuf,
    pub zoom: ZoomConfig,
    pub world: WorldConfig,
    pub render: RenderConfig,
    pub captions: CaptionsConfig,
    pub data: DataConfig,
    pub clock: ClockConfig,
    pub processing: ProcessingConfig,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("locator-maps"),
            zoom: ZoomConfig::default(),
            world: WorldConfig::default(),
            render: RenderConfig::default(),
            captions: CaptionsConfig::default(),
            data: DataConfig::default(),
            clock: ClockConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

/// Inset ("zoom") window size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZoomConfig {
    /// Area in square degrees.
    pub area: f64,
    /// Width divided by height.
    pub aspect_ratio: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            area: 0.02,
            aspect_ratio: 1.5,
        }
    }
}

/// Main-map padding used when no country rectangle is available.
///
/// The 6× / 0.5° defaults are what looked right on real trips, not anything
/// derived; tune freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    pub padding_factor: f64,
    pub min_span: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            padding_factor: 6.0,
            min_span: 0.5,
        }
    }
}

/// External renderer invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub enabled: bool,
    /// Program and leading arguments, e.g. `["python3", "snapshot.py"]`.
    pub command: Vec<String>,
    /// Output image extension.
    pub format: String,
    pub dpi: u32,
    /// Figure width in inches.
    pub fig_width: f64,
    /// Clock badge size in pixels.
    pub clock_size: u32,
    /// Summary maps merge points closer than this (metres). 0 disables.
    pub min_distance_m: f64,
    /// Re-render even when the output file exists.
    pub overwrite: bool,
    /// Optional theme JSON passed through to the renderer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: vec!["python3".to_string(), "snapshot.py".to_string()],
            format: "png".to_string(),
            dpi: 300,
            fig_width: 8.0,
            clock_size: 64,
            min_distance_m: 0.0,
            overwrite: false,
            theme: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptionsConfig {
    /// Ask on the console when a photo has several different captions.
    pub interactive: bool,
}

/// Reference datasets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// GeoJSON country boundaries. Without it, no country rectangles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundaries: Option<PathBuf>,
    /// `lat,lon,city,country` CSV for reverse geocoding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cities: Option<PathBuf>,
    /// Farthest a photo may be from a city and still get its name.
    pub geocode_radius_km: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            boundaries: None,
            cities: None,
            geocode_radius_km: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    pub enabled: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Parallel metadata extraction settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of concurrent exiftool processes.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

impl LocatorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(value: f64, name: &str) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Validation(format!("{name} must be > 0")))
            }
        }
        fn non_negative(value: f64, name: &str) -> Result<(), ConfigError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Validation(format!("{name} must be >= 0")))
            }
        }

        positive(self.zoom.area, "zoom.area")?;
        positive(self.zoom.aspect_ratio, "zoom.aspect_ratio")?;
        positive(self.world.padding_factor, "world.padding_factor")?;
        non_negative(self.world.min_span, "world.min_span")?;
        positive(self.render.fig_width, "render.fig_width")?;
        non_negative(self.render.min_distance_m, "render.min_distance_m")?;
        positive(self.data.geocode_radius_km, "data.geocode_radius_km")?;
        if self.render.dpi == 0 {
            return Err(ConfigError::Validation("render.dpi must be > 0".into()));
        }
        if self.render.clock_size == 0 {
            return Err(ConfigError::Validation(
                "render.clock_size must be > 0".into(),
            ));
        }
        if self.render.command.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "render.command must name a program".into(),
            ));
        }
        if self.render.format.is_empty() || !self.render.format.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(
                "render.format must be a plain file extension".into(),
            ));
        }
        Ok(())
    }

    /// The validated output directory below `source`.
    pub fn output_root(&self, source: &Path) -> Result<PathBuf, ConfigError> {
        Ok(naming::contained_dir(source, &self.output_dir)?)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(LocatorConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `locator.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge overlays in order onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<LocatorConfig, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let config: LocatorConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config for a photo directory: stock defaults, then `locator.toml`,
/// then `cli` (flags already shaped as a TOML table).
///
/// Relative dataset and theme paths in the file are resolved against the
/// photo directory, made absolute.
pub fn load_config(source: &Path, cli: Option<toml::Value>) -> Result<LocatorConfig, ConfigError> {
    let root = naming::absolute_root(source)?;
    let base = stock_defaults_value();
    let file = load_raw_config(&root)?;
    let mut config = resolve_config(base, file.into_iter().chain(cli))?;
    for path in [
        &mut config.data.boundaries,
        &mut config.data.cities,
        &mut config.render.theme,
    ]
    .into_iter()
    .flatten()
    {
        if path.is_relative() {
            *path = root.join(&*path);
        }
    }
    config.output_root(&root)?;
    Ok(config)
}

/// Returns a fully-commented stock `locator.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Photo Locator Configuration
# ==========================
# Place this file as locator.toml in the photo directory.
# All settings are optional; values shown are the defaults.
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# Where maps, point lists and clock badges are written, relative to the
# photo directory. Must be a subdirectory of it.
output_dir = "locator-maps"

# ---------------------------------------------------------------------------
# Inset (zoom) window around each photo
# ---------------------------------------------------------------------------
[zoom]
# Area of the window in square degrees.
area = 0.02
# Width:height ratio of the window.
aspect_ratio = 1.5

# ---------------------------------------------------------------------------
# Main map when the photo's country is unknown
# ---------------------------------------------------------------------------
[world]
# The inset window scaled by this factor on each axis...
padding_factor = 6.0
# ...but never narrower than this many degrees.
min_span = 0.5

# ---------------------------------------------------------------------------
# External renderer
# ---------------------------------------------------------------------------
[render]
enabled = true
# Program and leading arguments.
command = ["python3", "snapshot.py"]
format = "png"
dpi = 300
# Figure width in inches.
fig_width = 8.0
# Clock badge size in pixels.
clock_size = 64
# Summary maps merge points closer than this many metres (0 = never).
min_distance_m = 0.0
# Re-render maps that already exist.
overwrite = false
# Theme JSON passed to the renderer.
# theme = "theme.json"

# ---------------------------------------------------------------------------
# Captions
# ---------------------------------------------------------------------------
[captions]
# Ask which caption to use when a photo has several.
interactive = false

# ---------------------------------------------------------------------------
# Reference data (paths relative to the photo directory)
# ---------------------------------------------------------------------------
[data]
# GeoJSON FeatureCollection of country boundaries.
# boundaries = "countries.geojson"
# CSV of lat,lon,city,country for reverse geocoding.
# cities = "cities1000.csv"
# Farthest a photo may be from a city and still get its name.
geocode_radius_km = 50.0

# ---------------------------------------------------------------------------
# Clock badge on per-photo maps
# ---------------------------------------------------------------------------
[clock]
enabled = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum concurrent exiftool processes.
# Omit to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = LocatorConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("locator-maps"));
        assert_eq!(config.zoom.area, 0.02);
        assert_eq!(config.zoom.aspect_ratio, 1.5);
        assert_eq!(config.world.padding_factor, 6.0);
        assert_eq!(config.world.min_span, 0.5);
        assert_eq!(config.render.dpi, 300);
        assert!(!config.captions.interactive);
        assert!(config.clock.enabled);
    }

    #[test]
    fn default_config_is_valid() {
        LocatorConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_config() {
        let config: LocatorConfig = toml::from_str(
            r#"
[zoom]
area = 0.5
"#,
        )
        .unwrap();
        assert_eq!(config.zoom.area, 0.5);
        assert_eq!(config.zoom.aspect_ratio, 1.5);
        assert_eq!(config.render.format, "png");
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<LocatorConfig, _> = toml::from_str("[zoom]\narea_deg = 1.0\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // validate
    // =========================================================================

    #[test]
    fn validate_rejects_non_positive_area() {
        let mut config = LocatorConfig::default();
        config.zoom.area = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.zoom.area = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_aspect() {
        let mut config = LocatorConfig::default();
        config.zoom.aspect_ratio = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_nan() {
        let mut config = LocatorConfig::default();
        config.render.fig_width = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_dpi_and_empty_command() {
        let mut config = LocatorConfig::default();
        config.render.dpi = 0;
        assert!(config.validate().is_err());

        let mut config = LocatorConfig::default();
        config.render.command = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_odd_formats() {
        let mut config = LocatorConfig::default();
        config.render.format = "../png".into();
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // merge / load
    // =========================================================================

    #[test]
    fn merge_toml_overlays_nested_tables() {
        let base: toml::Value = toml::from_str("[render]\ndpi = 300\nformat = \"png\"\n").unwrap();
        let overlay: toml::Value = toml::from_str("[render]\ndpi = 150\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["render"]["dpi"].as_integer(), Some(150));
        assert_eq!(merged["render"]["format"].as_str(), Some("png"));
    }

    #[test]
    fn load_config_defaults_without_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.zoom.area, 0.02);
    }

    #[test]
    fn load_config_reads_file_and_cli_wins() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[render]\ndpi = 150\noverwrite = false\n[data]\nboundaries = \"ne.geojson\"\n",
        )
        .unwrap();
        let cli: toml::Value = toml::from_str("[render]\noverwrite = true\n").unwrap();
        let config = load_config(tmp.path(), Some(cli)).unwrap();
        assert_eq!(config.render.dpi, 150);
        assert!(config.render.overwrite);
        assert_eq!(config.data.boundaries, Some(tmp.path().join("ne.geojson")));
    }

    #[test]
    fn load_config_rejects_escaping_output_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "output_dir = \"../maps\"\n").unwrap();
        assert!(matches!(
            load_config(tmp.path(), None),
            Err(ConfigError::OutputDir(PathError::Escapes { .. }))
        ));
    }

    #[test]
    fn load_config_rejects_photo_dir_as_output() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "output_dir = \".\"\n").unwrap();
        assert!(matches!(
            load_config(tmp.path(), None),
            Err(ConfigError::OutputDir(PathError::IsRoot(_)))
        ));
    }

    #[test]
    fn load_config_rejects_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[zoom\narea = ").unwrap();
        assert!(matches!(
            load_config(tmp.path(), None),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: LocatorConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = LocatorConfig::default();
        assert_eq!(config.output_dir, defaults.output_dir);
        assert_eq!(config.zoom.area, defaults.zoom.area);
        assert_eq!(config.render.command, defaults.render.command);
        assert_eq!(config.data.geocode_radius_km, defaults.data.geocode_radius_km);
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(10_000),
        };
        assert_eq!(effective_threads(&config), cores);
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }
}
