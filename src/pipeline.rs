//! One complete run over a photo directory.
//!
//! ```text
//! scan ─► extract (parallel) ─► enrich ─► aggregate ─► artifacts ─► render
//! ```
//!
//! Extraction is the only parallel stage: each photo costs one exiftool
//! subprocess and the results are collected back in photo order. Everything
//! after that runs on the calling thread, in order, because caption prompts
//! read from the console and the renderer is heavy enough on its own.
//!
//! Per-photo problems (unreadable metadata, no usable fields, a failed
//! render) are logged and never stop the run. Errors returned from [`run`]
//! are the ones that leave nothing useful to do: an invalid output location,
//! an unreadable photo directory, or artifacts that cannot be written.

use crate::aggregate::Collection;
use crate::artifacts::{self, ArtifactError, IndexRow};
use crate::cache::{CacheStats, RenderStatus};
use crate::captions::CaptionChooser;
use crate::config::{ConfigError, LocatorConfig};
use crate::countries::CountryTable;
use crate::enrich::{EnrichSettings, Enricher};
use crate::geocode::ReverseGeocoder;
use crate::metadata::{MetadataExtractor, RawMetadata};
use crate::naming::absolute_root;
use crate::record::PhotoRecord;
use crate::render::{self, Planner, RenderOptions, Renderer, SummaryTarget, TargetKind};
use crate::scan::{self, ScanError};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything outside the process the pipeline talks to.
pub struct Collaborators<'a> {
    pub extractor: &'a dyn MetadataExtractor,
    pub geocoder: &'a dyn ReverseGeocoder,
    /// `None` runs without country rectangles.
    pub countries: Option<&'a CountryTable>,
    pub chooser: &'a mut dyn CaptionChooser,
    pub renderer: &'a dyn Renderer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Invoke the renderer for missing maps. When off, existing maps are
    /// still reported.
    pub render: bool,
    /// Render even when the map already exists.
    pub overwrite: bool,
    /// Create the output directory and write point lists, the index and
    /// clock badges. Off for a read-only check.
    pub write_outputs: bool,
}

impl RunOptions {
    pub fn from_config(config: &LocatorConfig) -> Self {
        Self {
            render: config.render.enabled,
            overwrite: config.render.overwrite,
            write_outputs: true,
        }
    }
}

/// Outcome for one map target.
#[derive(Debug, Clone, PartialEq)]
pub struct MapOutcome {
    pub status: RenderStatus,
    /// Present when the map exists after the run.
    pub output: Option<PathBuf>,
}

impl MapOutcome {
    fn skipped() -> Self {
        Self {
            status: RenderStatus::Skipped,
            output: None,
        }
    }

    fn from_status(status: RenderStatus, output: PathBuf) -> Self {
        Self {
            status,
            output: status.has_output().then_some(output),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoReport {
    pub record: PhotoRecord,
    pub map: MapOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryReport {
    pub kind: TargetKind,
    pub label: String,
    pub caption: String,
    pub points: usize,
    pub map: MapOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub source: PathBuf,
    pub output_root: PathBuf,
    /// Files found by the scan, including ones later excluded.
    pub scanned: usize,
    pub photos: Vec<PhotoReport>,
    pub collection: Collection,
    /// Collection summary first, then countries by name, then unknown.
    pub summaries: Vec<SummaryReport>,
    pub stats: CacheStats,
}

/// Run the whole pipeline. `now` bounds the plausible capture dates.
pub fn run(
    source: &Path,
    config: &LocatorConfig,
    collaborators: Collaborators<'_>,
    options: RunOptions,
    now: NaiveDateTime,
) -> Result<RunReport, PipelineError> {
    let Collaborators {
        extractor,
        geocoder,
        countries,
        chooser,
        renderer,
    } = collaborators;

    let root = absolute_root(source)?;
    let output_root = config.output_root(&root)?;
    if options.write_outputs {
        std::fs::create_dir_all(&output_root)?;
    }

    let files = scan::scan(&root, &output_root)?;
    log::info!("found {} photos under {}", files.len(), root.display());

    let raw = extract_all(extractor, &files);

    let mut settings = EnrichSettings::from_config(config, &root, &output_root);
    if !options.write_outputs {
        settings.clock_dir = None;
    }
    let mut enricher = Enricher::new(
        settings,
        geocoder,
        countries,
        chooser,
    );
    let records: Vec<PhotoRecord> = files
        .iter()
        .zip(&raw)
        .filter_map(|(path, meta)| enricher.enrich(path, meta))
        .collect();
    drop(enricher);

    let collection = Collection::build(&records, now);
    if options.write_outputs {
        write_points(&collection, &output_root)?;
    }

    let render_opts = RenderOptions::from(&config.render);
    let mut planner = Planner::new(renderer, options.overwrite, options.render);

    let photos: Vec<PhotoReport> = records
        .into_iter()
        .map(|record| {
            let map = match render::photo_job(&record, &root, &output_root, &render_opts) {
                Some(job) => MapOutcome::from_status(planner.run(&job), job.output),
                None => MapOutcome::skipped(),
            };
            PhotoReport { record, map }
        })
        .collect();

    let summaries = render_summaries(&collection, &output_root, &render_opts, &mut planner);

    if options.write_outputs {
        let index = index_rows(&photos, &summaries, &root, &output_root);
        artifacts::write_index(&output_root.join(artifacts::INDEX_FILENAME), &index)?;
    }

    let stats = planner.into_stats();
    log::info!("maps: {stats}");

    Ok(RunReport {
        source: root,
        output_root,
        scanned: files.len(),
        photos,
        collection,
        summaries,
        stats,
    })
}

/// Extract metadata for every file on the rayon pool, keeping file order.
/// A failed extraction becomes empty metadata.
fn extract_all(extractor: &dyn MetadataExtractor, files: &[PathBuf]) -> Vec<RawMetadata> {
    files
        .par_iter()
        .map(|path| {
            extractor.extract(path).unwrap_or_else(|e| {
                log::warn!("{}: metadata extraction failed: {e}", path.display());
                RawMetadata::new()
            })
        })
        .collect()
}

fn write_points(collection: &Collection, dir: &Path) -> Result<(), ArtifactError> {
    artifacts::write_points(&artifacts::summary_points_path(dir), &collection.points)?;
    for bucket in &collection.countries {
        artifacts::write_points(
            &artifacts::country_points_path(dir, bucket.label()),
            &bucket.points,
        )?;
    }
    if let Some(unknown) = &collection.unknown {
        artifacts::write_points(&artifacts::unknown_points_path(dir), &unknown.points)?;
    }
    Ok(())
}

fn render_summaries(
    collection: &Collection,
    dir: &Path,
    opts: &RenderOptions,
    planner: &mut Planner<'_>,
) -> Vec<SummaryReport> {
    let ext = opts.format.as_str();
    let mut reports = vec![summarize(
        planner,
        opts,
        SummaryTarget {
            kind: TargetKind::Collection,
            label: "Collection",
            points_csv: &artifacts::summary_points_path(dir),
            caption: &collection.caption,
            region: collection.region,
            output: &render::collection_output(dir, ext),
        },
        collection.points.len(),
    )];
    for bucket in &collection.countries {
        reports.push(summarize(
            planner,
            opts,
            SummaryTarget {
                kind: TargetKind::Country,
                label: bucket.label(),
                points_csv: &artifacts::country_points_path(dir, bucket.label()),
                caption: &bucket.caption,
                region: bucket.region,
                output: &render::country_output(dir, bucket.label(), ext),
            },
            bucket.points.len(),
        ));
    }
    if let Some(unknown) = &collection.unknown {
        reports.push(summarize(
            planner,
            opts,
            SummaryTarget {
                kind: TargetKind::Unknown,
                label: unknown.label(),
                points_csv: &artifacts::unknown_points_path(dir),
                caption: &unknown.caption,
                region: None,
                output: &render::unknown_output(dir, ext),
            },
            unknown.points.len(),
        ));
    }
    reports
}

/// A summary with no points has nothing to draw and is skipped.
fn summarize(
    planner: &mut Planner<'_>,
    opts: &RenderOptions,
    target: SummaryTarget<'_>,
    points: usize,
) -> SummaryReport {
    let map = if points == 0 {
        MapOutcome::skipped()
    } else {
        let job = render::summary_job(target, opts);
        MapOutcome::from_status(planner.run(&job), job.output)
    };
    SummaryReport {
        kind: target.kind,
        label: target.label.to_string(),
        caption: target.caption.to_string(),
        points,
        map,
    }
}

fn relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

fn index_rows(
    photos: &[PhotoReport],
    summaries: &[SummaryReport],
    root: &Path,
    output_root: &Path,
) -> Vec<IndexRow> {
    let output = |map: &MapOutcome| {
        map.output
            .as_deref()
            .map(|p| relative(p, output_root))
            .unwrap_or_default()
    };
    let photo_rows = photos.iter().map(|p| IndexRow {
        kind: TargetKind::Photo.to_string(),
        label: p.record.title(),
        source: relative(p.record.source(), root),
        output: output(&p.map),
    });
    let summary_rows = summaries.iter().map(|s| IndexRow {
        kind: s.kind.to_string(),
        label: s.label.clone(),
        source: String::new(),
        output: output(&s.map),
    });
    photo_rows.chain(summary_rows).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::FirstCaption;
    use crate::geo::Rectangle;
    use crate::geocode::{NoGeocoder, Place};
    use crate::test_helpers::{FixedGeocoder, MapExtractor, RecordingRenderer};
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn photo_dir(names: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for name in names {
            fs::write(tmp.path().join(name), b"jpeg").unwrap();
        }
        tmp
    }

    fn extractor() -> MapExtractor {
        MapExtractor::new()
            .with(
                "a.jpg",
                &[
                    ("GPSLatitude", "52.6698"),
                    ("GPSLongitude", "-8.5773"),
                    ("DateTimeOriginal", "2024:03:03 14:05:00"),
                    ("Title", "Campus"),
                ],
            )
            .with(
                "b.jpg",
                &[
                    ("GPSLatitude", "52.6698"),
                    ("GPSLongitude", "-8.5773"),
                    ("DateTimeOriginal", "2024:03:04 09:00:00"),
                ],
            )
            .with("c.jpg", &[("Make", "Canon")])
    }

    fn options() -> RunOptions {
        RunOptions {
            render: true,
            overwrite: false,
            write_outputs: true,
        }
    }

    #[test]
    fn full_run_produces_maps_and_artifacts() {
        let tmp = photo_dir(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        let extractor = extractor();
        let geocoder = FixedGeocoder::new(Place {
            city: Some("Limerick".into()),
            country: Some("Ireland".into()),
        });
        let table = CountryTable::new(vec![(
            "Ireland".into(),
            Rectangle::new(51.4, 55.4, -10.5, -6.0),
        )]);
        let renderer = RecordingRenderer::new();
        let mut chooser = FirstCaption;

        let report = run(
            tmp.path(),
            &LocatorConfig::default(),
            Collaborators {
                extractor: &extractor,
                geocoder: &geocoder,
                countries: Some(&table),
                chooser: &mut chooser,
                renderer: &renderer,
            },
            options(),
            now(),
        )
        .unwrap();

        assert_eq!(report.scanned, 4);
        // c.jpg has nothing usable, d.jpg has no metadata at all
        assert_eq!(report.photos.len(), 2);
        assert_eq!(report.collection.points.len(), 1);
        assert_eq!(report.collection.caption, "2 Photos. 3 March 2024 – 4 March 2024");

        let labels: Vec<&str> = report.summaries.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["Collection", "Ireland"]);

        // two photos + summary + Ireland
        assert_eq!(renderer.invocations().len(), 4);
        assert_eq!(report.stats.renders, 4);

        let out = tmp.path().join("locator-maps");
        assert!(out.join("summary.png").is_file());
        assert!(out.join("country-Ireland.png").is_file());
        assert_eq!(
            fs::read_to_string(out.join("points-summary.csv")).unwrap(),
            "52.6698,-8.5773\n"
        );
        let index = fs::read_to_string(out.join("index.csv")).unwrap();
        assert!(index.starts_with("kind,label,source,output\n"));
        assert!(index.contains("photo,Campus,a.jpg,a-"));
        assert!(index.contains("country,Ireland,,country-Ireland.png"));
        assert!(out.join("clocks").is_dir());
    }

    #[test]
    fn second_run_is_fully_cached() {
        let tmp = photo_dir(&["a.jpg", "b.jpg"]);
        let extractor = extractor();
        let config = LocatorConfig::default();

        let first_renderer = RecordingRenderer::new();
        let mut chooser = FirstCaption;
        let first = run(
            tmp.path(),
            &config,
            Collaborators {
                extractor: &extractor,
                geocoder: &NoGeocoder,
                countries: None,
                chooser: &mut chooser,
                renderer: &first_renderer,
            },
            options(),
            now(),
        )
        .unwrap();
        assert!(!first_renderer.invocations().is_empty());

        let second_renderer = RecordingRenderer::new();
        let second = run(
            tmp.path(),
            &config,
            Collaborators {
                extractor: &extractor,
                geocoder: &NoGeocoder,
                countries: None,
                chooser: &mut chooser,
                renderer: &second_renderer,
            },
            options(),
            now(),
        )
        .unwrap();

        assert!(second_renderer.invocations().is_empty());
        assert_eq!(second.collection, first.collection);
        assert_eq!(second.stats.renders, 0);
        assert_eq!(second.stats.hits, first.stats.renders);
    }

    #[test]
    fn disabled_rendering_never_calls_renderer() {
        let tmp = photo_dir(&["a.jpg"]);
        let extractor = extractor();
        let renderer = RecordingRenderer::new();
        let mut chooser = FirstCaption;
        let report = run(
            tmp.path(),
            &LocatorConfig::default(),
            Collaborators {
                extractor: &extractor,
                geocoder: &NoGeocoder,
                countries: None,
                chooser: &mut chooser,
                renderer: &renderer,
            },
            RunOptions {
                render: false,
                overwrite: false,
                write_outputs: true,
            },
            now(),
        )
        .unwrap();
        assert!(renderer.invocations().is_empty());
        assert!(report.photos.iter().all(|p| p.map.status == RenderStatus::Skipped));
        assert!(report.summaries.iter().all(|s| s.map.output.is_none()));
    }

    #[test]
    fn read_only_run_reports_without_writing() {
        let tmp = photo_dir(&["a.jpg", "b.jpg"]);
        let extractor = extractor();
        let renderer = RecordingRenderer::new();
        let mut chooser = FirstCaption;
        let report = run(
            tmp.path(),
            &LocatorConfig::default(),
            Collaborators {
                extractor: &extractor,
                geocoder: &NoGeocoder,
                countries: None,
                chooser: &mut chooser,
                renderer: &renderer,
            },
            RunOptions {
                render: false,
                overwrite: false,
                write_outputs: false,
            },
            now(),
        )
        .unwrap();
        assert_eq!(report.photos.len(), 2);
        assert_eq!(report.collection.points.len(), 1);
        assert!(report.photos.iter().all(|p| p.record.clock_svg().is_none()));
        assert!(!tmp.path().join("locator-maps").exists());
        assert!(renderer.invocations().is_empty());
    }

    #[test]
    fn read_only_run_still_reports_existing_maps() {
        let tmp = photo_dir(&["a.jpg"]);
        let extractor = extractor();
        let config = LocatorConfig::default();
        let renderer = RecordingRenderer::new();
        let mut chooser = FirstCaption;
        run(
            tmp.path(),
            &config,
            Collaborators {
                extractor: &extractor,
                geocoder: &NoGeocoder,
                countries: None,
                chooser: &mut chooser,
                renderer: &renderer,
            },
            options(),
            now(),
        )
        .unwrap();
        let index = fs::read_to_string(tmp.path().join("locator-maps/index.csv")).unwrap();

        let report = run(
            tmp.path(),
            &config,
            Collaborators {
                extractor: &extractor,
                geocoder: &NoGeocoder,
                countries: None,
                chooser: &mut chooser,
                renderer: &renderer,
            },
            RunOptions {
                render: false,
                overwrite: false,
                write_outputs: false,
            },
            now(),
        )
        .unwrap();
        assert_eq!(report.photos[0].map.status, RenderStatus::Cached);
        assert_eq!(
            fs::read_to_string(tmp.path().join("locator-maps/index.csv")).unwrap(),
            index
        );
    }

    #[test]
    fn unknown_bucket_without_points_is_not_rendered() {
        let tmp = photo_dir(&["t.jpg"]);
        let extractor =
            MapExtractor::new().with("t.jpg", &[("DateTimeOriginal", "2024:01:01 10:00:00")]);
        let renderer = RecordingRenderer::new();
        let mut chooser = FirstCaption;
        let report = run(
            tmp.path(),
            &LocatorConfig::default(),
            Collaborators {
                extractor: &extractor,
                geocoder: &NoGeocoder,
                countries: None,
                chooser: &mut chooser,
                renderer: &renderer,
            },
            options(),
            now(),
        )
        .unwrap();
        assert_eq!(report.photos.len(), 1);
        assert!(renderer.invocations().is_empty());
        let unknown = report.summaries.last().unwrap();
        assert_eq!(unknown.kind, TargetKind::Unknown);
        assert_eq!(unknown.map.status, RenderStatus::Skipped);
    }

    #[test]
    fn escaping_output_dir_is_rejected() {
        let tmp = photo_dir(&["a.jpg"]);
        let extractor = extractor();
        let renderer = RecordingRenderer::new();
        let mut chooser = FirstCaption;
        let config = LocatorConfig {
            output_dir: PathBuf::from("../outside"),
            ..LocatorConfig::default()
        };
        let result = run(
            tmp.path(),
            &config,
            Collaborators {
                extractor: &extractor,
                geocoder: &NoGeocoder,
                countries: None,
                chooser: &mut chooser,
                renderer: &renderer,
            },
            options(),
            now(),
        );
        assert!(matches!(result, Err(PipelineError::Config(ConfigError::OutputDir(_)))));
        assert!(extractor.calls().is_empty());
    }
}
