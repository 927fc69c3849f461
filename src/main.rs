use clap::{Parser, Subcommand};
use photo_locator::captions::{CaptionChooser, FirstCaption, PromptCaption};
use photo_locator::config::{self, LocatorConfig};
use photo_locator::countries::CountryTable;
use photo_locator::geocode::{CityTable, NoGeocoder, ReverseGeocoder};
use photo_locator::metadata::ExifTool;
use photo_locator::pipeline::{self, Collaborators, RunOptions};
use photo_locator::render::MapRenderer;
use photo_locator::output;
use std::path::{Path, PathBuf};

/// Reference data and caption flags shared by `run` and `check`.
#[derive(clap::Args, Clone)]
struct DataArgs {
    /// GeoJSON country boundaries (overrides data.boundaries)
    #[arg(long, value_name = "FILE")]
    boundaries: Option<PathBuf>,

    /// lat,lon,city,country CSV for reverse geocoding (overrides data.cities)
    #[arg(long, value_name = "FILE")]
    cities: Option<PathBuf>,

    /// Ask which caption to use when a photo has several
    #[arg(long)]
    interactive: bool,
}

#[derive(clap::Args, Clone)]
struct RunArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Re-render maps that already exist
    #[arg(long)]
    overwrite: bool,

    /// Write point lists and the index but do not call the renderer
    #[arg(long)]
    no_render: bool,
}

#[derive(Parser)]
#[command(name = "photo-locator")]
#[command(about = "Locator maps for a directory of geotagged photos")]
#[command(long_about = "\
Locator maps for a directory of geotagged photos

Reads GPS position, capture time and captions from every photo (via
exiftool), then draws one map per photo and summary maps for the whole
collection and each country, using an external renderer.

Output layout:

  photos/
  ├── locator.toml                 # Optional config
  ├── IMG_0001.jpg
  └── locator-maps/
      ├── IMG_0001-3f2a9c1b04.png  # Per-photo map
      ├── summary.png              # Every photo
      ├── country-Ireland.png      # One per country
      ├── country-unknown.png      # Photos without a country
      ├── points-*.csv             # Deduplicated lat,lon lists
      ├── index.csv                # Photo → map cross-reference
      └── clocks/                  # Capture-time badges

Existing maps are never redrawn unless --overwrite is given.

Run 'photo-locator gen-config' to generate a documented locator.toml.")]
#[command(version)]
struct Cli {
    /// Photo directory
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enrich, aggregate and render every photo
    Run(RunArgs),
    /// Enrich and aggregate without rendering or writing; reports existing maps
    Check(DataArgs),
    /// Print a stock locator.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let mut overlay = data_overlay(&args.data)?;
            if args.overwrite {
                set(&mut overlay, "render", "overwrite", true.into());
            }
            if args.no_render {
                set(&mut overlay, "render", "enabled", false.into());
            }
            println!("==> Locating photos in {}", cli.source.display());
            execute(&cli.source, overlay, false)?;
        }
        Command::Check(data) => {
            println!("==> Checking {}", cli.source.display());
            execute(&cli.source, data_overlay(&data)?, true)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `read_only` never calls the renderer and writes nothing; existing maps
/// are still reported.
fn execute(
    source: &Path,
    overlay: toml::Table,
    read_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(source, Some(toml::Value::Table(overlay)))?;
    init_thread_pool(&config.processing);

    let countries = load_countries(&config)?;
    let cities = match &config.data.cities {
        Some(path) => {
            let table = CityTable::load(path, config.data.geocode_radius_km)?;
            log::info!("loaded {} cities from {}", table.len(), path.display());
            Some(table)
        }
        None => None,
    };
    let geocoder: &dyn ReverseGeocoder = match &cities {
        Some(table) => table,
        None => &NoGeocoder,
    };

    let mut first = FirstCaption;
    let mut prompt;
    let chooser: &mut dyn CaptionChooser = if config.captions.interactive {
        prompt = PromptCaption::console();
        &mut prompt
    } else {
        &mut first
    };

    let extractor = ExifTool::new();
    let renderer = MapRenderer::new(config.render.command.clone());
    let mut options = RunOptions::from_config(&config);
    if read_only {
        options.render = false;
        options.write_outputs = false;
    }

    let report = pipeline::run(
        source,
        &config,
        Collaborators {
            extractor: &extractor,
            geocoder,
            countries: countries.as_ref(),
            chooser,
            renderer: &renderer,
        },
        options,
        chrono::Local::now().naive_local(),
    )?;
    output::print_run_report(&report);
    println!("==> Output in {}", report.output_root.display());
    Ok(())
}

/// A configured boundary dataset must load. Without one the run continues
/// with padded extents instead of country rectangles.
fn load_countries(config: &LocatorConfig) -> Result<Option<CountryTable>, Box<dyn std::error::Error>> {
    match &config.data.boundaries {
        Some(path) => {
            let table = CountryTable::load_geojson(path)?;
            log::info!("loaded {} country boundaries from {}", table.len(), path.display());
            Ok(Some(table))
        }
        None => {
            log::warn!("no boundary dataset configured; per-photo maps use padded extents");
            Ok(None)
        }
    }
}

/// Command-line flags as a TOML overlay. Paths are made absolute against the
/// working directory, since relative paths in config resolve against the
/// photo directory.
fn data_overlay(args: &DataArgs) -> std::io::Result<toml::Table> {
    let mut overlay = toml::Table::new();
    if let Some(path) = &args.boundaries {
        let path = std::path::absolute(path)?;
        set(&mut overlay, "data", "boundaries", path.display().to_string().into());
    }
    if let Some(path) = &args.cities {
        let path = std::path::absolute(path)?;
        set(&mut overlay, "data", "cities", path.display().to_string().into());
    }
    if args.interactive {
        set(&mut overlay, "captions", "interactive", true.into());
    }
    Ok(overlay)
}

fn set(overlay: &mut toml::Table, section: &str, key: &str, value: toml::Value) {
    if let toml::Value::Table(table) = overlay
        .entry(section)
        .or_insert_with(|| toml::Value::Table(toml::Table::new()))
    {
        table.insert(key.to_string(), value);
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
