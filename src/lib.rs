//! # Photo Locator
//!
//! Turns a directory of geotagged photos into locator maps: one map per photo
//! (a country-scale view with a zoomed inset around the spot), plus summary
//! maps for the whole collection and for each country visited.
//!
//! # Architecture: One-Way Pipeline
//!
//! ```text
//! photos/ ─► scan ─► extract ─► enrich ─► aggregate ─► render ─► photos/locator-maps/
//!                    (exiftool)  (geocode,   (points,    (external
//!                                 countries,  countries,  renderer)
//!                                 captions)   dates)
//! ```
//!
//! Data only flows forward. Each photo becomes an immutable [`record::PhotoRecord`]
//! built up in stages; the collection summary is rebuilt from the full record
//! list on every run; render jobs are pure descriptions of a renderer call.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`geo`] | Rectangle algebra: clamp, union, point bounds, zoom and world windows |
//! | [`record`] | The per-photo record and its staged `with_*` transforms |
//! | [`metadata`] | Raw metadata from exiftool; timestamp, GPS and caption fields |
//! | [`captions`] | Caption cleanup and the automated or interactive choice between candidates |
//! | [`geocode`] | Coordinate → city and country, via a nearest-city table |
//! | [`countries`] | Country name → bounding rectangle, from GeoJSON boundaries |
//! | [`clock`] | Clock-face badge showing the capture time |
//! | [`enrich`] | Runs the per-photo stages |
//! | [`aggregate`] | Deduplicated points, country buckets, date range, global region |
//! | [`naming`] | Filename sanitization and output directory containment |
//! | [`cache`] | Output-existence cache and render statistics |
//! | [`render`] | Render jobs, the renderer command, and the cache-aware planner |
//! | [`artifacts`] | Point lists and the `index.csv` cross-reference |
//! | [`scan`] | Photo discovery |
//! | [`pipeline`] | One complete run, wiring the above together |
//! | [`output`] | Console report |
//! | [`config`] | `locator.toml` loading, merging and validation |
//!
//! # Design Decisions
//!
//! ## External Renderer
//!
//! Drawing coastlines and borders well is a solved problem in the Python
//! cartography stack and not one worth re-solving. The renderer is a separate
//! command (by default `python3 snapshot.py`) driven entirely by flags. This
//! crate decides *what* to draw (extents, markers, captions, badges) and the
//! renderer decides how it looks.
//!
//! ## Injected Collaborators
//!
//! exiftool, the geocoder, the boundary table, the renderer and the caption
//! prompt are all behind traits and passed in through
//! [`pipeline::Collaborators`]. Nothing reaches for a global. Tests run the
//! whole pipeline with in-memory fakes and never spawn a process.
//!
//! ## Files As Cache
//!
//! Output names are pure functions of stable inputs, so an existing file is a
//! finished render. A second run over an unchanged directory invokes the
//! renderer zero times. See [`cache`].

pub mod aggregate;
pub mod artifacts;
pub mod cache;
pub mod captions;
pub mod clock;
pub mod config;
pub mod countries;
pub mod enrich;
pub mod geo;
pub mod geocode;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
