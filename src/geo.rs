//! Latitude/longitude rectangle algebra.
//!
//! Everything here is pure: no I/O, no configuration lookups. The pipeline
//! builds every region it hands to the renderer from these functions.
//!
//! ## Invariant
//!
//! A [`Rectangle`] produced by any function in this module satisfies
//!
//! ```text
//! -90  <= min_lat <= max_lat <= 90
//! -180 <= min_lon <= max_lon <= 180
//! ```
//!
//! Edges are clamped independently, so a zoom window near a pole or the
//! antimeridian comes out lopsided rather than shifted. Maps of the Bering
//! Strait look a little odd; that is accepted.
//!
//! ## Argument order
//!
//! Rectangles store latitude first because that is how people read
//! coordinates. The renderer wants `lon_min lon_max lat_min lat_max`; use
//! [`Rectangle::as_extent`] at that boundary and nowhere else.

pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Decimal places kept in a coordinate dedup key (≈ 11 cm at the equator).
pub const DEDUP_DECIMALS: i32 = 6;

/// A photo location in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Whether both components are finite and inside the legal ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (MIN_LAT..=MAX_LAT).contains(&self.lat)
            && (MIN_LON..=MAX_LON).contains(&self.lon)
    }

    /// Rounded integer key used only for set membership, never stored as a
    /// coordinate.
    pub fn dedup_key(&self) -> (i64, i64) {
        let scale = 10f64.powi(DEDUP_DECIMALS);
        (
            (self.lat * scale).round() as i64,
            (self.lon * scale).round() as i64,
        )
    }
}

/// An axis-aligned latitude/longitude box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Rectangle {
    /// Build a rectangle and clamp it to legal bounds.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        clamp(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }

    /// `[lon_min, lon_max, lat_min, lat_max]`, the order the renderer expects.
    pub fn as_extent(&self) -> [f64; 4] {
        [self.min_lon, self.max_lon, self.min_lat, self.max_lat]
    }
}

/// Clamp all four bounds to legal ranges, then order each axis.
pub fn clamp(r: Rectangle) -> Rectangle {
    let lat_a = r.min_lat.clamp(MIN_LAT, MAX_LAT);
    let lat_b = r.max_lat.clamp(MIN_LAT, MAX_LAT);
    let lon_a = r.min_lon.clamp(MIN_LON, MAX_LON);
    let lon_b = r.max_lon.clamp(MIN_LON, MAX_LON);
    Rectangle {
        min_lat: lat_a.min(lat_b),
        max_lat: lat_a.max(lat_b),
        min_lon: lon_a.min(lon_b),
        max_lon: lon_a.max(lon_b),
    }
}

/// Componentwise min/max of two rectangles.
pub fn union(a: Rectangle, b: Rectangle) -> Rectangle {
    Rectangle {
        min_lat: a.min_lat.min(b.min_lat),
        max_lat: a.max_lat.max(b.max_lat),
        min_lon: a.min_lon.min(b.min_lon),
        max_lon: a.max_lon.max(b.max_lon),
    }
}

/// Bounding rectangle of a point set, or `None` when there are no points.
pub fn from_points<I>(points: I) -> Option<Rectangle>
where
    I: IntoIterator<Item = Coordinate>,
{
    let mut iter = points.into_iter();
    let first = iter.next()?;
    let seed = Rectangle {
        min_lat: first.lat,
        max_lat: first.lat,
        min_lon: first.lon,
        max_lon: first.lon,
    };
    let bounds = iter.fold(seed, |acc, p| Rectangle {
        min_lat: acc.min_lat.min(p.lat),
        max_lat: acc.max_lat.max(p.lat),
        min_lon: acc.min_lon.min(p.lon),
        max_lon: acc.max_lon.max(p.lon),
    });
    Some(clamp(bounds))
}

/// A window of `area` square degrees with a `width:height` ratio of `aspect`,
/// centered on the point.
///
/// `width * height = area` and `width / height = aspect` give
/// `width = sqrt(area * aspect)` and `height = sqrt(area / aspect)`. Width is
/// the longitude span. Non-positive `area` or `aspect` must be rejected by
/// configuration validation before getting here.
pub fn zoom_rectangle(center: Coordinate, area: f64, aspect: f64) -> Rectangle {
    let width = (area * aspect).sqrt();
    let height = (area / aspect).sqrt();
    Rectangle::new(
        center.lat - height / 2.0,
        center.lat + height / 2.0,
        center.lon - width / 2.0,
        center.lon + width / 2.0,
    )
}

/// Main-map extent for a photo whose country rectangle is unknown: the zoom
/// window scaled by `factor` on each axis, never narrower than `min_span`.
pub fn expand_for_world(zoom: Rectangle, factor: f64, min_span: f64) -> Rectangle {
    let center = zoom.center();
    let height = (zoom.lat_span() * factor).max(min_span);
    let width = (zoom.lon_span() * factor).max(min_span);
    Rectangle::new(
        center.lat - height / 2.0,
        center.lat + height / 2.0,
        center.lon - width / 2.0,
        center.lon + width / 2.0,
    )
}

/// Replace a rectangle spanning more than half the globe in longitude with a
/// near-global band, since a box that wide usually straddles the antimeridian.
pub fn dateline_fallback(r: Rectangle) -> Rectangle {
    if r.lon_span() <= 180.0 {
        return r;
    }
    Rectangle::new(
        (r.min_lat - 5.0).max(-80.0),
        (r.max_lat + 5.0).min(80.0),
        MIN_LON,
        MAX_LON,
    )
}
