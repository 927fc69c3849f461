//! Collection-wide aggregation.
//!
//! [`Collection::build`] is rebuilt from the full record list on every run;
//! nothing here is persisted or updated incrementally. Records are referred
//! to by index into the slice they were built from, so a bucket never owns
//! or copies a record.
//!
//! ## Points
//!
//! Coordinates are deduplicated on their 6-decimal key
//! ([`Coordinate::dedup_key`]). The first occurrence of each key, in photo
//! order, is kept with its original unrounded value.
//!
//! ## Global region
//!
//! The union of every country rectangle that was found, widened to include
//! photos whose country could not be looked up. When the result is wider
//! than 180° of longitude it is replaced by a near-global band (see
//! [`geo::dateline_fallback`]).

use crate::geo::{self, Coordinate, Rectangle};
use crate::metadata::format_date;
use crate::record::PhotoRecord;
use chrono::{Datelike, NaiveDateTime};
use std::collections::{BTreeMap, HashSet};

/// Display name of the bucket for photos without a country.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Capture years before this are treated as unset camera clocks.
pub const MIN_VALID_YEAR: i32 = 2000;

/// Photos that share a country, or the photos that have none.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Country name; `None` for the unknown bucket.
    pub name: Option<String>,
    /// Indices into the record slice, in photo order.
    pub members: Vec<usize>,
    pub points: Vec<Coordinate>,
    /// Country rectangle, when the boundary table had one.
    pub region: Option<Rectangle>,
    pub caption: String,
}

impl Bucket {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub photo_count: usize,
    /// Deduplicated coordinates of the whole collection.
    pub points: Vec<Coordinate>,
    /// One bucket per country name, sorted by name.
    pub countries: Vec<Bucket>,
    /// Photos without a country. `None` when every photo has one.
    pub unknown: Option<Bucket>,
    pub region: Option<Rectangle>,
    /// Plausible capture times, ascending.
    pub dates: Vec<NaiveDateTime>,
    pub caption: String,
}

impl Collection {
    pub fn build(records: &[PhotoRecord], now: NaiveDateTime) -> Self {
        let mut by_country: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        let mut unknown = Vec::new();
        for (i, record) in records.iter().enumerate() {
            match record.country() {
                Some(name) => by_country.entry(name).or_default().push(i),
                None => unknown.push(i),
            }
        }

        let countries = by_country
            .into_iter()
            .map(|(name, members)| {
                let region = members.iter().find_map(|&i| records[i].country_rect());
                bucket(records, Some(name.to_string()), members, region, now)
            })
            .collect();
        let unknown =
            (!unknown.is_empty()).then(|| bucket(records, None, unknown, None, now));

        let all: Vec<usize> = (0..records.len()).collect();
        let dates = valid_dates(records, &all, now);

        Self {
            photo_count: records.len(),
            points: unique_points(records, &all),
            countries,
            unknown,
            region: global_region(records),
            caption: date_caption(records.len(), &dates),
            dates,
        }
    }

    /// Every bucket, countries first, then the unknown bucket.
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.countries.iter().chain(self.unknown.iter())
    }
}

fn bucket(
    records: &[PhotoRecord],
    name: Option<String>,
    members: Vec<usize>,
    region: Option<Rectangle>,
    now: NaiveDateTime,
) -> Bucket {
    let dates = valid_dates(records, &members, now);
    Bucket {
        name,
        points: unique_points(records, &members),
        region,
        caption: date_caption(members.len(), &dates),
        members,
    }
}

/// First occurrence of each dedup key, in member order.
fn unique_points(records: &[PhotoRecord], members: &[usize]) -> Vec<Coordinate> {
    let mut seen = HashSet::new();
    members
        .iter()
        .filter_map(|&i| records[i].coordinate())
        .filter(|c| seen.insert(c.dedup_key()))
        .collect()
}

fn valid_dates(records: &[PhotoRecord], members: &[usize], now: NaiveDateTime) -> Vec<NaiveDateTime> {
    let mut dates: Vec<NaiveDateTime> = members
        .iter()
        .filter_map(|&i| records[i].taken_at())
        .filter(|ts| ts.year() >= MIN_VALID_YEAR && *ts <= now)
        .collect();
    dates.sort();
    dates
}

fn global_region(records: &[PhotoRecord]) -> Option<Rectangle> {
    let countries = records.iter().filter_map(PhotoRecord::country_rect);
    let stray = geo::from_points(
        records
            .iter()
            .filter(|r| r.country_rect().is_none())
            .filter_map(PhotoRecord::coordinate),
    );
    countries
        .chain(stray)
        .reduce(geo::union)
        .map(geo::dateline_fallback)
}

/// `"12 Photos"`, or `"12 Photos. 3 March 2024 – 9 April 2024"` when any
/// valid date exists. `dates` must be sorted.
pub fn date_caption(count: usize, dates: &[NaiveDateTime]) -> String {
    match (dates.first(), dates.last()) {
        (Some(earliest), Some(latest)) => format!(
            "{count} Photos. {} – {}",
            format_date(earliest),
            format_date(latest)
        ),
        _ => format!("{count} Photos"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn now() -> NaiveDateTime {
        ts(2025, 1, 1)
    }

    fn photo(name: &str, lat: f64, lon: f64) -> PhotoRecord {
        PhotoRecord::new(name).with_coordinate(Some(Coordinate::new(lat, lon)))
    }

    fn in_country(r: PhotoRecord, country: &str, rect: Option<Rectangle>) -> PhotoRecord {
        r.with_place(None, Some(country.into()))
            .with_regions(rect, None, None)
    }

    #[test]
    fn points_deduplicate_on_six_decimals() {
        let records = vec![
            photo("a.jpg", 52.1234561, -8.0),
            photo("b.jpg", 52.1234564, -8.0),
            photo("c.jpg", 52.123457, -8.0),
        ];
        let c = Collection::build(&records, now());
        assert_eq!(c.points.len(), 2);
        assert_eq!(c.points[0], Coordinate::new(52.1234561, -8.0));
    }

    #[test]
    fn groups_by_country_with_unknown_bucket() {
        let ie = Rectangle::new(51.4, 55.4, -10.5, -6.0);
        let records = vec![
            in_country(photo("a.jpg", 52.0, -8.0), "Ireland", Some(ie)),
            in_country(photo("b.jpg", 48.8, 2.3), "France", None),
            photo("c.jpg", 0.0, 0.0),
            in_country(photo("d.jpg", 53.3, -6.2), "Ireland", Some(ie)),
            PhotoRecord::new("e.jpg").with_timestamp(Some(ts(2024, 1, 1)), None),
        ];
        let c = Collection::build(&records, now());

        let names: Vec<&str> = c.countries.iter().map(Bucket::label).collect();
        assert_eq!(names, ["France", "Ireland"]);
        assert_eq!(c.countries[1].members, [0, 3]);
        assert_eq!(c.countries[1].region, Some(ie));
        assert_eq!(c.countries[0].region, None);

        let unknown = c.unknown.as_ref().unwrap();
        assert_eq!(unknown.label(), UNKNOWN_LABEL);
        assert_eq!(unknown.members, [2, 4]);
        assert_eq!(unknown.points, [Coordinate::new(0.0, 0.0)]);
        assert_eq!(c.buckets().count(), 3);
    }

    #[test]
    fn no_unknown_bucket_when_everything_has_a_country() {
        let records = vec![in_country(photo("a.jpg", 1.0, 1.0), "X", None)];
        assert!(Collection::build(&records, now()).unknown.is_none());
    }

    #[test]
    fn global_region_unions_countries_and_stray_points() {
        let ie = Rectangle::new(51.4, 55.4, -10.5, -6.0);
        let records = vec![
            in_country(photo("a.jpg", 52.0, -8.0), "Ireland", Some(ie)),
            photo("b.jpg", 48.8, 2.3),
        ];
        let c = Collection::build(&records, now());
        assert_eq!(c.region, Some(Rectangle::new(48.8, 55.4, -10.5, 2.3)));
    }

    #[test]
    fn global_region_falls_back_past_180_degrees() {
        let records = vec![photo("a.jpg", 10.0, -170.0), photo("b.jpg", 20.0, 170.0)];
        let region = Collection::build(&records, now()).region.unwrap();
        assert_eq!(region.min_lon, -180.0);
        assert_eq!(region.max_lon, 180.0);
        assert_eq!(region.min_lat, 5.0);
        assert_eq!(region.max_lat, 25.0);
    }

    #[test]
    fn global_region_none_without_coordinates() {
        let records = vec![PhotoRecord::new("a.jpg").with_timestamp(Some(ts(2024, 1, 1)), None)];
        assert_eq!(Collection::build(&records, now()).region, None);
    }

    #[test]
    fn dates_filter_implausible_years_and_future() {
        let records = vec![
            PhotoRecord::new("a.jpg").with_timestamp(Some(ts(1970, 1, 1)), None),
            PhotoRecord::new("b.jpg").with_timestamp(Some(ts(2024, 4, 9)), None),
            PhotoRecord::new("c.jpg").with_timestamp(Some(ts(2030, 1, 1)), None),
            PhotoRecord::new("d.jpg").with_timestamp(Some(ts(2024, 3, 3)), None),
        ];
        let c = Collection::build(&records, now());
        assert_eq!(c.dates, [ts(2024, 3, 3), ts(2024, 4, 9)]);
        assert_eq!(c.caption, "4 Photos. 3 March 2024 – 9 April 2024");
    }

    #[test]
    fn date_caption_without_dates() {
        assert_eq!(date_caption(3, &[]), "3 Photos");
    }

    #[test]
    fn bucket_captions_use_only_their_members() {
        let records = vec![
            in_country(photo("a.jpg", 1.0, 1.0), "X", None).with_timestamp(Some(ts(2021, 5, 1)), None),
            photo("b.jpg", 2.0, 2.0).with_timestamp(Some(ts(2023, 6, 2)), None),
        ];
        let c = Collection::build(&records, now());
        assert_eq!(c.countries[0].caption, "1 Photos. 1 May 2021 – 1 May 2021");
        assert_eq!(c.caption, "2 Photos. 1 May 2021 – 2 June 2023");
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let records = vec![photo("a.jpg", 1.0, 1.0), photo("b.jpg", 2.0, 2.0)];
        assert_eq!(
            Collection::build(&records, now()),
            Collection::build(&records, now())
        );
    }
}
