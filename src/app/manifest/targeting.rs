//! Eligibility predicates attached to campaigns and content items
//!
//! Three independent filters decide whether an item may be shown right now:
//!
//! - [`DateRange`]: an inclusive validity window, either side optional
//! - [`TimeTargeting`]: weekday to hour-of-day allow list
//! - [`GeoFence`]: a set of polygons the device must be inside
//!
//! All of them treat "no data" as "no restriction".

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::constants::manifest::{GEO_SCALE, TIMESTAMP_FORMAT};

/// Inclusive validity window in device-local time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl DateRange {
    /// A window with no bounds on either side
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    /// Parse a manifest timestamp; unparsable input means "no bound"
    pub fn parse_bound(raw: Option<&str>) -> Option<NaiveDateTime> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
    }

    /// Whether `local` falls inside the window, bounds included
    pub fn contains(&self, local: NaiveDateTime) -> bool {
        let after_start = self.start.map_or(true, |start| local >= start);
        let before_end = self.end.map_or(true, |end| local <= end);
        after_start && before_end
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Weekday → eligible hours map
///
/// An empty map allows every hour of every day. Once any weekday is listed,
/// a weekday that is missing from the map allows nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeTargeting {
    hours: BTreeMap<u32, BTreeSet<u32>>,
}

impl TimeTargeting {
    /// Build from manifest day keys; `"1"` is Sunday through `"7"` Saturday,
    /// and `"8"` is also accepted as Sunday
    pub fn from_day_keys<I, H>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, H)>,
        H: IntoIterator<Item = u32>,
    {
        let mut hours: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        for (key, day_hours) in entries {
            let Some(day) = parse_day_key(&key) else {
                tracing::debug!("Ignoring unknown weekday key '{}' in time targeting", key);
                continue;
            };
            hours
                .entry(day)
                .or_default()
                .extend(day_hours.into_iter().filter(|h| *h < 24));
        }
        Self { hours }
    }

    /// Allow `hours` on `weekday`
    pub fn with_day(mut self, weekday: Weekday, hours: impl IntoIterator<Item = u32>) -> Self {
        self.hours
            .entry(weekday.number_from_sunday())
            .or_default()
            .extend(hours);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    /// Whether the local wall time is inside an allowed hour
    pub fn allows(&self, local: NaiveDateTime) -> bool {
        if self.hours.is_empty() {
            return true;
        }
        let day = local.weekday().number_from_sunday();
        self.hours
            .get(&day)
            .is_some_and(|hours| hours.contains(&local.hour()))
    }
}

fn parse_day_key(key: &str) -> Option<u32> {
    match key.trim().parse::<u32>().ok()? {
        8 => Some(1),
        day @ 1..=7 => Some(day),
        _ => None,
    }
}

/// Latitude/longitude in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Fixed-point coordinates used by the polygon test
    pub fn to_fixed(self) -> (i64, i64) {
        (
            (self.latitude * GEO_SCALE) as i64,
            (self.longitude * GEO_SCALE) as i64,
        )
    }
}

/// Closed polygon in fixed-point coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    vertices: Vec<(i64, i64)>,
}

impl Polygon {
    /// Build a polygon, closing it by repeating the first vertex
    ///
    /// Returns `None` for an empty vertex list.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        let mut vertices: Vec<(i64, i64)> = points.iter().map(|p| p.to_fixed()).collect();
        let first = *vertices.first()?;
        vertices.push(first);
        Some(Self { vertices })
    }

    pub fn vertices(&self) -> &[(i64, i64)] {
        &self.vertices
    }

    /// Even-odd crossing test
    ///
    /// Degenerate shapes (a single point, a line) contain nothing.
    pub fn contains(&self, point: (i64, i64)) -> bool {
        let (px, py) = (point.0 as i128, point.1 as i128);
        let mut inside = false;

        for edge in self.vertices.windows(2) {
            let (ax, ay) = (edge[0].0 as i128, edge[0].1 as i128);
            let (bx, by) = (edge[1].0 as i128, edge[1].1 as i128);

            if (ay > py) == (by > py) {
                continue;
            }

            // px < ax + (py - ay) * (bx - ax) / (by - ay), without dividing
            let lhs = (px - ax) * (by - ay);
            let rhs = (py - ay) * (bx - ax);
            let crosses = if by > ay { lhs < rhs } else { lhs > rhs };
            if crosses {
                inside = !inside;
            }
        }

        inside
    }
}

/// Set of polygons; the device must be inside at least one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoFence {
    polygons: Vec<Polygon>,
}

impl GeoFence {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Whether an item with this fence may play at `location`
    ///
    /// An unknown location passes.
    pub fn allows(&self, location: Option<GeoPoint>) -> bool {
        if self.polygons.is_empty() {
            return true;
        }
        match location {
            None => true,
            Some(point) => {
                let fixed = point.to_fixed();
                self.polygons.iter().any(|polygon| polygon.contains(fixed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn square() -> Polygon {
        Polygon::from_points(&[
            GeoPoint::new(50.0, 30.0),
            GeoPoint::new(50.0, 31.0),
            GeoPoint::new(51.0, 31.0),
            GeoPoint::new(51.0, 30.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        let start = at(2024, 1, 1, 0);
        let end = at(2024, 1, 31, 0);
        let range = DateRange::new(Some(start), Some(end));

        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(at(2023, 12, 31, 23)));
        assert!(!range.contains(at(2024, 1, 31, 1)));
    }

    #[test]
    fn test_date_range_open_sides() {
        let only_start = DateRange::new(Some(at(2024, 1, 1, 0)), None);
        assert!(only_start.contains(at(2099, 1, 1, 0)));
        assert!(!only_start.contains(at(2023, 1, 1, 0)));

        assert!(DateRange::unbounded().contains(at(1970, 1, 1, 0)));
    }

    #[test]
    fn test_parse_bound() {
        assert_eq!(
            DateRange::parse_bound(Some("2024-01-01 00:00:00")),
            Some(at(2024, 1, 1, 0))
        );
        assert_eq!(DateRange::parse_bound(Some("yesterday")), None);
        assert_eq!(DateRange::parse_bound(Some("")), None);
        assert_eq!(DateRange::parse_bound(None), None);
    }

    #[test]
    fn test_time_targeting_empty_allows_everything() {
        let targeting = TimeTargeting::default();
        assert!(targeting.allows(at(2024, 5, 5, 3)));
    }

    #[test]
    fn test_time_targeting_day_keys() {
        // 2024-05-05 is a Sunday, 2024-05-06 a Monday
        let targeting =
            TimeTargeting::from_day_keys(vec![("1".to_string(), vec![9, 10]), ("2".to_string(), vec![])]);

        assert!(targeting.allows(at(2024, 5, 5, 9)));
        assert!(!targeting.allows(at(2024, 5, 5, 11)));
        assert!(!targeting.allows(at(2024, 5, 6, 9)));
        // Tuesday is not listed at all
        assert!(!targeting.allows(at(2024, 5, 7, 9)));
    }

    #[test]
    fn test_time_targeting_eight_is_sunday() {
        let targeting = TimeTargeting::from_day_keys(vec![("8".to_string(), vec![12])]);
        assert!(targeting.allows(at(2024, 5, 5, 12)));
    }

    #[test]
    fn test_polygon_contains() {
        let polygon = square();
        assert!(polygon.contains(GeoPoint::new(50.5, 30.5).to_fixed()));
        assert!(!polygon.contains(GeoPoint::new(52.0, 30.5).to_fixed()));
        assert!(!polygon.contains(GeoPoint::new(50.5, 29.0).to_fixed()));
    }

    #[test]
    fn test_polygon_is_closed_on_build() {
        let polygon = square();
        assert_eq!(polygon.vertices().len(), 5);
        assert_eq!(polygon.vertices().first(), polygon.vertices().last());
    }

    #[test]
    fn test_degenerate_polygon_does_not_panic() {
        let point = Polygon::from_points(&[GeoPoint::new(50.0, 30.0)]).unwrap();
        assert!(!point.contains(GeoPoint::new(50.0, 30.0).to_fixed()));

        let line =
            Polygon::from_points(&[GeoPoint::new(50.0, 30.0), GeoPoint::new(51.0, 30.0)]).unwrap();
        assert!(!line.contains(GeoPoint::new(50.5, 30.0).to_fixed()));

        assert!(Polygon::from_points(&[]).is_none());
    }

    #[test]
    fn test_geofence_rejects_outside_point() {
        let fence = GeoFence::new(vec![square()]);
        assert!(fence.allows(Some(GeoPoint::new(50.5, 30.5))));
        assert!(!fence.allows(Some(GeoPoint::new(10.0, 10.0))));
        // Unknown location is treated as a pass
        assert!(fence.allows(None));
        assert!(GeoFence::default().allows(Some(GeoPoint::new(10.0, 10.0))));
    }
}
