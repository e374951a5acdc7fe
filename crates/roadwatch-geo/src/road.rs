//! Roads, road segments, and per-segment surface state.
//!
//! Geometry is fixed when a segment is created; only the surface state
//! (type, probability, last-modified) changes afterwards. That triple lives
//! behind a per-segment [`RwLock`] so concurrent event handlers and readers
//! always see a consistent snapshot, while geometry reads need no lock at all.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::distance;
use crate::error::NetworkError;
use crate::geometry::{BoundingBox, Point};

/// Surface label a segment carries until its first update.
pub const UNKNOWN_SURFACE: &str = "unknown";

/// Snapshot of a segment's surface condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceState {
    /// Surface label.
    pub surface_type: String,
    /// Confidence in `[0, 100]`.
    pub probability: f64,
    /// Timestamp of the observation currently applied; `None` until the
    /// first update.
    pub date_modified: Option<DateTime<Utc>>,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            surface_type: UNKNOWN_SURFACE.to_owned(),
            probability: 0.0,
            date_modified: None,
        }
    }
}

/// Result of applying a surface observation to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The observation replaced the segment's surface state.
    Applied,
    /// The observation was older than the segment's current state and was
    /// ignored.
    Stale,
}

/// One seeded road segment.
#[derive(Debug)]
pub struct RoadSegment {
    id: String,
    road_id: String,
    points: Vec<Point>,
    bbox: BoundingBox,
    surface: RwLock<SurfaceState>,
}

impl RoadSegment {
    /// Create a segment from its polyline.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::TooFewPoints`] for fewer than two points, or
    /// [`NetworkError::InvalidCoordinate`] for a non-finite or out-of-range
    /// coordinate.
    pub fn new(id: &str, road_id: &str, points: Vec<Point>) -> Result<Self, NetworkError> {
        if let Some(bad) = points.iter().find(|p| !p.is_valid()) {
            return Err(NetworkError::InvalidCoordinate {
                segment: id.to_owned(),
                lat: bad.lat,
                lon: bad.lon,
            });
        }
        let bbox = match BoundingBox::from_points(&points) {
            Some(bbox) if points.len() >= 2 => bbox,
            _ => return Err(NetworkError::TooFewPoints(id.to_owned())),
        };

        Ok(Self {
            id: id.to_owned(),
            road_id: road_id.to_owned(),
            points,
            bbox,
            surface: RwLock::new(SurfaceState::default()),
        })
    }

    /// Segment identity.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identity of the road this segment belongs to.
    pub fn road_id(&self) -> &str {
        &self.road_id
    }

    /// The polyline, in seed order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The polyline as `[lon, lat]` pairs, the order `GeoJSON` expects.
    pub fn coordinates(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| [p.lon, p.lat]).collect()
    }

    /// The box enclosing the polyline.
    pub const fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Minimum geodesic distance in metres from `point` to the polyline.
    pub fn distance_to(&self, point: Point) -> f64 {
        distance::distance_to_polyline(point, &self.points)
    }

    /// A consistent copy of the current surface state.
    pub fn surface(&self) -> SurfaceState {
        self.surface
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current surface label and probability.
    pub fn surface_type(&self) -> (String, f64) {
        let state = self.surface();
        (state.surface_type, state.probability)
    }

    /// Timestamp of the observation currently applied.
    pub fn date_modified(&self) -> Option<DateTime<Utc>> {
        self.surface
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .date_modified
    }

    /// Replace the surface state unless `observed_at` is older than the
    /// state already applied.
    ///
    /// An observation with the same timestamp as the current one replaces it.
    pub fn apply_surface(
        &self,
        surface_type: &str,
        probability: f64,
        observed_at: DateTime<Utc>,
    ) -> ApplyOutcome {
        let mut state = self.surface.write().unwrap_or_else(PoisonError::into_inner);
        if state.date_modified.is_some_and(|current| observed_at < current) {
            return ApplyOutcome::Stale;
        }
        surface_type.clone_into(&mut state.surface_type);
        state.probability = probability;
        state.date_modified = Some(observed_at);
        ApplyOutcome::Applied
    }
}

/// A road: an ordered list of segments sharing one road identity.
#[derive(Debug, Clone)]
pub struct Road {
    id: String,
    segment_ids: Vec<String>,
    pub(crate) segment_indices: Vec<usize>,
    bbox: BoundingBox,
}

impl Road {
    pub(crate) fn new(id: &str, first_segment: &RoadSegment, index: usize) -> Self {
        Self {
            id: id.to_owned(),
            segment_ids: vec![first_segment.id().to_owned()],
            segment_indices: vec![index],
            bbox: *first_segment.bounding_box(),
        }
    }

    pub(crate) fn push_segment(&mut self, segment: &RoadSegment, index: usize) {
        self.segment_ids.push(segment.id().to_owned());
        self.segment_indices.push(index);
        self.bbox = self.bbox.union(segment.bounding_box());
    }

    /// Road identity.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identities of the road's segments, in seed order.
    pub fn segment_ids(&self) -> &[String] {
        &self.segment_ids
    }

    /// The union of the segments' boxes.
    pub const fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }
}

/// Order segments most-recently-modified first.
///
/// Segments that were never modified come last, ordered by identity.
pub fn order_by_recency(segments: &mut [&RoadSegment]) {
    // `None` sorts below any timestamp, so reversing puts it last.
    segments.sort_by_cached_key(|s| (std::cmp::Reverse(s.date_modified()), s.id().to_owned()));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn segment(id: &str) -> RoadSegment {
        RoadSegment::new(
            id,
            "road",
            vec![Point::new(62.389109, 17.310863), Point::new(62.389084, 17.310852)],
        )
        .unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn new_segment_has_unknown_surface() {
        let s = segment("s1");
        assert_eq!(s.surface(), SurfaceState::default());
        assert_eq!(s.date_modified(), None);
    }

    #[test]
    fn rejects_single_point_and_bad_coordinates() {
        let one = RoadSegment::new("s", "r", vec![Point::new(1.0, 1.0)]);
        assert!(matches!(one, Err(NetworkError::TooFewPoints(_))));

        let bad = RoadSegment::new("s", "r", vec![Point::new(1.0, 1.0), Point::new(f64::NAN, 2.0)]);
        assert!(matches!(bad, Err(NetworkError::InvalidCoordinate { .. })));

        let off = RoadSegment::new("s", "r", vec![Point::new(91.0, 1.0), Point::new(1.0, 2.0)]);
        assert!(matches!(off, Err(NetworkError::InvalidCoordinate { .. })));
    }

    #[test]
    fn apply_overwrites_and_ignores_older() {
        let s = segment("s1");
        assert_eq!(s.apply_surface("snow", 75.0, at(10)), ApplyOutcome::Applied);
        assert_eq!(s.apply_surface("tarmac", 85.0, at(9)), ApplyOutcome::Stale);
        assert_eq!(s.surface_type(), ("snow".to_owned(), 75.0));
        assert_eq!(s.apply_surface("ice", 60.0, at(10)), ApplyOutcome::Applied);
        assert_eq!(s.apply_surface("tarmac", 85.0, at(11)), ApplyOutcome::Applied);
        assert_eq!(s.surface_type(), ("tarmac".to_owned(), 85.0));
        assert_eq!(s.date_modified(), Some(at(11)));
    }

    #[test]
    fn concurrent_readers_never_see_a_torn_surface() {
        let s = segment("s1");
        let base = at(0);
        let stamp = |n: u32| base + chrono::TimeDelta::seconds(i64::from(n));

        std::thread::scope(|scope| {
            for writer in 0..4_u32 {
                let s = &s;
                scope.spawn(move || {
                    for k in 0..200 {
                        let n = writer * 1000 + k;
                        s.apply_surface(&format!("s{n}"), f64::from(n % 101), stamp(n));
                    }
                });
            }
            for _ in 0..4 {
                let s = &s;
                scope.spawn(move || {
                    for _ in 0..2000 {
                        let state = s.surface();
                        let Some(modified) = state.date_modified else {
                            assert_eq!(state, SurfaceState::default());
                            continue;
                        };
                        let n = u32::try_from((modified - base).num_seconds()).unwrap();
                        assert_eq!(state.surface_type, format!("s{n}"));
                        assert_eq!(state.probability, f64::from(n % 101));
                    }
                });
            }
        });

        // The newest observation wins whatever the interleaving.
        assert_eq!(s.date_modified(), Some(stamp(3199)));
        assert_eq!(s.surface_type(), ("s3199".to_owned(), f64::from(3199 % 101)));
    }

    #[test]
    fn recency_order_puts_untouched_last() {
        let a = segment("a");
        let b = segment("b");
        let c = segment("c");
        let d = segment("d");
        c.apply_surface("snow", 50.0, at(8));
        b.apply_surface("snow", 50.0, at(12));

        let mut list = vec![&d, &c, &a, &b];
        order_by_recency(&mut list);
        let ids: Vec<&str> = list.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn coordinates_are_lon_lat() {
        let s = segment("s1");
        assert_eq!(s.coordinates().first(), Some(&[17.310863, 62.389109]));
    }
}
