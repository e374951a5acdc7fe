//! The road network: every seeded road and segment, indexed for spatial
//! queries.
//!
//! Two hierarchies are kept, one over segment boxes and one over road boxes.
//! Both are built once in [`RoadNetwork::build`] and never restructured; only
//! the surface state inside each segment changes afterwards. Query results
//! come back in seed order.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::io::BufRead;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::bvh::Bvh;
use crate::distance;
use crate::error::NetworkError;
use crate::geometry::{Point, Rectangle};
use crate::road::{ApplyOutcome, Road, RoadSegment};
use crate::seed::{self, SeedRecord};

/// Spatial index over roads and segments.
#[derive(Debug, Default)]
pub struct RoadNetwork {
    segments: Vec<RoadSegment>,
    roads: Vec<Road>,
    segments_by_id: BTreeMap<String, usize>,
    roads_by_id: BTreeMap<String, usize>,
    segment_tree: Bvh,
    road_tree: Bvh,
}

impl RoadNetwork {
    /// A network with no roads.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the network from parsed seed records.
    ///
    /// Records sharing a road identity extend that road's segment list in
    /// the order they appear.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid polyline or repeated segment identity.
    pub fn build(records: Vec<SeedRecord>) -> Result<Self, NetworkError> {
        let mut network = Self::default();

        for record in records {
            let SeedRecord {
                road_id,
                segment_id,
                points,
            } = record;

            let index = network.segments.len();
            match network.segments_by_id.entry(segment_id.clone()) {
                Entry::Occupied(_) => return Err(NetworkError::DuplicateSegment(segment_id)),
                Entry::Vacant(slot) => {
                    slot.insert(index);
                }
            }
            let segment = RoadSegment::new(&segment_id, &road_id, points)?;

            match network.roads_by_id.get(&road_id) {
                Some(&r) => {
                    if let Some(road) = network.roads.get_mut(r) {
                        road.push_segment(&segment, index);
                    }
                }
                None => {
                    network.roads_by_id.insert(road_id.clone(), network.roads.len());
                    network.roads.push(Road::new(&road_id, &segment, index));
                }
            }
            network.segments.push(segment);
        }

        let segment_boxes: Vec<_> = network.segments.iter().map(|s| *s.bounding_box()).collect();
        let road_boxes: Vec<_> = network.roads.iter().map(|r| *r.bounding_box()).collect();
        network.segment_tree = Bvh::build(&segment_boxes);
        network.road_tree = Bvh::build(&road_boxes);

        info!(
            roads = network.roads.len(),
            segments = network.segments.len(),
            depth = network.segment_tree.depth(),
            "road network built"
        );
        Ok(network)
    }

    /// Parse a seed source and build the network from it.
    ///
    /// # Errors
    ///
    /// Returns the first seed or construction error.
    pub fn from_seed(reader: impl BufRead) -> Result<Self, NetworkError> {
        Self::build(seed::parse_seed(reader)?)
    }

    /// Number of distinct roads.
    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Every road, in seed order.
    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    /// Every segment, in seed order.
    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }

    /// Look up a road.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::RoadNotFound`] for an unknown id.
    pub fn road_by_id(&self, id: &str) -> Result<&Road, NetworkError> {
        self.roads_by_id
            .get(id)
            .and_then(|&i| self.roads.get(i))
            .ok_or_else(|| NetworkError::RoadNotFound(id.to_owned()))
    }

    /// Look up a segment.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::SegmentNotFound`] for an unknown id.
    pub fn segment_by_id(&self, id: &str) -> Result<&RoadSegment, NetworkError> {
        self.segments_by_id
            .get(id)
            .and_then(|&i| self.segments.get(i))
            .ok_or_else(|| NetworkError::SegmentNotFound(id.to_owned()))
    }

    /// The segments of `road`, in seed order.
    pub fn segments_of<'a>(&'a self, road: &'a Road) -> impl Iterator<Item = &'a RoadSegment> + 'a {
        road.segment_indices.iter().filter_map(|&i| self.segments.get(i))
    }

    /// Segments whose bounding box overlaps `rect`.
    pub fn segments_within_rect(&self, rect: &Rectangle) -> Vec<&RoadSegment> {
        self.segment_tree
            .query(&rect.bounding_box())
            .into_iter()
            .filter_map(|i| self.segments.get(i))
            .collect()
    }

    /// Segments whose polyline passes within `radius_meters` of `point`.
    ///
    /// A negative or non-finite radius, or an invalid point, matches nothing.
    pub fn segments_near_point(&self, point: Point, radius_meters: f64) -> Vec<&RoadSegment> {
        if !is_searchable(point, radius_meters) {
            return Vec::new();
        }
        let candidates = self
            .segment_tree
            .query_any(&distance::search_boxes(point, radius_meters));
        debug!(candidates = candidates.len(), radius_meters, "segment proximity prune");

        candidates
            .into_iter()
            .filter_map(|i| self.segments.get(i))
            .filter(|s| s.distance_to(point) <= radius_meters)
            .collect()
    }

    /// Roads whose aggregate bounding box overlaps `rect`.
    pub fn roads_within_rect(&self, rect: &Rectangle) -> Vec<&Road> {
        self.road_tree
            .query(&rect.bounding_box())
            .into_iter()
            .filter_map(|i| self.roads.get(i))
            .collect()
    }

    /// Roads with at least one segment within `radius_meters` of `point`.
    pub fn roads_near_point(&self, point: Point, radius_meters: f64) -> Vec<&Road> {
        if !is_searchable(point, radius_meters) {
            return Vec::new();
        }
        let search = distance::search_boxes(point, radius_meters);

        self.road_tree
            .query_any(&search)
            .into_iter()
            .filter_map(|i| self.roads.get(i))
            .filter(|road| {
                self.segments_of(road).any(|s| {
                    search.iter().any(|b| s.bounding_box().intersects(b))
                        && s.distance_to(point) <= radius_meters
                })
            })
            .collect()
    }

    /// Apply a surface observation to one segment in memory.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::SegmentNotFound`] for an unknown id.
    pub fn apply_surface_observation(
        &self,
        segment_id: &str,
        surface_type: &str,
        probability: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<ApplyOutcome, NetworkError> {
        let segment = self.segment_by_id(segment_id)?;
        Ok(segment.apply_surface(surface_type, probability, observed_at))
    }
}

fn is_searchable(point: Point, radius_meters: f64) -> bool {
    point.is_valid() && radius_meters.is_finite() && radius_meters >= 0.0
}
