//! The store interface exposed to collaborators.
//!
//! A [`Datastore`] owns the in-memory [`RoadNetwork`] and a handle to the
//! durable [`Persistence`] backend. Spatial reads go straight to the
//! network. Writes that must survive a restart go to the backend first and
//! only then touch memory, so nothing is ever visible without being durable.

use chrono::{DateTime, Utc};
use roadwatch_db::Persistence;
use roadwatch_geo::{ApplyOutcome, Point, Rectangle, Road, RoadNetwork, RoadSegment, order_by_recency};
use roadwatch_types::validation::check_probability;
use roadwatch_types::{
    NewRoadSurfaceObserved, NewTrafficFlowObserved, RoadSurfaceObserved, RoadSurfaceObservedId,
    SurfacePrediction, TrafficFlowObserved, TrafficFlowObservedId, ValidationError,
    normalize_surface_type,
};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::page::Page;

/// Road network plus durable observation storage.
#[derive(Debug)]
pub struct Datastore {
    network: RoadNetwork,
    persistence: Persistence,
}

impl Datastore {
    /// Combine a built network with a persistence backend.
    pub const fn new(network: RoadNetwork, persistence: Persistence) -> Self {
        Self {
            network,
            persistence,
        }
    }

    /// The underlying road network.
    pub const fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// The durable backend.
    pub const fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    // -------------------------------------------------------------------------
    // Spatial reads
    // -------------------------------------------------------------------------

    /// Number of distinct roads.
    pub fn road_count(&self) -> usize {
        self.network.road_count()
    }

    /// Look up a road.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id.
    pub fn road_by_id(&self, id: &str) -> Result<&Road, StoreError> {
        Ok(self.network.road_by_id(id)?)
    }

    /// Look up a segment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id.
    pub fn segment_by_id(&self, id: &str) -> Result<&RoadSegment, StoreError> {
        Ok(self.network.segment_by_id(id)?)
    }

    /// Segments of a road, in seed order.
    pub fn segments_of<'a>(&'a self, road: &'a Road) -> impl Iterator<Item = &'a RoadSegment> + 'a {
        self.network.segments_of(road)
    }

    /// Segments within `radius_meters` of (`lat`, `lon`).
    pub fn segments_near_point(&self, lat: f64, lon: f64, radius_meters: f64) -> Vec<&RoadSegment> {
        self.network
            .segments_near_point(Point::new(lat, lon), radius_meters)
    }

    /// Segments whose box overlaps the rectangle spanned by the two corners.
    pub fn segments_within_rect(&self, lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> Vec<&RoadSegment> {
        self.network
            .segments_within_rect(&Rectangle::new(Point::new(lat0, lon0), Point::new(lat1, lon1)))
    }

    /// Roads with a segment within `radius_meters` of (`lat`, `lon`).
    pub fn roads_near_point(&self, lat: f64, lon: f64, radius_meters: f64) -> Vec<&Road> {
        self.network.roads_near_point(Point::new(lat, lon), radius_meters)
    }

    /// Roads whose box overlaps the rectangle spanned by the two corners.
    pub fn roads_within_rect(&self, lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> Vec<&Road> {
        self.network
            .roads_within_rect(&Rectangle::new(Point::new(lat0, lon0), Point::new(lat1, lon1)))
    }

    /// Order `segments` most recently modified first and cut out `page`.
    pub fn recent_segments<'a>(mut segments: Vec<&'a RoadSegment>, page: Page) -> Vec<&'a RoadSegment> {
        order_by_recency(&mut segments);
        page.apply(segments)
    }

    /// Every segment, most recently modified first, windowed by `page`.
    pub fn all_segments(&self, page: Page) -> Vec<&RoadSegment> {
        Self::recent_segments(self.network.segments().iter().collect(), page)
    }

    /// Every road in seed order, windowed by `page`.
    pub fn all_roads(&self, page: Page) -> Vec<&Road> {
        page.apply(self.network.roads().iter().collect())
    }

    // -------------------------------------------------------------------------
    // Surface state
    // -------------------------------------------------------------------------

    /// Apply an already-durable surface observation to memory.
    ///
    /// An observation older than the segment's current one is ignored and
    /// reported as [`ApplyOutcome::Stale`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown segment.
    pub fn apply_surface_observation(
        &self,
        segment_id: &str,
        surface_type: &str,
        probability: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<ApplyOutcome, StoreError> {
        let outcome =
            self.network
                .apply_surface_observation(segment_id, surface_type, probability, observed_at)?;
        match outcome {
            ApplyOutcome::Applied => debug!(segment_id, surface_type, %observed_at, "surface applied"),
            ApplyOutcome::Stale => {
                debug!(segment_id, surface_type, %observed_at, "stale surface observation ignored");
            }
        }
        Ok(outcome)
    }

    /// Durably record a surface observation, then apply it to memory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown segment,
    /// [`StoreError::Validation`] for an empty surface type or an
    /// out-of-range probability, and [`StoreError::Persistence`] if the
    /// history append fails (memory is then left untouched).
    pub async fn record_surface_update(
        &self,
        segment_id: &str,
        surface_type: &str,
        probability: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<ApplyOutcome, StoreError> {
        self.network.segment_by_id(segment_id)?;
        let surface_type = normalize_surface_type(surface_type);
        if surface_type.is_empty() {
            return Err(ValidationError::MissingField("surfaceType").into());
        }
        let probability = check_probability(probability)?;

        let prediction = SurfacePrediction::new(segment_id, &surface_type, probability, observed_at);
        self.persistence.append_surface_prediction(&prediction).await?;
        info!(
            segment_id,
            surface_type = %surface_type,
            probability,
            %observed_at,
            "surface update recorded"
        );

        self.apply_surface_observation(segment_id, &surface_type, probability, observed_at)
    }

    /// Durable surface history of one segment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown segment, or
    /// [`StoreError::Persistence`] if the read fails.
    pub async fn surface_history(&self, segment_id: &str) -> Result<Vec<SurfacePrediction>, StoreError> {
        self.network.segment_by_id(segment_id)?;
        Ok(self.persistence.surface_history(segment_id).await?)
    }

    /// Apply the latest durable prediction of every segment to memory.
    ///
    /// Returns how many segments were restored. Predictions for segments
    /// that are no longer seeded are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the read fails.
    pub async fn restore_surface_state(&self) -> Result<usize, StoreError> {
        let latest = self.persistence.latest_surface_predictions().await?;
        let mut restored: usize = 0;
        for p in &latest {
            match self.network.apply_surface_observation(
                &p.segment_id,
                &p.surface_type,
                p.probability,
                p.timestamp,
            ) {
                Ok(ApplyOutcome::Applied) => restored = restored.saturating_add(1),
                Ok(ApplyOutcome::Stale) => {}
                Err(e) => warn!(segment_id = %p.segment_id, error = %e, "skipping surface history"),
            }
        }
        info!(restored, available = latest.len(), "surface state restored");
        Ok(restored)
    }

    // -------------------------------------------------------------------------
    // Observation logs
    // -------------------------------------------------------------------------

    /// Validate and store a traffic-flow observation under a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if the record is invalid (nothing
    /// is stored), or [`StoreError::Persistence`] if the write fails.
    pub async fn create_traffic_flow_observed(
        &self,
        input: NewTrafficFlowObserved,
    ) -> Result<TrafficFlowObserved, StoreError> {
        let record = input.validate(TrafficFlowObservedId::new())?;
        self.persistence.insert_traffic_flow(&record).await?;
        debug!(id = %record.id, date_observed = %record.date_observed, "traffic flow stored");
        Ok(record)
    }

    /// Traffic-flow observations with `from <= observed <= to`, newest
    /// first, at most `limit`.
    ///
    /// Pass `DateTime::<Utc>::MIN_UTC` / `MAX_UTC` for an open bound.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the read fails.
    pub async fn query_traffic_flow_observed(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TrafficFlowObserved>, StoreError> {
        if from > to || limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.persistence.query_traffic_flows(from, to, limit).await?)
    }

    /// Validate and store a road-surface observation under a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if the record is invalid, or
    /// [`StoreError::Persistence`] if the write fails.
    pub async fn create_road_surface_observed(
        &self,
        input: NewRoadSurfaceObserved,
    ) -> Result<RoadSurfaceObserved, StoreError> {
        let record = input.validate(RoadSurfaceObservedId::new())?;
        self.persistence.insert_road_surface(&record).await?;
        debug!(id = %record.id, surface_type = %record.surface_type, "road surface stored");
        Ok(record)
    }

    /// The `limit` most recent road-surface observations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the read fails.
    pub async fn road_surfaces_observed(&self, limit: usize) -> Result<Vec<RoadSurfaceObserved>, StoreError> {
        Ok(self.persistence.road_surfaces(limit).await?)
    }
}
