//! In-memory persistence backend.
//!
//! Used when no database URL is configured and throughout the test suites.
//! Ordering and tie-breaking match the `PostgreSQL` stores exactly: each
//! insert takes the next sequence number, and the sequence plays the role of
//! the `seq` column.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use roadwatch_types::{RoadSurfaceObserved, SurfacePrediction, TrafficFlowObserved};

/// Time-ordered key: the reversed sequence makes a descending walk yield the
/// earlier insert first among equal timestamps.
type TimeKey = (DateTime<Utc>, Reverse<u64>);

#[derive(Debug, Default)]
struct MemoryState {
    next_seq: u64,
    predictions: Vec<SurfacePrediction>,
    traffic_flows: BTreeMap<TimeKey, TrafficFlowObserved>,
    road_surfaces: BTreeMap<TimeKey, RoadSurfaceObserved>,
}

impl MemoryState {
    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        seq
    }
}

/// Process-local store with the same semantics as the `PostgreSQL` backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a surface prediction.
    pub fn append_surface_prediction(&self, prediction: SurfacePrediction) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.predictions.push(prediction);
    }

    /// History for one segment, oldest observation first.
    pub fn surface_history(&self, segment_id: &str) -> Vec<SurfacePrediction> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut history: Vec<SurfacePrediction> = state
            .predictions
            .iter()
            .filter(|p| p.segment_id == segment_id)
            .cloned()
            .collect();
        history.sort_by_key(|p| p.timestamp);
        history
    }

    /// The most recent prediction per segment, ordered by segment id.
    pub fn latest_surface_predictions(&self) -> Vec<SurfacePrediction> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut latest: BTreeMap<&str, &SurfacePrediction> = BTreeMap::new();
        for p in &state.predictions {
            let newer = latest
                .get(p.segment_id.as_str())
                .is_none_or(|current| p.timestamp >= current.timestamp);
            if newer {
                latest.insert(p.segment_id.as_str(), p);
            }
        }
        latest.into_values().cloned().collect()
    }

    /// Append a traffic-flow observation.
    pub fn insert_traffic_flow(&self, record: TrafficFlowObserved) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let key = (record.date_observed, Reverse(state.take_seq()));
        state.traffic_flows.insert(key, record);
    }

    /// Observations with `from <= date_observed <= to`, newest first.
    pub fn query_traffic_flows(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Vec<TrafficFlowObserved> {
        if from > to {
            return Vec::new();
        }
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .traffic_flows
            .range((from, Reverse(u64::MAX))..=(to, Reverse(0)))
            .rev()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Append a road-surface observation.
    pub fn insert_road_surface(&self, record: RoadSurfaceObserved) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let key = (record.date_observed, Reverse(state.take_seq()));
        state.road_surfaces.insert(key, record);
    }

    /// The `limit` most recent road-surface observations.
    pub fn road_surfaces(&self, limit: usize) -> Vec<RoadSurfaceObserved> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .road_surfaces
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }
}
