//! Observation records and their unvalidated inputs.
//!
//! Every record type comes in two shapes:
//!
//! - a `New*` input, deserialized from an external caller, with optional and
//!   string-typed fields exactly as they arrived;
//! - the stored record, produced by `validate`, with parsed timestamps and an
//!   identity assigned by the store.
//!
//! Stored records are immutable once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RoadSurfaceObservedId, SurfacePredictionId, TrafficFlowObservedId};
use crate::validation::{
    ValidationError, check_non_negative, check_probability, optional_timestamp, require_timestamp,
};

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in decimal degrees, `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in decimal degrees, `[-180, 180]`.
    pub longitude: f64,
}

impl Position {
    /// Create a position from latitude and longitude.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject non-finite or out-of-range coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] naming the offending axis.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::OutOfRange {
                field: "latitude",
                value: self.latitude,
            });
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::OutOfRange {
                field: "longitude",
                value: self.longitude,
            });
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Traffic flow
// ---------------------------------------------------------------------------

/// A traffic-flow observation as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewTrafficFlowObserved {
    /// Observation instant (RFC3339). Mandatory.
    pub date_observed: Option<String>,
    /// Start of the observation window (RFC3339).
    pub date_observed_from: Option<String>,
    /// End of the observation window (RFC3339).
    pub date_observed_to: Option<String>,
    /// Where the flow was measured.
    pub location: Option<Position>,
    /// Lane the counter covers.
    #[serde(rename = "laneID")]
    pub lane_id: u32,
    /// Number of vehicles counted.
    pub intensity: u32,
    /// Mean vehicle speed in km/h.
    pub average_vehicle_speed: f64,
    /// Road segment the counter is attached to.
    pub ref_road_segment: Option<String>,
}

impl NewTrafficFlowObserved {
    /// Create an input with the given observation time, lane and intensity.
    pub fn new(date_observed: &str, lane_id: u32, intensity: u32) -> Self {
        Self {
            date_observed: Some(date_observed.to_owned()),
            lane_id,
            intensity,
            ..Self::default()
        }
    }

    /// Validate the input and turn it into a stored record with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `date_observed` is missing or
    /// unparsable, an interval bound is unparsable or inverted, the location
    /// is out of range, or the average speed is negative.
    pub fn validate(self, id: TrafficFlowObservedId) -> Result<TrafficFlowObserved, ValidationError> {
        let date_observed = require_timestamp("dateObserved", self.date_observed.as_deref())?;
        let date_observed_from =
            optional_timestamp("dateObservedFrom", self.date_observed_from.as_deref())?;
        let date_observed_to =
            optional_timestamp("dateObservedTo", self.date_observed_to.as_deref())?;

        if let (Some(from), Some(to)) = (date_observed_from, date_observed_to)
            && to < from
        {
            return Err(ValidationError::InvertedInterval { from, to });
        }

        let location = self.location.map(Position::validate).transpose()?;
        let average_vehicle_speed =
            check_non_negative("averageVehicleSpeed", self.average_vehicle_speed)?;

        Ok(TrafficFlowObserved {
            id,
            date_observed,
            date_observed_from,
            date_observed_to,
            location,
            lane_id: self.lane_id,
            intensity: self.intensity,
            average_vehicle_speed,
            ref_road_segment: self.ref_road_segment.filter(|s| !s.is_empty()),
        })
    }
}

/// A stored traffic-flow observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficFlowObserved {
    /// Store-assigned identity.
    pub id: TrafficFlowObservedId,
    /// Observation instant; the ordering key for queries.
    pub date_observed: DateTime<Utc>,
    /// Start of the observation window.
    pub date_observed_from: Option<DateTime<Utc>>,
    /// End of the observation window.
    pub date_observed_to: Option<DateTime<Utc>>,
    /// Where the flow was measured.
    pub location: Option<Position>,
    /// Lane the counter covers.
    #[serde(rename = "laneID")]
    pub lane_id: u32,
    /// Number of vehicles counted.
    pub intensity: u32,
    /// Mean vehicle speed in km/h.
    pub average_vehicle_speed: f64,
    /// Road segment the counter is attached to.
    pub ref_road_segment: Option<String>,
}

// ---------------------------------------------------------------------------
// Road surface
// ---------------------------------------------------------------------------

/// A road-surface observation as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewRoadSurfaceObserved {
    /// Surface label, e.g. `snow`, `ice`, `gravel`.
    pub surface_type: String,
    /// Confidence in `[0, 100]`.
    pub probability: f64,
    /// Where the surface was observed.
    pub location: Option<Position>,
    /// Observation instant (RFC3339). Mandatory.
    pub date_observed: Option<String>,
    /// Road segment the observation refers to.
    pub ref_road_segment: Option<String>,
}

impl NewRoadSurfaceObserved {
    /// Validate the input and turn it into a stored record with `id`.
    ///
    /// The surface type is trimmed and lower-cased.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the surface type, location or
    /// timestamp is missing, or any numeric field is out of range.
    pub fn validate(self, id: RoadSurfaceObservedId) -> Result<RoadSurfaceObserved, ValidationError> {
        let surface_type = normalize_surface_type(&self.surface_type);
        if surface_type.is_empty() {
            return Err(ValidationError::MissingField("surfaceType"));
        }
        let probability = check_probability(self.probability)?;
        let location = self
            .location
            .ok_or(ValidationError::MissingField("location"))?
            .validate()?;
        let date_observed = require_timestamp("dateObserved", self.date_observed.as_deref())?;

        Ok(RoadSurfaceObserved {
            id,
            surface_type,
            probability,
            location,
            date_observed,
            ref_road_segment: self.ref_road_segment.filter(|s| !s.is_empty()),
        })
    }
}

/// A stored road-surface observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadSurfaceObserved {
    /// Store-assigned identity.
    pub id: RoadSurfaceObservedId,
    /// Lower-cased surface label.
    pub surface_type: String,
    /// Confidence in `[0, 100]`.
    pub probability: f64,
    /// Where the surface was observed.
    pub location: Position,
    /// Observation instant.
    pub date_observed: DateTime<Utc>,
    /// Road segment the observation refers to.
    pub ref_road_segment: Option<String>,
}

// ---------------------------------------------------------------------------
// Surface prediction history
// ---------------------------------------------------------------------------

/// One immutable entry in a segment's durable surface history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfacePrediction {
    /// History entry identity.
    pub id: SurfacePredictionId,
    /// Segment the prediction applies to.
    pub segment_id: String,
    /// Lower-cased surface label.
    pub surface_type: String,
    /// Confidence in `[0, 100]`.
    pub probability: f64,
    /// When the surface was observed.
    pub timestamp: DateTime<Utc>,
}

impl SurfacePrediction {
    /// Create a new history entry with a fresh identity.
    pub fn new(segment_id: &str, surface_type: &str, probability: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: SurfacePredictionId::new(),
            segment_id: segment_id.to_owned(),
            surface_type: surface_type.to_owned(),
            probability,
            timestamp,
        }
    }
}

/// Canonical form of a surface label: trimmed and lower-cased.
pub fn normalize_surface_type(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn traffic_flow_requires_date_observed() {
        let input = NewTrafficFlowObserved {
            lane_id: 1,
            intensity: 8,
            average_vehicle_speed: 17.3,
            ..NewTrafficFlowObserved::default()
        };
        let result = input.validate(TrafficFlowObservedId::new());
        assert_eq!(result, Err(ValidationError::MissingField("dateObserved")));
    }

    #[test]
    fn traffic_flow_keeps_fields() {
        let id = TrafficFlowObservedId::new();
        let mut input = NewTrafficFlowObserved::new("2016-12-07T11:10:00.000Z", 1, 127);
        input.location = Some(Position::new(62.389109, 17.310863));
        input.ref_road_segment = Some(String::new());

        let record = input.validate(id).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.lane_id, 1);
        assert_eq!(record.intensity, 127);
        assert_eq!(record.ref_road_segment, None);
        assert_eq!(record.date_observed.to_rfc3339(), "2016-12-07T11:10:00+00:00");
    }

    #[test]
    fn inverted_interval_is_rejected() {
        let mut input = NewTrafficFlowObserved::new("2016-12-07T11:10:00Z", 0, 0);
        input.date_observed_from = Some("2016-12-07T11:15:00Z".to_owned());
        input.date_observed_to = Some("2016-12-07T11:10:00Z".to_owned());
        let result = input.validate(TrafficFlowObservedId::new());
        assert!(matches!(result, Err(ValidationError::InvertedInterval { .. })));
    }

    #[test]
    fn traffic_flow_deserializes_camel_case() {
        let json = r#"{"dateObserved":"2016-12-07T11:10:00Z","laneID":2,"intensity":8,"averageVehicleSpeed":17.3}"#;
        let input: NewTrafficFlowObserved = serde_json::from_str(json).unwrap();
        assert_eq!(input.lane_id, 2);
        assert_eq!(input.intensity, 8);
        assert!(input.validate(TrafficFlowObservedId::new()).is_ok());
    }

    #[test]
    fn road_surface_is_normalized() {
        let input = NewRoadSurfaceObserved {
            surface_type: "  Snow ".to_owned(),
            probability: 75.0,
            location: Some(Position::new(62.2, 17.0)),
            date_observed: Some("2021-01-01T08:00:00Z".to_owned()),
            ref_road_segment: None,
        };
        let record = input.validate(RoadSurfaceObservedId::new()).unwrap();
        assert_eq!(record.surface_type, "snow");
    }

    #[test]
    fn road_surface_rejects_bad_probability_and_position() {
        let base = NewRoadSurfaceObserved {
            surface_type: "ice".to_owned(),
            probability: 50.0,
            location: Some(Position::new(62.2, 17.0)),
            date_observed: Some("2021-01-01T08:00:00Z".to_owned()),
            ref_road_segment: None,
        };

        let mut too_sure = base.clone();
        too_sure.probability = 120.0;
        assert!(too_sure.validate(RoadSurfaceObservedId::new()).is_err());

        let mut off_planet = base.clone();
        off_planet.location = Some(Position::new(95.0, 17.0));
        assert!(off_planet.validate(RoadSurfaceObservedId::new()).is_err());

        let mut nowhere = base;
        nowhere.location = None;
        assert_eq!(
            nowhere.validate(RoadSurfaceObservedId::new()),
            Err(ValidationError::MissingField("location"))
        );
    }
}
