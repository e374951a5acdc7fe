//! Message payloads exchanged over the bus by the replica convergence
//! protocol.
//!
//! Timestamps travel as RFC3339 strings and are parsed by the receiving
//! handler, so a malformed timestamp is distinguishable from a malformed
//! payload.
//!
//! - [`UpdateRoadSegmentSurface`] -- command, addressed to the service itself,
//!   handled by exactly one replica which makes the write durable.
//! - [`RoadSegmentSurfaceUpdated`] -- event, broadcast to every replica after
//!   the durable write succeeded.
//! - [`CommandReply`] -- answer from the replica that handled a command.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Request to make a segment's surface observation durable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoadSegmentSurface {
    /// Segment identity.
    pub id: String,
    /// Lower-cased surface label.
    pub surface_type: String,
    /// Confidence in `[0, 100]`.
    pub probability: f64,
    /// Observation instant, RFC3339 UTC.
    pub timestamp: String,
}

impl UpdateRoadSegmentSurface {
    /// Build a command for `segment_id` observed at `observed_at`.
    ///
    /// The surface type is normalised to lower case.
    pub fn new(
        segment_id: &str,
        surface_type: &str,
        probability: f64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: segment_id.to_owned(),
            surface_type: crate::records::normalize_surface_type(surface_type),
            probability,
            timestamp: format_timestamp(observed_at),
        }
    }
}

/// Notification that a segment's surface observation has been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadSegmentSurfaceUpdated {
    /// Segment identity.
    pub id: String,
    /// Lower-cased surface label.
    pub surface_type: String,
    /// Confidence in `[0, 100]`.
    pub probability: f64,
    /// Observation instant carried over from the command, RFC3339 UTC.
    pub timestamp: String,
    /// When the committing replica made the write durable, RFC3339 UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<String>,
}

impl RoadSegmentSurfaceUpdated {
    /// Derive the event for a committed command, stamped with `applied_at`.
    pub fn committed(command: &UpdateRoadSegmentSurface, applied_at: DateTime<Utc>) -> Self {
        Self {
            id: command.id.clone(),
            surface_type: command.surface_type.clone(),
            probability: command.probability,
            timestamp: command.timestamp.clone(),
            applied_at: Some(format_timestamp(applied_at)),
        }
    }
}

/// Outcome of a command, sent back to whoever issued it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    /// Whether the command was committed.
    pub ok: bool,
    /// Failure description when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandReply {
    /// A successful reply.
    pub const fn committed() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    /// A failed reply carrying `reason`.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(reason.into()),
        }
    }
}

/// Format an instant the way every payload carries it: RFC3339, UTC, `Z`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn command_wire_format_is_camel_case() {
        let ts = Utc.with_ymd_and_hms(2021, 2, 3, 4, 5, 6).unwrap();
        let cmd = UpdateRoadSegmentSurface::new("seg-1", "Snow", 75.0, ts);
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "seg-1",
                "surfaceType": "snow",
                "probability": 75.0,
                "timestamp": "2021-02-03T04:05:06Z"
            })
        );
    }

    #[test]
    fn event_without_applied_at_decodes() {
        let json = r#"{"id":"s","surfaceType":"ice","probability":10.0,"timestamp":"2021-02-03T04:05:06Z"}"#;
        let evt: RoadSegmentSurfaceUpdated = serde_json::from_str(json).unwrap();
        assert_eq!(evt.applied_at, None);
        assert_eq!(evt.surface_type, "ice");
    }

    #[test]
    fn committed_event_keeps_observation_time() {
        let observed = Utc.with_ymd_and_hms(2021, 2, 3, 4, 5, 6).unwrap();
        let applied = Utc.with_ymd_and_hms(2021, 2, 3, 4, 5, 9).unwrap();
        let cmd = UpdateRoadSegmentSurface::new("seg-1", "gravel", 60.0, observed);
        let evt = RoadSegmentSurfaceUpdated::committed(&cmd, applied);
        assert_eq!(evt.timestamp, cmd.timestamp);
        assert_eq!(evt.applied_at.as_deref(), Some("2021-02-03T04:05:09Z"));
    }
}
