//! Command and event handlers of the convergence protocol.
//!
//! A command is committed durably and then announced; an event is applied
//! to the local in-memory network. Neither handler retries.

use chrono::{DateTime, Utc};
use roadwatch_core::Datastore;
use roadwatch_geo::ApplyOutcome;
use roadwatch_types::{
    CommandReply, RoadSegmentSurfaceUpdated, UpdateRoadSegmentSurface, parse_timestamp,
};
use tracing::{info, warn};

use crate::bus::MessageBus;
use crate::error::MessagingError;

/// Handle one encoded [`UpdateRoadSegmentSurface`] command.
///
/// The update is recorded durably through the store; only then is a
/// [`RoadSegmentSurfaceUpdated`] event published. A failure before the
/// durable write is turned into a rejected reply and publishes nothing.
/// Once the write is durable the reply is ok, even if the event cannot be
/// published.
pub async fn handle_command(store: &Datastore, bus: &MessageBus, payload: &[u8]) -> CommandReply {
    let event = match commit(store, payload).await {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "surface command rejected");
            return CommandReply::rejected(e.to_string());
        }
    };

    // Replicas that miss this event catch up on the segment's next update.
    if let Err(e) = bus.publish_event(&event).await {
        warn!(segment_id = %event.id, error = %e, "committed surface update not announced");
    }
    CommandReply::committed()
}

async fn commit(
    store: &Datastore,
    payload: &[u8],
) -> Result<RoadSegmentSurfaceUpdated, MessagingError> {
    let received: UpdateRoadSegmentSurface = serde_json::from_slice(payload)
        .map_err(|e| MessagingError::Decode(format!("failed to decode command: {e}")))?;
    let observed_at = timestamp(&received.timestamp)?;

    // Canonical form: lower-cased type, RFC3339 UTC timestamp.
    let command = UpdateRoadSegmentSurface::new(
        &received.id,
        &received.surface_type,
        received.probability,
        observed_at,
    );
    store
        .record_surface_update(&command.id, &command.surface_type, command.probability, observed_at)
        .await?;

    info!(
        segment_id = %command.id,
        surface_type = %command.surface_type,
        observed_at = %command.timestamp,
        "surface command committed"
    );
    Ok(RoadSegmentSurfaceUpdated::committed(&command, Utc::now()))
}

/// Apply one encoded [`RoadSegmentSurfaceUpdated`] event to the local
/// network.
///
/// # Errors
///
/// Returns [`MessagingError::Decode`] or [`MessagingError::InvalidTimestamp`]
/// for a malformed payload and [`MessagingError::Store`] for an unknown
/// segment or invalid values.
pub fn handle_event(store: &Datastore, payload: &[u8]) -> Result<ApplyOutcome, MessagingError> {
    let event: RoadSegmentSurfaceUpdated = serde_json::from_slice(payload)
        .map_err(|e| MessagingError::Decode(format!("failed to decode event: {e}")))?;
    let observed_at = timestamp(&event.timestamp)?;
    let outcome = store.apply_surface_observation(
        &event.id,
        &event.surface_type,
        event.probability,
        observed_at,
    )?;
    Ok(outcome)
}

fn timestamp(value: &str) -> Result<DateTime<Utc>, MessagingError> {
    parse_timestamp("timestamp", value).map_err(|e| MessagingError::InvalidTimestamp(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use roadwatch_core::config::MessagingConfig;
    use roadwatch_db::Persistence;
    use roadwatch_geo::RoadNetwork;

    use super::*;
    use crate::local::LocalBus;

    const SEED: &str = "r1;s1;62.3900;17.3100;62.3905;17.3110\n";

    fn store() -> Datastore {
        let network = RoadNetwork::from_seed(SEED.as_bytes()).unwrap();
        Datastore::new(network, Persistence::memory())
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 8, minute, 0).unwrap()
    }

    fn encode<T: serde::Serialize>(value: &T) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[tokio::test]
    async fn committed_command_publishes_normalised_event() {
        let ds = store();
        let local = LocalBus::new();
        let bus = MessageBus::local(local.clone(), MessagingConfig::default());
        let mut events = local.subscribe_events();

        let mut command = UpdateRoadSegmentSurface::new("s1", "snow", 75.0, at(0));
        command.surface_type = "SNOW".to_owned();
        let reply = handle_command(&ds, &bus, &encode(&command)).await;
        assert!(reply.ok);

        let event: RoadSegmentSurfaceUpdated =
            serde_json::from_slice(&events.recv().await.unwrap()).unwrap();
        assert_eq!(event.id, "s1");
        assert_eq!(event.surface_type, "snow");
        assert!(event.applied_at.is_some());

        let history = ds.surface_history("s1").await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn unannounced_commit_still_replies_ok() {
        let ds = store();
        // Nobody listens, so the event reaches no replica.
        let bus = MessageBus::local(LocalBus::new(), MessagingConfig::default());

        let command = UpdateRoadSegmentSurface::new("s1", "ice", 30.0, at(2));
        let reply = handle_command(&ds, &bus, &encode(&command)).await;
        assert!(reply.ok);
        assert_eq!(reply.error, None);
        assert_eq!(ds.surface_history("s1").await.unwrap().len(), 1);
        // The committing replica applied it locally without the event.
        assert_eq!(ds.segment_by_id("s1").unwrap().surface_type().0, "ice");
    }

    #[tokio::test]
    async fn failed_command_publishes_nothing() {
        let ds = store();
        let local = LocalBus::new();
        let bus = MessageBus::local(local.clone(), MessagingConfig::default());
        let mut events = local.subscribe_events();

        let command = UpdateRoadSegmentSurface::new("missing", "snow", 75.0, at(0));
        let reply = handle_command(&ds, &bus, &encode(&command)).await;
        assert!(!reply.ok);
        assert!(reply.error.is_some());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn bad_command_timestamp_is_rejected() {
        let ds = store();
        let bus = MessageBus::local(LocalBus::new(), MessagingConfig::default());
        let mut command = UpdateRoadSegmentSurface::new("s1", "snow", 75.0, at(0));
        command.timestamp = "yesterday".to_owned();
        let reply = handle_command(&ds, &bus, &encode(&command)).await;
        assert!(!reply.ok);
        assert!(ds.surface_history("s1").await.unwrap().is_empty());
    }

    #[test]
    fn event_applies_to_memory() {
        let ds = store();
        let command = UpdateRoadSegmentSurface::new("s1", "ice", 40.0, at(5));
        let event = RoadSegmentSurfaceUpdated::committed(&command, at(6));
        let outcome = handle_event(&ds, &encode(&event)).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);

        let segment = ds.segment_by_id("s1").unwrap();
        assert_eq!(segment.surface_type().0, "ice");
        assert_eq!(segment.date_modified(), Some(at(5)));
    }

    #[test]
    fn older_event_is_stale() {
        let ds = store();
        let newer = RoadSegmentSurfaceUpdated::committed(
            &UpdateRoadSegmentSurface::new("s1", "ice", 40.0, at(10)),
            at(10),
        );
        let older = RoadSegmentSurfaceUpdated::committed(
            &UpdateRoadSegmentSurface::new("s1", "dry", 90.0, at(1)),
            at(11),
        );
        handle_event(&ds, &encode(&newer)).unwrap();
        assert_eq!(handle_event(&ds, &encode(&older)).unwrap(), ApplyOutcome::Stale);
        assert_eq!(ds.segment_by_id("s1").unwrap().surface_type().0, "ice");
    }

    #[test]
    fn malformed_events_are_errors() {
        let ds = store();
        assert!(matches!(
            handle_event(&ds, b"not json"),
            Err(MessagingError::Decode(_))
        ));

        let mut event = RoadSegmentSurfaceUpdated::committed(
            &UpdateRoadSegmentSurface::new("s1", "ice", 40.0, at(0)),
            at(0),
        );
        event.timestamp = "12:00".to_owned();
        assert!(matches!(
            handle_event(&ds, &encode(&event)),
            Err(MessagingError::InvalidTimestamp(_))
        ));
    }
}
