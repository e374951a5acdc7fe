//! Multi-replica convergence over the in-process bus.
//!
//! Each replica has its own in-memory road network; all of them share one
//! durable backend and one bus, the way separate instances share a
//! database and a NATS server.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::indexing_slicing
)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use roadwatch_core::Datastore;
use roadwatch_core::config::MessagingConfig;
use roadwatch_db::Persistence;
use roadwatch_geo::RoadNetwork;
use roadwatch_messaging::{LocalBus, MessageBus, MessagingError, Replica, ReplicaHandle};
use roadwatch_types::{RoadSegmentSurfaceUpdated, UpdateRoadSegmentSurface};

const SEED: &str = "\
road-a;a-1;62.3900;17.3100;62.3905;17.3110
road-a;a-2;62.3905;17.3110;62.3910;17.3120
road-b;b-1;62.4000;17.4000;62.4010;17.4010
";

fn replica_store(persistence: &Persistence) -> Arc<Datastore> {
    let network = RoadNetwork::from_seed(SEED.as_bytes()).expect("seed parses");
    Arc::new(Datastore::new(network, persistence.clone()))
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 6, minute, 0).unwrap()
}

fn surface_of(store: &Datastore, segment: &str) -> (String, f64) {
    store.segment_by_id(segment).unwrap().surface_type()
}

async fn start(store: &Arc<Datastore>, bus: &MessageBus, name: &str) -> ReplicaHandle {
    Replica::new(Arc::clone(store), bus.clone(), name)
        .start()
        .await
        .expect("local subscriptions never fail")
}

/// Poll until every store shows `expected` on `segment`.
async fn converge(stores: &[&Arc<Datastore>], segment: &str, expected: &str) {
    let wait = async {
        loop {
            if stores.iter().all(|s| surface_of(s, segment).0 == expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("replicas converge");
}

#[tokio::test]
async fn update_on_one_replica_reaches_every_replica() {
    let persistence = Persistence::memory();
    let bus = MessageBus::local(LocalBus::new(), MessagingConfig::default());
    let a = replica_store(&persistence);
    let b = replica_store(&persistence);
    let ha = start(&a, &bus, "a").await;
    let hb = start(&b, &bus, "b").await;

    bus.note_to_self(&UpdateRoadSegmentSurface::new("a-2", "Snow", 75.0, at(0)))
        .await
        .expect("command committed");

    converge(&[&a, &b], "a-2", "snow").await;
    for store in [&a, &b] {
        let segment = store.segment_by_id("a-2").unwrap();
        assert_eq!(segment.surface_type(), ("snow".to_owned(), 75.0));
        assert_eq!(segment.date_modified(), Some(at(0)));
    }
    assert_eq!(surface_of(&a, "a-1").0, "unknown");

    // Durable exactly once, whichever replica handled it.
    assert_eq!(a.surface_history("a-2").await.unwrap().len(), 1);

    ha.abort();
    hb.abort();
}

#[tokio::test]
async fn successive_updates_converge_to_the_latest() {
    let persistence = Persistence::memory();
    let bus = MessageBus::local(LocalBus::new(), MessagingConfig::default());
    let a = replica_store(&persistence);
    let b = replica_store(&persistence);
    let ha = start(&a, &bus, "a").await;
    let hb = start(&b, &bus, "b").await;

    for (minute, kind) in [(0, "dry"), (10, "wet"), (20, "ice")] {
        bus.note_to_self(&UpdateRoadSegmentSurface::new("b-1", kind, 60.0, at(minute)))
            .await
            .expect("command committed");
    }

    converge(&[&a, &b], "b-1", "ice").await;
    assert_eq!(b.segment_by_id("b-1").unwrap().date_modified(), Some(at(20)));
    assert_eq!(a.surface_history("b-1").await.unwrap().len(), 3);

    ha.abort();
    hb.abort();
}

#[tokio::test]
async fn rejected_command_is_reported_and_not_broadcast() {
    let persistence = Persistence::memory();
    let local = LocalBus::new();
    let bus = MessageBus::local(local.clone(), MessagingConfig::default());
    let a = replica_store(&persistence);
    let ha = start(&a, &bus, "a").await;
    let mut events = local.subscribe_events();

    let result = bus
        .note_to_self(&UpdateRoadSegmentSurface::new("nope", "snow", 75.0, at(0)))
        .await;
    assert!(matches!(result, Err(MessagingError::CommandRejected(_))));

    let result = bus
        .note_to_self(&UpdateRoadSegmentSurface::new("a-1", "snow", 250.0, at(0)))
        .await;
    assert!(matches!(result, Err(MessagingError::CommandRejected(_))));

    assert!(events.try_recv().is_err());
    assert!(a.surface_history("a-1").await.unwrap().is_empty());
    assert_eq!(surface_of(&a, "a-1").0, "unknown");

    ha.abort();
}

#[tokio::test]
async fn malformed_event_is_dropped_and_later_events_still_apply() {
    let persistence = Persistence::memory();
    let local = LocalBus::new();
    let bus = MessageBus::local(local.clone(), MessagingConfig::default());
    let a = replica_store(&persistence);
    let ha = start(&a, &bus, "a").await;

    local.publish(b"{not json".to_vec());
    let mut bad_time = RoadSegmentSurfaceUpdated::committed(
        &UpdateRoadSegmentSurface::new("a-1", "wet", 10.0, at(0)),
        at(0),
    );
    bad_time.timestamp = "soon".to_owned();
    bus.publish_event(&bad_time).await.unwrap();

    bus.note_to_self(&UpdateRoadSegmentSurface::new("a-1", "slush", 30.0, at(1)))
        .await
        .expect("command committed");
    converge(&[&a], "a-1", "slush").await;

    ha.abort();
}

#[tokio::test]
async fn command_without_any_replica_times_out() {
    let config = MessagingConfig {
        request_timeout_ms: 50,
        ..MessagingConfig::default()
    };
    let bus = MessageBus::local(LocalBus::new(), config);
    let result = bus
        .note_to_self(&UpdateRoadSegmentSurface::new("a-1", "snow", 75.0, at(0)))
        .await;
    assert!(matches!(result, Err(MessagingError::Transport(_))));
}

#[tokio::test]
async fn timed_out_command_is_not_applied_by_a_late_replica() {
    let config = MessagingConfig {
        request_timeout_ms: 50,
        ..MessagingConfig::default()
    };
    let local = LocalBus::new();
    let bus = MessageBus::local(local.clone(), config);
    let result = bus
        .note_to_self(&UpdateRoadSegmentSurface::new("a-1", "snow", 75.0, at(0)))
        .await;
    assert!(matches!(result, Err(MessagingError::Transport(_))));

    let persistence = Persistence::memory();
    let a = replica_store(&persistence);
    let mut events = local.subscribe_events();
    let ha = start(&a, &bus, "a").await;

    // The queue is FIFO, so once this commits the stale command was seen.
    bus.note_to_self(&UpdateRoadSegmentSurface::new("b-1", "ice", 60.0, at(1)))
        .await
        .expect("fresh command committed");

    assert_eq!(surface_of(&a, "a-1").0, "unknown");
    assert!(a.surface_history("a-1").await.unwrap().is_empty());
    assert_eq!(a.surface_history("b-1").await.unwrap().len(), 1);

    let payload = events.try_recv().unwrap();
    let event: RoadSegmentSurfaceUpdated = serde_json::from_slice(&payload).unwrap();
    assert_eq!(event.id, "b-1");
    assert!(events.try_recv().is_err());

    ha.abort();
}

#[tokio::test]
async fn restarted_replica_restores_durable_state() {
    let persistence = Persistence::memory();
    let bus = MessageBus::local(LocalBus::new(), MessagingConfig::default());
    let a = replica_store(&persistence);
    let ha = start(&a, &bus, "a").await;

    bus.note_to_self(&UpdateRoadSegmentSurface::new("a-2", "ice", 80.0, at(3)))
        .await
        .expect("command committed");
    ha.abort();

    let restarted = replica_store(&persistence);
    assert_eq!(surface_of(&restarted, "a-2").0, "unknown");
    let restored = restarted.restore_surface_state().await.unwrap();
    assert_eq!(restored, 1);
    assert_eq!(surface_of(&restarted, "a-2"), ("ice".to_owned(), 80.0));
    assert_eq!(restarted.segment_by_id("a-2").unwrap().date_modified(), Some(at(3)));
}
