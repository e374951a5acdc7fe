//! Integration tests for the HTTP API.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. Surface writes travel over an in-process bus to a
//! replica started alongside the router.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use roadwatch_api::{AppState, build_router};
use roadwatch_core::Datastore;
use roadwatch_core::config::MessagingConfig;
use roadwatch_db::Persistence;
use roadwatch_geo::RoadNetwork;
use roadwatch_messaging::{LocalBus, MessageBus, Replica, ReplicaHandle};
use serde_json::{Value, json};
use tower::ServiceExt;

const SEED: &str = "\
road-a;a-1;62.3900;17.3100;62.3905;17.3110
road-a;a-2;62.3905;17.3110;62.3910;17.3120
road-a;a-3;62.3910;17.3120;62.3915;17.3130
road-b;b-1;62.4000;17.4000;62.4010;17.4010
";

struct TestApp {
    router: Router,
    replica: Option<ReplicaHandle>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(replica) = &self.replica {
            replica.abort();
        }
    }
}

async fn make_app(with_replica: bool, messaging: MessagingConfig) -> TestApp {
    let network = RoadNetwork::from_seed(SEED.as_bytes()).unwrap();
    let store = Arc::new(Datastore::new(network, Persistence::memory()));
    let bus = MessageBus::local(LocalBus::new(), messaging);

    let replica = if with_replica {
        Some(
            Replica::new(Arc::clone(&store), bus.clone(), "test")
                .start()
                .await
                .unwrap(),
        )
    } else {
        None
    };

    let state = Arc::new(AppState::new(store, bus, "test"));
    TestApp {
        router: build_router(state),
        replica,
    }
}

async fn app() -> TestApp {
    make_app(true, MessagingConfig::default()).await
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn send_json(router: &Router, method: &str, uri: &str, body: &Value) -> StatusCode {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    router.clone().oneshot(request).await.unwrap().status()
}

// =========================================================================
// Health and reads
// =========================================================================

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, json) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["roads"], 2);
    assert_eq!(json["segments"], 4);
    assert_eq!(json["persistence"], "memory");
    assert_eq!(json["bus"], "local");
}

#[tokio::test]
async fn test_list_all_roads_and_segments() {
    let app = app().await;
    let (status, json) = get(&app.router, "/api/roads").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["roads"][0]["id"], "road-a");
    assert_eq!(json["roads"][0]["segments"], json!(["a-1", "a-2", "a-3"]));

    let (_, json) = get(&app.router, "/api/segments?limit=2").await;
    assert_eq!(json["count"], 2);
    // Never-updated segments come in id order.
    assert_eq!(json["segments"][0]["id"], "a-1");
    assert_eq!(json["segments"][1]["id"], "a-2");
    assert_eq!(json["segments"][0]["surfaceType"], "unknown");
    assert_eq!(json["segments"][0]["location"]["type"], "LineString");
    assert_eq!(json["segments"][0]["location"]["coordinates"][0], json!([17.31, 62.39]));
}

#[tokio::test]
async fn test_segments_near_point() {
    let app = app().await;
    let (status, json) =
        get(&app.router, "/api/segments?lat=62.39025&lon=17.3105&max_distance=20").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["segments"][0]["id"], "a-1");

    let (_, json) = get(&app.router, "/api/roads?lat=62.39025&lon=17.3105&max_distance=20").await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["roads"][0]["id"], "road-a");
}

#[tokio::test]
async fn test_segments_within_rect() {
    let app = app().await;
    let (_, json) = get(
        &app.router,
        "/api/segments?lat0=62.0&lon0=17.0&lat1=63.0&lon1=18.0",
    )
    .await;
    assert_eq!(json["count"], 4);

    let (_, json) = get(
        &app.router,
        "/api/segments?lat0=10.0&lon0=10.0&lat1=11.0&lon1=11.0",
    )
    .await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_incomplete_spatial_query_is_bad_request() {
    let app = app().await;
    let (status, json) = get(&app.router, "/api/segments?lat0=62.0&lon0=17.0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);

    let (status, _) = get(&app.router, "/api/roads?lat=62.0&lon=17.0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_road_and_segment() {
    let app = app().await;
    let (status, json) = get(&app.router, "/api/roads/road-b").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["segments"], json!(["b-1"]));

    let (status, json) = get(&app.router, "/api/segments/b-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["roadId"], "road-b");
    assert_eq!(json["dateModified"], Value::Null);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let app = app().await;
    for uri in ["/api/roads/nope", "/api/segments/nope", "/api/segments/nope/history"] {
        let (status, json) = get(&app.router, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(json["status"], 404);
    }
}

// =========================================================================
// Surface writes
// =========================================================================

#[tokio::test]
async fn test_patch_surface_commits_and_is_visible() {
    let app = app().await;
    let status = send_json(
        &app.router,
        "PATCH",
        "/api/segments/a-2/surface",
        &json!({"surfaceType": "Snow", "probability": 75.0}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = get(&app.router, "/api/segments/a-2").await;
    assert_eq!(json["surfaceType"], "snow");
    assert_eq!(json["probability"], 75.0);
    assert!(json["dateModified"].is_string());

    let (_, json) = get(&app.router, "/api/segments/a-2/history").await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["history"][0]["surfaceType"], "snow");

    // Most recently updated segment now leads the listing.
    let (_, json) = get(&app.router, "/api/segments").await;
    assert_eq!(json["segments"][0]["id"], "a-2");
}

#[tokio::test]
async fn test_patch_surface_validation() {
    let app = app().await;
    let status = send_json(
        &app.router,
        "PATCH",
        "/api/segments/a-1/surface",
        &json!({"surfaceType": "snow", "probability": 150.0}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let status = send_json(
        &app.router,
        "PATCH",
        "/api/segments/a-1/surface",
        &json!({"surfaceType": "  ", "probability": 50.0}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let status = send_json(
        &app.router,
        "PATCH",
        "/api/segments/nope/surface",
        &json!({"surfaceType": "snow", "probability": 50.0}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = get(&app.router, "/api/segments/a-1/history").await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_patch_without_replica_is_bad_gateway() {
    let messaging = MessagingConfig {
        request_timeout_ms: 50,
        ..MessagingConfig::default()
    };
    let app = make_app(false, messaging).await;
    let status = send_json(
        &app.router,
        "PATCH",
        "/api/segments/a-1/surface",
        &json!({"surfaceType": "snow", "probability": 50.0}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, json) = get(&app.router, "/api/segments/a-1").await;
    assert_eq!(json["surfaceType"], "unknown");
}

// =========================================================================
// Observation logs
// =========================================================================

#[tokio::test]
async fn test_traffic_flows() {
    let app = app().await;
    for time in ["2016-12-07T11:10:00Z", "2016-12-07T13:30:00Z", "2016-12-07T14:30:00Z"] {
        let status = send_json(
            &app.router,
            "POST",
            "/api/traffic-flows",
            &json!({"dateObserved": time, "laneID": 1, "intensity": 12}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let status = send_json(
        &app.router,
        "POST",
        "/api/traffic-flows",
        &json!({"laneID": 1, "intensity": 12}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = get(&app.router, "/api/traffic-flows").await;
    assert_eq!(json["count"], 3);
    assert_eq!(json["traffic_flows"][0]["dateObserved"], "2016-12-07T14:30:00Z");

    let (_, json) = get(&app.router, "/api/traffic-flows?from=2016-12-07T13:00:00Z&limit=10").await;
    assert_eq!(json["count"], 2);

    let (status, _) = get(&app.router, "/api/traffic-flows?to=noon").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_road_surfaces() {
    let app = app().await;
    let status = send_json(
        &app.router,
        "POST",
        "/api/road-surfaces",
        &json!({
            "surfaceType": "ICE",
            "probability": 80.0,
            "location": {"latitude": 62.39, "longitude": 17.31},
            "dateObserved": "2021-01-05T07:00:00Z",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let status = send_json(
        &app.router,
        "POST",
        "/api/road-surfaces",
        &json!({"surfaceType": "ice", "probability": 80.0, "dateObserved": "2021-01-05T07:00:00Z"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = get(&app.router, "/api/road-surfaces?limit=5").await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["road_surfaces"][0]["surfaceType"], "ice");
}
