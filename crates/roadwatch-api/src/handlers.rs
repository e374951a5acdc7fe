//! REST endpoint handlers.
//!
//! Reads are served from the local replica's [`Datastore`]. Surface writes
//! are validated here and then sent as a command over the bus, so they take
//! the same durable path whichever instance received the request.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness and index summary |
//! | `GET` | `/api/roads` | Roads near a point, within a rectangle, or all |
//! | `GET` | `/api/roads/{id}` | Single road |
//! | `GET` | `/api/segments` | Segments near a point, within a rectangle, or all |
//! | `GET` | `/api/segments/{id}` | Single segment with its surface |
//! | `GET` | `/api/segments/{id}/history` | Durable surface history |
//! | `PATCH` | `/api/segments/{id}/surface` | Report a surface condition |
//! | `GET`/`POST` | `/api/traffic-flows` | Query or store traffic-flow observations |
//! | `GET`/`POST` | `/api/road-surfaces` | Query or store road-surface observations |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, SubsecRound, Utc};
use roadwatch_core::{Datastore, Page};
use roadwatch_geo::{Road, RoadSegment};
use roadwatch_types::validation::check_probability;
use roadwatch_types::{
    NewRoadSurfaceObserved, NewTrafficFlowObserved, UpdateRoadSegmentSurface, format_timestamp,
    normalize_surface_type, parse_timestamp,
};
use serde_json::Value;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the road and segment listings.
///
/// Either `lat`, `lon` and `max_distance` (metres) select a near-point
/// query, or `lat0`, `lon0`, `lat1`, `lon1` select a rectangle. With
/// neither, everything is listed.
#[derive(Debug, Default, serde::Deserialize)]
pub struct SpatialQuery {
    /// Latitude of the reference point.
    pub lat: Option<f64>,
    /// Longitude of the reference point.
    pub lon: Option<f64>,
    /// Search radius in metres.
    pub max_distance: Option<f64>,
    /// Latitude of the first rectangle corner.
    pub lat0: Option<f64>,
    /// Longitude of the first rectangle corner.
    pub lon0: Option<f64>,
    /// Latitude of the opposite rectangle corner.
    pub lat1: Option<f64>,
    /// Longitude of the opposite rectangle corner.
    pub lon1: Option<f64>,
    /// Entries to skip.
    pub offset: Option<usize>,
    /// Entries to return at most (default 100, max 1000).
    pub limit: Option<usize>,
}

enum Selection {
    Near { lat: f64, lon: f64, radius: f64 },
    Rect { lat0: f64, lon0: f64, lat1: f64, lon1: f64 },
    All,
}

impl SpatialQuery {
    fn selection(&self) -> Result<Selection, ApiError> {
        let corners = [self.lat0, self.lon0, self.lat1, self.lon1];
        if corners.iter().any(Option::is_some) {
            return match corners {
                [Some(lat0), Some(lon0), Some(lat1), Some(lon1)] => Ok(Selection::Rect {
                    lat0,
                    lon0,
                    lat1,
                    lon1,
                }),
                _ => Err(ApiError::BadRequest(
                    "a rectangle needs lat0, lon0, lat1 and lon1".to_owned(),
                )),
            };
        }

        match (self.lat, self.lon, self.max_distance) {
            (None, None, None) => Ok(Selection::All),
            (Some(lat), Some(lon), Some(radius)) => Ok(Selection::Near { lat, lon, radius }),
            _ => Err(ApiError::BadRequest(
                "a near-point query needs lat, lon and max_distance".to_owned(),
            )),
        }
    }

    fn page(&self) -> Page {
        Page::new(self.offset, self.limit)
    }
}

/// Query parameters for `GET /api/traffic-flows`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct TrafficFlowQuery {
    /// Inclusive lower bound (RFC3339). Open when absent.
    pub from: Option<String>,
    /// Inclusive upper bound (RFC3339). Open when absent.
    pub to: Option<String>,
    /// Entries to return at most (default 100, max 1000).
    pub limit: Option<usize>,
}

/// Query parameters for `GET /api/road-surfaces`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct LimitQuery {
    /// Entries to return at most (default 100, max 1000).
    pub limit: Option<usize>,
}

/// Body of `PATCH /api/segments/{id}/surface`.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceUpdate {
    /// Surface label; matched case-insensitively.
    pub surface_type: String,
    /// Confidence in `[0, 100]`.
    pub probability: f64,
}

// ---------------------------------------------------------------------------
// JSON projections
// ---------------------------------------------------------------------------

fn road_json(road: &Road) -> Value {
    let bbox = road.bounding_box();
    serde_json::json!({
        "id": road.id(),
        "segments": road.segment_ids(),
        "bbox": [bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat],
    })
}

fn segment_json(segment: &RoadSegment) -> Value {
    let surface = segment.surface();
    serde_json::json!({
        "id": segment.id(),
        "roadId": segment.road_id(),
        "location": {
            "type": "LineString",
            "coordinates": segment.coordinates(),
        },
        "surfaceType": surface.surface_type,
        "probability": surface.probability,
        "dateModified": surface.date_modified.map(format_timestamp),
    })
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness check with a summary of what this instance serves.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let network = state.store.network();
    Json(serde_json::json!({
        "status": "ok",
        "instance": state.instance_id,
        "roads": network.road_count(),
        "segments": network.segment_count(),
        "persistence": state.store.persistence().kind(),
        "bus": state.bus.kind(),
    }))
}

// ---------------------------------------------------------------------------
// Roads
// ---------------------------------------------------------------------------

/// List roads matching a spatial query.
pub async fn list_roads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SpatialQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let store = &state.store;
    let roads = match params.selection()? {
        Selection::Near { lat, lon, radius } => {
            params.page().apply(store.roads_near_point(lat, lon, radius))
        }
        Selection::Rect {
            lat0,
            lon0,
            lat1,
            lon1,
        } => params.page().apply(store.roads_within_rect(lat0, lon0, lat1, lon1)),
        Selection::All => store.all_roads(params.page()),
    };

    let roads: Vec<Value> = roads.into_iter().map(road_json).collect();
    Ok(Json(serde_json::json!({
        "count": roads.len(),
        "roads": roads,
    })))
}

/// A single road.
pub async fn get_road(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let road = state.store.road_by_id(&id)?;
    Ok(Json(road_json(road)))
}

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// List segments matching a spatial query, most recently updated first.
pub async fn list_segments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SpatialQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let store = &state.store;
    let segments = match params.selection()? {
        Selection::Near { lat, lon, radius } => store.segments_near_point(lat, lon, radius),
        Selection::Rect {
            lat0,
            lon0,
            lat1,
            lon1,
        } => store.segments_within_rect(lat0, lon0, lat1, lon1),
        Selection::All => store.network().segments().iter().collect(),
    };

    let segments: Vec<Value> = Datastore::recent_segments(segments, params.page())
        .into_iter()
        .map(segment_json)
        .collect();
    Ok(Json(serde_json::json!({
        "count": segments.len(),
        "segments": segments,
    })))
}

/// A single segment with its current surface.
pub async fn get_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let segment = state.store.segment_by_id(&id)?;
    Ok(Json(segment_json(segment)))
}

/// Durable surface history of a segment, oldest first.
pub async fn segment_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let history = state.store.surface_history(&id).await?;
    Ok(Json(serde_json::json!({
        "count": history.len(),
        "history": history,
    })))
}

/// Report a surface condition for a segment.
///
/// The update is stamped with the current time and sent as a command; the
/// response is `204 No Content` once a replica has made it durable.
pub async fn update_segment_surface(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SurfaceUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.segment_by_id(&id)?;
    let surface_type = normalize_surface_type(&body.surface_type);
    if surface_type.is_empty() {
        return Err(ApiError::BadRequest("surfaceType must not be empty".to_owned()));
    }
    let probability =
        check_probability(body.probability).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let observed_at = Utc::now().trunc_subsecs(0);
    let command = UpdateRoadSegmentSurface::new(&id, &surface_type, probability, observed_at);
    state.bus.note_to_self(&command).await?;

    info!(
        segment_id = %id,
        surface_type = %surface_type,
        probability,
        "surface update accepted"
    );
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Traffic flows
// ---------------------------------------------------------------------------

/// Traffic-flow observations in a time window, newest first.
pub async fn list_traffic_flows(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrafficFlowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let from = bound("from", params.from.as_deref(), DateTime::<Utc>::MIN_UTC)?;
    let to = bound("to", params.to.as_deref(), DateTime::<Utc>::MAX_UTC)?;
    let limit = Page::new(None, params.limit).limit;

    let flows = state.store.query_traffic_flow_observed(from, to, limit).await?;
    Ok(Json(serde_json::json!({
        "count": flows.len(),
        "traffic_flows": flows,
    })))
}

/// Store a traffic-flow observation under a fresh id.
pub async fn create_traffic_flow(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewTrafficFlowObserved>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.store.create_traffic_flow_observed(body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

fn bound(field: &'static str, value: Option<&str>, open: DateTime<Utc>) -> Result<DateTime<Utc>, ApiError> {
    value.map_or(Ok(open), |v| {
        parse_timestamp(field, v).map_err(|e| ApiError::BadRequest(e.to_string()))
    })
}

// ---------------------------------------------------------------------------
// Road surfaces
// ---------------------------------------------------------------------------

/// The most recent road-surface observations.
pub async fn list_road_surfaces(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = Page::new(None, params.limit).limit;
    let surfaces = state.store.road_surfaces_observed(limit).await?;
    Ok(Json(serde_json::json!({
        "count": surfaces.len(),
        "road_surfaces": surfaces,
    })))
}

/// Store a road-surface observation under a fresh id.
pub async fn create_road_surface(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewRoadSurfaceObserved>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.store.create_road_surface_observed(body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
