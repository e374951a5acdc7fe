//! Shared type definitions for the Roadwatch road network store.
//!
//! This crate is the single source of truth for the records, identifiers and
//! bus payloads that cross crate boundaries.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for store-assigned identities
//! - [`records`] -- Traffic-flow, road-surface and surface-prediction records
//! - [`messages`] -- Command, event and reply payloads for the message bus
//! - [`validation`] -- [`ValidationError`] and field parsing helpers

pub mod ids;
pub mod messages;
pub mod records;
pub mod validation;

// Re-export all public types at crate root for convenience.
pub use ids::{RoadSurfaceObservedId, SurfacePredictionId, TrafficFlowObservedId};
pub use messages::{
    CommandReply, RoadSegmentSurfaceUpdated, UpdateRoadSegmentSurface, format_timestamp,
};
pub use records::{
    NewRoadSurfaceObserved, NewTrafficFlowObserved, Position, RoadSurfaceObserved,
    SurfacePrediction, TrafficFlowObserved, normalize_surface_type,
};
pub use validation::{ValidationError, parse_timestamp};
