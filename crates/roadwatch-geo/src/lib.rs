//! Spatial core of the Roadwatch store.
//!
//! Holds the seeded road network in memory and answers rectangle-overlap and
//! point-proximity queries through a bounding-volume hierarchy. Segment
//! geometry is immutable once built; each segment's surface state is guarded
//! independently so event handlers can apply updates while readers iterate.
//!
//! # Modules
//!
//! - [`geometry`] -- Points, rectangles and bounding boxes
//! - [`distance`] -- Haversine and point-to-polyline distance
//! - [`bvh`] -- Static bounding-volume hierarchy
//! - [`road`] -- Roads, segments and surface state
//! - [`seed`] -- Seed-format parser
//! - [`network`] -- The indexed [`RoadNetwork`]
//! - [`error`] -- [`NetworkError`]

pub mod bvh;
pub mod distance;
pub mod error;
pub mod geometry;
pub mod network;
pub mod road;
pub mod seed;

pub use bvh::Bvh;
pub use error::NetworkError;
pub use geometry::{BoundingBox, Point, Rectangle};
pub use network::RoadNetwork;
pub use road::{ApplyOutcome, Road, RoadSegment, SurfaceState, UNKNOWN_SURFACE, order_by_recency};
pub use seed::{SeedRecord, parse_seed};
