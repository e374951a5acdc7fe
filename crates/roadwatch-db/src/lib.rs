//! Durable persistence for the Roadwatch store.
//!
//! Only surface-prediction history and the two observation logs are
//! persisted; the road network is rebuilt from its seed source at startup.
//!
//! # Architecture
//!
//! ```text
//! Datastore
//!     |
//!     +-- Persistence::Postgres --> PostgreSQL (PostgresPool)
//!     |       |-- SurfaceStore       (append-only surface history)
//!     |       |-- TrafficFlowStore   (traffic-flow observations)
//!     |       +-- RoadSurfaceStore   (road-surface observations)
//!     |
//!     +-- Persistence::Memory ----> MemoryStore (same semantics, no durability)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`surface_store`] -- Surface-prediction history
//! - [`traffic_store`] -- Traffic-flow observation log
//! - [`road_surface_store`] -- Road-surface observation log
//! - [`memory`] -- In-memory backend
//! - [`persistence`] -- Backend dispatch
//! - [`error`] -- Shared error types

pub mod error;
pub mod memory;
pub mod persistence;
pub mod postgres;
pub mod road_surface_store;
pub mod surface_store;
pub mod traffic_store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use memory::MemoryStore;
pub use persistence::Persistence;
pub use postgres::PostgresPool;
pub use road_surface_store::{RoadSurfaceRow, RoadSurfaceStore};
pub use surface_store::{SurfacePredictionRow, SurfaceStore};
pub use traffic_store::{TrafficFlowRow, TrafficFlowStore};
