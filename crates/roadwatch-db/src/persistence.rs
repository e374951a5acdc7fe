//! Backend selection for durable state.
//!
//! [`Persistence`] dispatches each operation to either the `PostgreSQL`
//! stores or the [`MemoryStore`]. Using an enum keeps the async methods
//! plain `async fn`s and the backend choice a runtime decision made once at
//! startup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use roadwatch_types::{RoadSurfaceObserved, SurfacePrediction, TrafficFlowObserved};

use crate::error::DbError;
use crate::memory::MemoryStore;
use crate::postgres::PostgresPool;
use crate::road_surface_store::RoadSurfaceStore;
use crate::surface_store::SurfaceStore;
use crate::traffic_store::TrafficFlowStore;

/// Durable storage for surface history and observation logs.
#[derive(Debug, Clone)]
pub enum Persistence {
    /// `PostgreSQL`-backed storage.
    Postgres(PostgresPool),
    /// Process-local storage, lost on restart.
    Memory(Arc<MemoryStore>),
}

impl Persistence {
    /// A fresh, empty in-memory backend.
    pub fn memory() -> Self {
        Self::Memory(Arc::new(MemoryStore::new()))
    }

    /// Short backend name for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Apply pending schema migrations; a no-op for the memory backend.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if a migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => pg.run_migrations().await,
            Self::Memory(_) => Ok(()),
        }
    }

    /// Release backend resources at shutdown; a no-op for the memory backend.
    pub async fn close(&self) {
        match self {
            Self::Postgres(pg) => pg.close().await,
            Self::Memory(_) => {}
        }
    }

    /// Append one entry to the surface history.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    pub async fn append_surface_prediction(
        &self,
        prediction: &SurfacePrediction,
    ) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => SurfaceStore::new(pg.pool()).append(prediction).await,
            Self::Memory(mem) => {
                mem.append_surface_prediction(prediction.clone());
                Ok(())
            }
        }
    }

    /// History of one segment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    pub async fn surface_history(&self, segment_id: &str) -> Result<Vec<SurfacePrediction>, DbError> {
        match self {
            Self::Postgres(pg) => SurfaceStore::new(pg.pool()).history(segment_id).await,
            Self::Memory(mem) => Ok(mem.surface_history(segment_id)),
        }
    }

    /// Latest prediction for every segment with history.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    pub async fn latest_surface_predictions(&self) -> Result<Vec<SurfacePrediction>, DbError> {
        match self {
            Self::Postgres(pg) => SurfaceStore::new(pg.pool()).latest_per_segment().await,
            Self::Memory(mem) => Ok(mem.latest_surface_predictions()),
        }
    }

    /// Store a validated traffic-flow observation.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    pub async fn insert_traffic_flow(&self, record: &TrafficFlowObserved) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => TrafficFlowStore::new(pg.pool()).insert(record).await,
            Self::Memory(mem) => {
                mem.insert_traffic_flow(record.clone());
                Ok(())
            }
        }
    }

    /// Traffic-flow observations in `[from, to]`, newest first, at most
    /// `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    pub async fn query_traffic_flows(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TrafficFlowObserved>, DbError> {
        match self {
            Self::Postgres(pg) => TrafficFlowStore::new(pg.pool()).query(from, to, limit).await,
            Self::Memory(mem) => Ok(mem.query_traffic_flows(from, to, limit)),
        }
    }

    /// Store a validated road-surface observation.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    pub async fn insert_road_surface(&self, record: &RoadSurfaceObserved) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => RoadSurfaceStore::new(pg.pool()).insert(record).await,
            Self::Memory(mem) => {
                mem.insert_road_surface(record.clone());
                Ok(())
            }
        }
    }

    /// The `limit` most recent road-surface observations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    pub async fn road_surfaces(&self, limit: usize) -> Result<Vec<RoadSurfaceObserved>, DbError> {
        match self {
            Self::Postgres(pg) => RoadSurfaceStore::new(pg.pool()).recent(limit).await,
            Self::Memory(mem) => Ok(mem.road_surfaces(limit)),
        }
    }
}
