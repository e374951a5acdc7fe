//! Road-surface observation log.

use chrono::{DateTime, Utc};
use roadwatch_types::{Position, RoadSurfaceObserved, RoadSurfaceObservedId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `road_surface_observed` table.
pub struct RoadSurfaceStore<'a> {
    pool: &'a PgPool,
}

impl<'a> RoadSurfaceStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert one validated observation.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, record: &RoadSurfaceObserved) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO road_surface_observed
                (id, surface_type, probability, latitude, longitude, date_observed, ref_road_segment)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id.into_inner())
        .bind(&record.surface_type)
        .bind(record.probability)
        .bind(record.location.latitude)
        .bind(record.location.longitude)
        .bind(record.date_observed)
        .bind(&record.ref_road_segment)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// The `limit` most recent observations, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn recent(&self, limit: usize) -> Result<Vec<RoadSurfaceObserved>, DbError> {
        let rows = sqlx::query_as::<_, RoadSurfaceRow>(
            r"SELECT id, surface_type, probability, latitude, longitude, date_observed, ref_road_segment
              FROM road_surface_observed
              ORDER BY date_observed DESC, seq ASC
              LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(RoadSurfaceObserved::from).collect())
    }
}

/// A row from the `road_surface_observed` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoadSurfaceRow {
    /// Observation identity.
    pub id: Uuid,
    /// Lower-cased surface label.
    pub surface_type: String,
    /// Confidence in `[0, 100]`.
    pub probability: f64,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Observation instant.
    pub date_observed: DateTime<Utc>,
    /// Referenced segment.
    pub ref_road_segment: Option<String>,
}

impl From<RoadSurfaceRow> for RoadSurfaceObserved {
    fn from(row: RoadSurfaceRow) -> Self {
        Self {
            id: RoadSurfaceObservedId::from(row.id),
            surface_type: row.surface_type,
            probability: row.probability,
            location: Position::new(row.latitude, row.longitude),
            date_observed: row.date_observed,
            ref_road_segment: row.ref_road_segment,
        }
    }
}
