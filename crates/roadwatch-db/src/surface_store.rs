//! Append-only surface-prediction history.
//!
//! Every committed surface update becomes one immutable row. Rows are never
//! updated or deleted; the latest row per segment is what a restarted
//! replica restores into memory.

use chrono::{DateTime, Utc};
use roadwatch_types::{SurfacePrediction, SurfacePredictionId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Operations on the `surface_predictions` table.
pub struct SurfaceStore<'a> {
    pool: &'a PgPool,
}

impl<'a> SurfaceStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append one prediction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn append(&self, prediction: &SurfacePrediction) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO surface_predictions (id, segment_id, surface_type, probability, observed_at)
              VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(prediction.id.into_inner())
        .bind(&prediction.segment_id)
        .bind(&prediction.surface_type)
        .bind(prediction.probability)
        .bind(prediction.timestamp)
        .execute(self.pool)
        .await?;

        tracing::debug!(
            segment_id = %prediction.segment_id,
            surface_type = %prediction.surface_type,
            "Appended surface prediction"
        );
        Ok(())
    }

    /// Full history for one segment, oldest observation first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn history(&self, segment_id: &str) -> Result<Vec<SurfacePrediction>, DbError> {
        let rows = sqlx::query_as::<_, SurfacePredictionRow>(
            r"SELECT id, segment_id, surface_type, probability, observed_at
              FROM surface_predictions
              WHERE segment_id = $1
              ORDER BY observed_at ASC, seq ASC",
        )
        .bind(segment_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(SurfacePrediction::from).collect())
    }

    /// The most recent prediction for every segment that has one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn latest_per_segment(&self) -> Result<Vec<SurfacePrediction>, DbError> {
        let rows = sqlx::query_as::<_, SurfacePredictionRow>(
            r"SELECT DISTINCT ON (segment_id) id, segment_id, surface_type, probability, observed_at
              FROM surface_predictions
              ORDER BY segment_id, observed_at DESC, seq DESC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(SurfacePrediction::from).collect())
    }
}

/// A row from the `surface_predictions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SurfacePredictionRow {
    /// History entry identity.
    pub id: Uuid,
    /// Segment the prediction applies to.
    pub segment_id: String,
    /// Surface label.
    pub surface_type: String,
    /// Confidence in `[0, 100]`.
    pub probability: f64,
    /// Observation instant.
    pub observed_at: DateTime<Utc>,
}

impl From<SurfacePredictionRow> for SurfacePrediction {
    fn from(row: SurfacePredictionRow) -> Self {
        Self {
            id: SurfacePredictionId::from(row.id),
            segment_id: row.segment_id,
            surface_type: row.surface_type,
            probability: row.probability,
            timestamp: row.observed_at,
        }
    }
}
