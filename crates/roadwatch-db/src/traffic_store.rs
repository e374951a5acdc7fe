//! Traffic-flow observation log.
//!
//! Queries select an inclusive time window and return the newest
//! observations first. Observations sharing a timestamp come back in the
//! order they were inserted (`seq`).

use chrono::{DateTime, Datelike, Utc};
use roadwatch_types::{Position, TrafficFlowObserved, TrafficFlowObservedId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Earliest year `TIMESTAMPTZ` can represent.
const PG_MIN_YEAR: i32 = -4712;

/// Latest year `TIMESTAMPTZ` can represent.
const PG_MAX_YEAR: i32 = 294_275;

/// Map an instant outside the `TIMESTAMPTZ` range to an open bound.
///
/// Callers pass `DateTime::<Utc>::MIN_UTC` / `MAX_UTC` to mean "unbounded".
pub(crate) fn sql_bound(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (PG_MIN_YEAR..=PG_MAX_YEAR)
        .contains(&instant.year())
        .then_some(instant)
}

/// Operations on the `traffic_flow_observed` table.
pub struct TrafficFlowStore<'a> {
    pool: &'a PgPool,
}

impl<'a> TrafficFlowStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert one validated observation.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, record: &TrafficFlowObserved) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO traffic_flow_observed
                (id, date_observed, date_observed_from, date_observed_to, latitude, longitude,
                 lane_id, intensity, average_vehicle_speed, ref_road_segment)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(record.id.into_inner())
        .bind(record.date_observed)
        .bind(record.date_observed_from)
        .bind(record.date_observed_to)
        .bind(record.location.map(|p| p.latitude))
        .bind(record.location.map(|p| p.longitude))
        .bind(i64::from(record.lane_id))
        .bind(i64::from(record.intensity))
        .bind(record.average_vehicle_speed)
        .bind(&record.ref_road_segment)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Observations with `from <= date_observed <= to`, newest first, at
    /// most `limit` of them.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::Conversion`] if a stored row is out of range.
    pub async fn query(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TrafficFlowObserved>, DbError> {
        let rows = sqlx::query_as::<_, TrafficFlowRow>(
            r"SELECT id, date_observed, date_observed_from, date_observed_to, latitude, longitude,
                     lane_id, intensity, average_vehicle_speed, ref_road_segment
              FROM traffic_flow_observed
              WHERE ($1::TIMESTAMPTZ IS NULL OR date_observed >= $1)
                AND ($2::TIMESTAMPTZ IS NULL OR date_observed <= $2)
              ORDER BY date_observed DESC, seq ASC
              LIMIT $3",
        )
        .bind(sql_bound(from))
        .bind(sql_bound(to))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TrafficFlowObserved::try_from).collect()
    }
}

/// A row from the `traffic_flow_observed` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrafficFlowRow {
    /// Observation identity.
    pub id: Uuid,
    /// Observation instant.
    pub date_observed: DateTime<Utc>,
    /// Start of the observation window.
    pub date_observed_from: Option<DateTime<Utc>>,
    /// End of the observation window.
    pub date_observed_to: Option<DateTime<Utc>>,
    /// Latitude, if a location was given.
    pub latitude: Option<f64>,
    /// Longitude, if a location was given.
    pub longitude: Option<f64>,
    /// Lane the counter covers.
    pub lane_id: i64,
    /// Vehicle count.
    pub intensity: i64,
    /// Mean vehicle speed.
    pub average_vehicle_speed: f64,
    /// Referenced segment.
    pub ref_road_segment: Option<String>,
}

impl TryFrom<TrafficFlowRow> for TrafficFlowObserved {
    type Error = DbError;

    fn try_from(row: TrafficFlowRow) -> Result<Self, Self::Error> {
        let lane_id = u32::try_from(row.lane_id)
            .map_err(|e| DbError::Conversion(format!("lane_id {}: {e}", row.lane_id)))?;
        let intensity = u32::try_from(row.intensity)
            .map_err(|e| DbError::Conversion(format!("intensity {}: {e}", row.intensity)))?;
        let location = match (row.latitude, row.longitude) {
            (Some(lat), Some(lon)) => Some(Position::new(lat, lon)),
            _ => None,
        };

        Ok(Self {
            id: TrafficFlowObservedId::from(row.id),
            date_observed: row.date_observed,
            date_observed_from: row.date_observed_from,
            date_observed_to: row.date_observed_to,
            location,
            lane_id,
            intensity,
            average_vehicle_speed: row.average_vehicle_speed,
            ref_road_segment: row.ref_road_segment,
        })
    }
}
