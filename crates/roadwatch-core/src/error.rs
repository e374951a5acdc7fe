//! The unified error type of the [`Datastore`](crate::Datastore).

use roadwatch_db::DbError;
use roadwatch_geo::NetworkError;
use roadwatch_types::ValidationError;

/// Errors surfaced by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record or argument failed validation. Never retried.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// An unknown road or segment was referenced.
    #[error("{0}")]
    NotFound(NetworkError),

    /// The seed data could not be turned into a road network.
    #[error("road network construction failed: {0}")]
    Construction(NetworkError),

    /// The durable backend failed.
    #[error("persistence failed: {0}")]
    Persistence(#[from] DbError),
}

impl StoreError {
    /// Whether the error is a lookup miss.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<NetworkError> for StoreError {
    fn from(err: NetworkError) -> Self {
        if err.is_not_found() {
            Self::NotFound(err)
        } else {
            Self::Construction(err)
        }
    }
}
