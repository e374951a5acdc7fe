//! Error types for the service binary.
//!
//! [`ServerError`] wraps every failure that can stop startup or end the
//! service, so `main` can propagate with `?`.

/// Top-level error for the service binary.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: roadwatch_core::ConfigError,
    },

    /// The seed file could not be opened.
    #[error("cannot open seed file {path}: {source}")]
    SeedFile {
        /// Configured seed path.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The seed data did not form a valid road network.
    #[error("road network error: {source}")]
    Network {
        /// The underlying network error.
        #[from]
        source: roadwatch_geo::NetworkError,
    },

    /// Connecting to or migrating the database failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: roadwatch_db::DbError,
    },

    /// Restoring durable state failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: roadwatch_core::StoreError,
    },

    /// The message bus could not be set up.
    #[error("messaging error: {source}")]
    Messaging {
        /// The underlying messaging error.
        #[from]
        source: roadwatch_messaging::MessagingError,
    },

    /// The HTTP server failed.
    #[error("api error: {source}")]
    Api {
        /// The underlying server error.
        #[from]
        source: roadwatch_api::ServerError,
    },
}
