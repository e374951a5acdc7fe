//! The Roadwatch store: road network, surface state and observation logs
//! behind one interface.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `roadwatch-config.yaml`
//! - [`datastore`] -- [`Datastore`], the store interface collaborators use
//! - [`page`] -- Offset/limit pagination
//! - [`error`] -- [`StoreError`]

pub mod config;
pub mod datastore;
pub mod error;
pub mod page;

pub use config::{ConfigError, ServiceConfig};
pub use datastore::Datastore;
pub use error::StoreError;
pub use page::Page;
