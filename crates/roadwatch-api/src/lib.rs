//! HTTP API for the Roadwatch road network store.
//!
//! Exposes spatial reads over roads and segments, surface writes (sent as
//! commands over the message bus) and the traffic-flow and road-surface
//! observation logs.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
