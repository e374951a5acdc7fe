//! Shared application state for the HTTP API.

use std::sync::Arc;

use roadwatch_core::Datastore;
use roadwatch_messaging::MessageBus;

/// What every handler gets: the local store and the bus writes go through.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The local replica's store. Reads are served from here.
    pub store: Arc<Datastore>,
    /// Surface writes are sent as commands on this bus.
    pub bus: MessageBus,
    /// Name of this instance, reported by the health check.
    pub instance_id: String,
}

impl AppState {
    /// Bundle a store and a bus.
    pub fn new(store: Arc<Datastore>, bus: MessageBus, instance_id: impl Into<String>) -> Self {
        Self {
            store,
            bus,
            instance_id: instance_id.into(),
        }
    }
}
