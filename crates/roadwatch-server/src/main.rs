//! Roadwatch service binary.
//!
//! Seeds the road network, restores durable surface state, joins the
//! replica group on the message bus and serves the HTTP API.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `roadwatch-config.yaml` plus environment
//! 2. Initialize structured logging (tracing)
//! 3. Build the road network from the seed file (fatal on bad data)
//! 4. Select persistence (`PostgreSQL` or memory), run migrations
//! 5. Restore the latest durable surface of every segment
//! 6. Select the message bus (NATS or in-process) and start the replica
//! 7. Serve the HTTP API

mod error;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use roadwatch_api::{AppState, ServerConfig};
use roadwatch_core::config::{DEFAULT_CONFIG_FILE, LoggingConfig};
use roadwatch_core::{Datastore, ServiceConfig};
use roadwatch_db::{Persistence, PostgresPool};
use roadwatch_geo::RoadNetwork;
use roadwatch_messaging::{LocalBus, MessageBus, NatsClient, Replica};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any startup step fails or the HTTP server stops
/// with an error.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = ServiceConfig::load(Path::new(DEFAULT_CONFIG_FILE))?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        instance_id = %config.service.instance_id,
        api_port = config.api.port,
        "roadwatch starting"
    );

    run(config).await?;
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: ServiceConfig) -> Result<(), ServerError> {
    // 3. Build the road network.
    let network = load_network(&config)?;

    // 4. Persistence.
    let persistence = connect_persistence(&config).await?;
    persistence.run_migrations().await?;
    let store = Arc::new(Datastore::new(network, persistence));

    // 5. Restore durable surface state.
    let restored = store.restore_surface_state().await?;
    info!(restored, "surface state restored");

    // 6. Message bus and replica loops.
    let bus = connect_bus(&config).await?;
    let replica = Replica::new(Arc::clone(&store), bus.clone(), config.service.instance_id.clone())
        .start()
        .await?;

    // 7. HTTP API.
    let state = Arc::new(AppState::new(
        Arc::clone(&store),
        bus,
        config.service.instance_id.clone(),
    ));
    let result = roadwatch_api::start_server(&ServerConfig::from(&config.api), state).await;

    replica.abort();
    store.persistence().close().await;
    info!("roadwatch stopped");
    result.map_err(ServerError::from)
}

fn load_network(config: &ServiceConfig) -> Result<RoadNetwork, ServerError> {
    let Some(path) = config.seed.path() else {
        warn!("no seed file configured, starting with an empty road network");
        return Ok(RoadNetwork::empty());
    };

    info!(path = %path.display(), "loading road network seed");
    let file = File::open(path).map_err(|source| ServerError::SeedFile {
        path: path.display().to_string(),
        source,
    })?;
    Ok(RoadNetwork::from_seed(BufReader::new(file))?)
}

async fn connect_persistence(config: &ServiceConfig) -> Result<Persistence, ServerError> {
    let Some(url) = config.infrastructure.postgres_url() else {
        warn!("no database configured, surface history is kept in memory only");
        return Ok(Persistence::memory());
    };

    let pool = PostgresPool::connect(url, config.infrastructure.max_connections).await?;
    info!(persistence = "postgres", "persistence selected");
    Ok(Persistence::Postgres(pool))
}

async fn connect_bus(config: &ServiceConfig) -> Result<MessageBus, ServerError> {
    let messaging = config.messaging.clone();
    let Some(url) = config.infrastructure.nats_url() else {
        warn!("no NATS server configured, running as a single instance");
        return Ok(MessageBus::local(LocalBus::new(), messaging));
    };

    let client = NatsClient::connect(url).await?;
    info!(
        command_subject = %messaging.command_subject,
        event_subject = %messaging.event_subject,
        queue_group = %messaging.queue_group,
        "message bus selected"
    );
    Ok(MessageBus::nats(client, messaging))
}
