//! Long-running replica loops.
//!
//! Every instance runs one [`Replica`]: a command loop that competes with
//! the other instances for commands, and an event loop that applies every
//! committed update to the local network.

use std::sync::Arc;

use roadwatch_core::Datastore;
use roadwatch_geo::ApplyOutcome;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{CommandSubscription, EventSubscription, MessageBus};
use crate::error::MessagingError;
use crate::handlers::{handle_command, handle_event};

/// One instance's participation in the convergence protocol.
#[derive(Debug, Clone)]
pub struct Replica {
    store: Arc<Datastore>,
    bus: MessageBus,
    instance_id: String,
}

impl Replica {
    /// Bind a store to a bus under `instance_id`.
    pub fn new(store: Arc<Datastore>, bus: MessageBus, instance_id: impl Into<String>) -> Self {
        Self {
            store,
            bus,
            instance_id: instance_id.into(),
        }
    }

    /// Instance name used in logs.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Subscribe to commands and events, then spawn both loops.
    ///
    /// The subscriptions exist before this returns, so any event published
    /// afterwards is seen by this replica.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if either subscription fails.
    pub async fn start(self) -> Result<ReplicaHandle, MessagingError> {
        let events = self.bus.subscribe_events().await?;
        let commands = self.bus.subscribe_commands().await?;
        info!(
            instance_id = %self.instance_id,
            bus = self.bus.kind(),
            "replica started, awaiting commands and events"
        );

        let command_task = tokio::spawn(run_commands(self.clone(), commands));
        let event_task = tokio::spawn(run_events(self, events));
        Ok(ReplicaHandle {
            commands: command_task,
            events: event_task,
        })
    }
}

/// Handles to a started replica's loops.
#[derive(Debug)]
pub struct ReplicaHandle {
    commands: JoinHandle<()>,
    events: JoinHandle<()>,
}

impl ReplicaHandle {
    /// Stop both loops.
    pub fn abort(&self) {
        self.commands.abort();
        self.events.abort();
    }

    /// Wait until both loops end, which happens when the bus goes away.
    pub async fn join(self) {
        if let Err(e) = self.commands.await {
            warn!(error = %e, "command loop ended abnormally");
        }
        if let Err(e) = self.events.await {
            warn!(error = %e, "event loop ended abnormally");
        }
    }
}

async fn run_commands(replica: Replica, mut commands: CommandSubscription) {
    while let Some(incoming) = commands.next().await {
        debug!(
            instance_id = %replica.instance_id,
            payload_size = incoming.payload.len(),
            "received command"
        );
        if incoming.responder.is_abandoned() {
            warn!(instance_id = %replica.instance_id, "requester gave up on command, skipping");
            continue;
        }
        let reply = handle_command(&replica.store, &replica.bus, &incoming.payload).await;
        if let Err(e) = incoming.responder.respond(&reply).await {
            warn!(instance_id = %replica.instance_id, error = %e, "failed to answer command");
        }
    }
    info!(instance_id = %replica.instance_id, "command subscription ended");
}

async fn run_events(replica: Replica, mut events: EventSubscription) {
    while let Some(payload) = events.next().await {
        match handle_event(&replica.store, &payload) {
            Ok(ApplyOutcome::Applied) => {
                debug!(instance_id = %replica.instance_id, "event applied");
            }
            Ok(ApplyOutcome::Stale) => {
                debug!(instance_id = %replica.instance_id, "stale event ignored");
            }
            Err(e) => {
                warn!(
                    instance_id = %replica.instance_id,
                    error = %e,
                    "failed to apply event, dropping"
                );
            }
        }
    }
    info!(instance_id = %replica.instance_id, "event subscription ended");
}
