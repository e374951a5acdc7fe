//! The message bus the replica loops run on.
//!
//! [`MessageBus`] dispatches between NATS (multi-instance deployments) and
//! the in-process [`LocalBus`] (single instance, tests). Both give the same
//! guarantees: a command is answered by exactly one replica, and an event
//! reaches every subscribed replica.

use std::time::Duration;

use futures::StreamExt;
use roadwatch_core::config::MessagingConfig;
use roadwatch_types::{CommandReply, RoadSegmentSurfaceUpdated, UpdateRoadSegmentSurface};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

use crate::error::MessagingError;
use crate::local::{CommandReceiver, LocalBus};
use crate::nats::NatsClient;

/// Transport for commands and events.
#[derive(Debug, Clone)]
pub enum MessageBus {
    /// NATS subjects from the messaging config.
    Nats {
        /// Connected client.
        client: NatsClient,
        /// Subjects, queue group and request timeout.
        config: MessagingConfig,
    },
    /// Tokio channels inside this process.
    Local {
        /// Shared bus.
        bus: LocalBus,
        /// Request timeout is taken from here; subjects are unused.
        config: MessagingConfig,
    },
}

impl MessageBus {
    /// A bus backed by a NATS connection.
    pub const fn nats(client: NatsClient, config: MessagingConfig) -> Self {
        Self::Nats { client, config }
    }

    /// A bus backed by in-process channels.
    pub const fn local(bus: LocalBus, config: MessagingConfig) -> Self {
        Self::Local { bus, config }
    }

    /// Short backend name for logs and the health check.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Nats { .. } => "nats",
            Self::Local { .. } => "local",
        }
    }

    const fn config(&self) -> &MessagingConfig {
        match self {
            Self::Nats { config, .. } | Self::Local { config, .. } => config,
        }
    }

    /// How long [`note_to_self`](Self::note_to_self) waits for a reply.
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.config().request_timeout_ms)
    }

    /// Broadcast a committed update to every replica.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if the publish fails.
    pub async fn publish_event(&self, event: &RoadSegmentSurfaceUpdated) -> Result<(), MessagingError> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| MessagingError::Decode(format!("failed to encode event: {e}")))?;
        match self {
            Self::Nats { client, config } => client.publish(&config.event_subject, payload).await,
            Self::Local { bus, .. } => {
                bus.publish(payload);
                Ok(())
            }
        }
    }

    /// Send a surface update command to the replica group and wait until
    /// one replica has made it durable.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::CommandRejected`] if the handling replica
    /// failed to commit, and [`MessagingError::Transport`] if nobody
    /// answered within the request timeout.
    pub async fn note_to_self(&self, command: &UpdateRoadSegmentSurface) -> Result<(), MessagingError> {
        let payload = serde_json::to_vec(command)
            .map_err(|e| MessagingError::Decode(format!("failed to encode command: {e}")))?;
        let wait = self.request_timeout();
        let answer = match self {
            Self::Nats { client, config } => {
                client.request(&config.command_subject, payload, wait).await?
            }
            Self::Local { bus, .. } => bus.request(payload, wait).await?,
        };

        let reply: CommandReply = serde_json::from_slice(&answer)
            .map_err(|e| MessagingError::Decode(format!("failed to decode command reply: {e}")))?;
        if reply.ok {
            debug!(segment_id = %command.id, "command committed");
            Ok(())
        } else {
            Err(MessagingError::CommandRejected(
                reply.error.unwrap_or_else(|| "unspecified failure".to_owned()),
            ))
        }
    }

    /// Start receiving every event published from now on.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if the subscription fails.
    pub async fn subscribe_events(&self) -> Result<EventSubscription, MessagingError> {
        match self {
            Self::Nats { client, config } => Ok(EventSubscription::Nats(
                client.subscribe(&config.event_subject).await?,
            )),
            Self::Local { bus, .. } => Ok(EventSubscription::Local(bus.subscribe_events())),
        }
    }

    /// Join the command handler group.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if the subscription fails.
    pub async fn subscribe_commands(&self) -> Result<CommandSubscription, MessagingError> {
        match self {
            Self::Nats { client, config } => Ok(CommandSubscription::Nats {
                client: client.clone(),
                subscriber: client
                    .queue_subscribe(&config.command_subject, &config.queue_group)
                    .await?,
            }),
            Self::Local { bus, .. } => Ok(CommandSubscription::Local(bus.command_receiver())),
        }
    }
}

/// Stream of encoded events.
#[derive(Debug)]
pub enum EventSubscription {
    /// Plain NATS subscription.
    Nats(async_nats::Subscriber),
    /// Broadcast receiver on the local bus.
    Local(broadcast::Receiver<Vec<u8>>),
}

impl EventSubscription {
    /// The next encoded event, or `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        match self {
            Self::Nats(subscriber) => subscriber.next().await.map(|m| m.payload.to_vec()),
            Self::Local(receiver) => loop {
                match receiver.recv().await {
                    Ok(payload) => return Some(payload),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event subscriber lagged, events dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
        }
    }
}

/// Stream of commands, each with a way to answer it.
#[derive(Debug)]
pub enum CommandSubscription {
    /// Queue-group subscription; replies go back through the client.
    Nats {
        /// Client used to publish replies.
        client: NatsClient,
        /// Queue subscription on the command subject.
        subscriber: async_nats::Subscriber,
    },
    /// Shared competing receiver on the local bus.
    Local(CommandReceiver),
}

impl CommandSubscription {
    /// The next command, or `None` once the bus is gone.
    ///
    /// NATS messages without a reply subject cannot be answered and are
    /// skipped.
    pub async fn next(&mut self) -> Option<IncomingCommand> {
        match self {
            Self::Nats { client, subscriber } => loop {
                let message = subscriber.next().await?;
                match message.reply {
                    Some(reply) => {
                        return Some(IncomingCommand {
                            payload: message.payload.to_vec(),
                            responder: Responder::Nats {
                                client: client.clone(),
                                reply: reply.to_string(),
                            },
                        });
                    }
                    None => {
                        warn!(subject = %message.subject, "command without reply subject, skipping");
                    }
                }
            },
            Self::Local(receiver) => {
                let command = receiver.lock().await.recv().await?;
                Some(IncomingCommand {
                    payload: command.payload,
                    responder: Responder::Local(command.reply),
                })
            }
        }
    }
}

/// A received command.
#[derive(Debug)]
pub struct IncomingCommand {
    /// Encoded [`UpdateRoadSegmentSurface`].
    pub payload: Vec<u8>,
    /// Answers the sender.
    pub responder: Responder,
}

/// Return path for a command reply.
#[derive(Debug)]
pub enum Responder {
    /// Publish on the request's reply subject.
    Nats {
        /// Client to publish with.
        client: NatsClient,
        /// Reply subject.
        reply: String,
    },
    /// Complete the requester's oneshot.
    Local(oneshot::Sender<Vec<u8>>),
}

impl Responder {
    /// Whether the requester has already stopped waiting for an answer.
    ///
    /// Only known for the in-process bus; a NATS requester is never
    /// reported as gone.
    pub fn is_abandoned(&self) -> bool {
        match self {
            Self::Nats { .. } => false,
            Self::Local(sender) => sender.is_closed(),
        }
    }

    /// Send `reply` back to whoever issued the command.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if the requester is gone or the
    /// publish fails.
    pub async fn respond(self, reply: &CommandReply) -> Result<(), MessagingError> {
        let payload = serde_json::to_vec(reply)
            .map_err(|e| MessagingError::Decode(format!("failed to encode reply: {e}")))?;
        match self {
            Self::Nats { client, reply } => client.publish(&reply, payload).await,
            Self::Local(sender) => sender.send(payload).map_err(|_unanswered| {
                MessagingError::Transport("requester stopped waiting for the reply".to_owned())
            }),
        }
    }
}
