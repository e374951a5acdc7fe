//! NATS transport for commands and events.
//!
//! Commands use request/reply on the command subject. Every replica joins
//! the same queue group there, so NATS hands each command to exactly one of
//! them. Events go out on the event subject with a plain subscription, so
//! every replica, including the publisher, sees each one.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::MessagingError;

/// NATS client wrapper for the convergence protocol.
#[derive(Clone)]
pub struct NatsClient {
    client: async_nats::Client,
}

impl NatsClient {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if the connection cannot be
    /// established.
    pub async fn connect(url: &str) -> Result<Self, MessagingError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| MessagingError::Transport(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// The underlying client, for replying to requests.
    pub const fn inner(&self) -> &async_nats::Client {
        &self.client
    }

    /// Publish raw bytes on `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if publishing fails.
    pub async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), MessagingError> {
        debug!(subject = subject, size = payload.len(), "publishing");
        self.client
            .publish(subject.to_owned(), payload.into())
            .await
            .map_err(|e| MessagingError::Transport(format!("failed to publish to {subject}: {e}")))
    }

    /// Send a request on `subject` and wait up to `wait` for the reply body.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if nobody answers, the request
    /// times out, or the connection fails.
    pub async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        wait: Duration,
    ) -> Result<Vec<u8>, MessagingError> {
        let reply = tokio::time::timeout(wait, self.client.request(subject.to_owned(), payload.into()))
            .await
            .map_err(|e| {
                MessagingError::Transport(format!("no reply on {subject} within {wait:?}: {e}"))
            })?
            .map_err(|e| MessagingError::Transport(format!("request on {subject} failed: {e}")))?;
        Ok(reply.payload.to_vec())
    }

    /// Subscribe to every message on `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if the subscription fails.
    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber, MessagingError> {
        let subscriber = self
            .client
            .subscribe(subject.to_owned())
            .await
            .map_err(|e| MessagingError::Transport(format!("failed to subscribe to {subject}: {e}")))?;
        info!(subject = subject, "subscribed");
        Ok(subscriber)
    }

    /// Join `group` on `subject`; each message goes to one group member.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingError::Transport`] if the subscription fails.
    pub async fn queue_subscribe(
        &self,
        subject: &str,
        group: &str,
    ) -> Result<async_nats::Subscriber, MessagingError> {
        let subscriber = self
            .client
            .queue_subscribe(subject.to_owned(), group.to_owned())
            .await
            .map_err(|e| {
                MessagingError::Transport(format!("failed to join {group} on {subject}: {e}"))
            })?;
        info!(subject = subject, group = group, "joined queue group");
        Ok(subscriber)
    }
}

impl std::fmt::Debug for NatsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsClient")
            .field("connected", &true)
            .finish()
    }
}
