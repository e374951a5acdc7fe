//! Replica convergence for the Roadwatch store.
//!
//! A surface write is sent as a command to the replica group; exactly one
//! replica makes it durable and broadcasts an event, and every replica
//! (the committing one included) applies that event to its in-memory
//! network.
//!
//! # Modules
//!
//! - [`bus`] -- [`MessageBus`] over NATS or in-process channels
//! - [`handlers`] -- Command and event handlers
//! - [`replica`] -- The long-running command and event loops
//! - [`local`] -- In-process bus
//! - [`nats`] -- NATS client wrapper
//! - [`error`] -- [`MessagingError`]

pub mod bus;
pub mod error;
pub mod handlers;
pub mod local;
pub mod nats;
pub mod replica;

pub use bus::MessageBus;
pub use error::MessagingError;
pub use handlers::{handle_command, handle_event};
pub use local::LocalBus;
pub use nats::NatsClient;
pub use replica::{Replica, ReplicaHandle};
