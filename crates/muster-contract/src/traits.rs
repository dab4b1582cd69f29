use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::event::PersistedRecord;
use crate::message::{InboundMessage, Message};

/// Delivery seam to the chat service. Implementations own addressing,
/// threading, and retry; the core only asks for messages to be delivered.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Replies in the context the inbound message arrived in.
    async fn reply(&self, context: &InboundMessage, message: &Message) -> Result<()>;

    /// Delivers directly to one user.
    async fn send_to_user(&self, user_id: &str, message: &Message) -> Result<()>;

    /// Posts to a channel.
    async fn send_to_channel(&self, channel_id: &str, message: &Message) -> Result<()>;

    /// Opens a one-on-one exchange with a user, failing when the user cannot
    /// be engaged (unknown id, closed DMs).
    async fn start_private_exchange(&self, user_id: &str) -> Result<Box<dyn PrivateExchange>>;
}

/// A live one-on-one exchange opened through `ChatTransport`.
#[async_trait]
pub trait PrivateExchange: Send + Sync {
    async fn say(&self, message: &Message) -> Result<()>;
}

/// Durable key-value store keyed by tenant id; the system of record for
/// event state. Loads return `None` for unknown tenants.
pub trait PersistenceGateway: Send + Sync {
    fn load(&self, tenant_id: &str) -> Result<Option<PersistedRecord>>;
    fn save(&self, record: &PersistedRecord) -> Result<()>;
}

#[derive(Debug, Error)]
/// Failure modes of free-text date interpretation.
pub enum ParseError {
    #[error("could not interpret '{input}' as a date and time")]
    Unparseable { input: String },
}

/// Turns free text like "next Tuesday at 3pm" into an absolute timestamp.
/// Parser failures are retryable input errors, never core faults.
pub trait DateTimeParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<u64, ParseError>;
}
