//! Shared contract types and external-collaborator traits for Muster.
//!
//! Defines the event value object, the persisted tenant record schema, the
//! display message model carried to chat transports, and the seams the core
//! depends on: chat delivery, durable storage, and free-text date parsing.

mod event;
mod message;
mod traits;

pub use event::{BotCredentials, Event, PersistedRecord};
pub use message::{
    ActionConfirm, ActionStyle, Attachment, AttachmentField, InboundKind, InboundMessage,
    InteractiveAction, Message, MessageAction,
};
pub use traits::{ChatTransport, DateTimeParser, ParseError, PersistenceGateway, PrivateExchange};
