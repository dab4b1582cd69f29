//! Command layer for Muster: keyword routing over inbound chat messages,
//! short-lived data-collection conversations, authorization guards, and the
//! interactive-callback dispatcher.
//!
//! This layer owns everything user-facing around the event session: it
//! resolves the tenant through the registry, checks state and authorship,
//! runs the create/edit conversations, and turns session errors into chat
//! replies. The session itself never talks to end users except when its
//! timers fire.

mod conversations;
mod parse;
mod router;


pub use conversations::{Completion, ConversationOutcome};
pub use parse::{
    classify, extract_channel_refs, extract_user_mentions, CommandKind, EditKind,
    FixedFormatParser,
};
pub use router::{ensure_creator, CommandRouter, CANCEL_CALLBACK_ID};
