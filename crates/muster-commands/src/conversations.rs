//! Short-lived data-collection conversations.
//!
//! Each flow lives for one (tenant, user, operation) and only calls into the
//! event session once a value is fully collected, so the core never sees a
//! partial mutation. Saying `exit` abandons a flow; an unparseable date
//! repeats the same step.

use muster_contract::{DateTimeParser, Event};

use crate::parse::EditKind;

const DATE_RETRY_TEXT: &str =
    "Sorry, I didn't understand that. Try say something like `next Tuesday at 3pm`.";
const NAME_RETRY_TEXT: &str = "An event needs a name. What should I call it?";
const CREATE_ABANDON_TEXT: &str = "Okay, no hard feelings!";
const EDIT_ABANDON_TEXT: &str = "Next time, perhaps.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreateStage {
    Name,
    Venue,
    When,
}

#[derive(Debug, Clone)]
pub(crate) enum Flow {
    Create { draft: Event, stage: CreateStage },
    Edit(EditKind),
}

impl Flow {
    pub(crate) fn create(creator: &str) -> Self {
        Self::Create {
            draft: Event {
                creator: creator.to_string(),
                attendees: vec![creator.to_string()],
                ..Event::empty()
            },
            stage: CreateStage::Name,
        }
    }

    pub(crate) fn edit(kind: EditKind) -> Self {
        Self::Edit(kind)
    }
}

/// The collected value a finished flow hands back for a single atomic
/// session call.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Create(Event),
    Rename(String),
    ChangeVenue(String),
    Reschedule(u64),
}

/// What the router should do after feeding one response into a flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationOutcome {
    /// Flow continues; send this prompt next.
    Prompt(String),
    /// Flow finished; apply the collected value.
    Complete(Completion),
    /// User said `exit`; send this farewell.
    Abandoned(&'static str),
    /// Input not understood; send this and repeat the same step.
    Retry(&'static str),
}

impl Flow {
    /// Feeds one free-text response into the flow.
    pub(crate) fn advance(
        &mut self,
        text: &str,
        parser: &dyn DateTimeParser,
    ) -> ConversationOutcome {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return ConversationOutcome::Abandoned(match self {
                Flow::Create { .. } => CREATE_ABANDON_TEXT,
                Flow::Edit(_) => EDIT_ABANDON_TEXT,
            });
        }
        match self {
            Flow::Create { draft, stage } => match stage {
                CreateStage::Name => {
                    if trimmed.is_empty() {
                        return ConversationOutcome::Retry(NAME_RETRY_TEXT);
                    }
                    draft.name = trimmed.to_string();
                    *stage = CreateStage::Venue;
                    ConversationOutcome::Prompt("Where will it be held?".to_string())
                }
                CreateStage::Venue => {
                    draft.venue = trimmed.to_string();
                    *stage = CreateStage::When;
                    ConversationOutcome::Prompt(format!(
                        "And finally, when will *{}* be running? You can say something like `next Tuesday at 3pm`.",
                        draft.name
                    ))
                }
                CreateStage::When => match parser.parse(trimmed) {
                    Ok(start_unix_ms) => {
                        draft.start_unix_ms = start_unix_ms;
                        ConversationOutcome::Complete(Completion::Create(draft.clone()))
                    }
                    Err(_) => ConversationOutcome::Retry(DATE_RETRY_TEXT),
                },
            },
            Flow::Edit(kind) => match kind {
                EditKind::Rename => {
                    if trimmed.is_empty() {
                        ConversationOutcome::Retry(NAME_RETRY_TEXT)
                    } else {
                        ConversationOutcome::Complete(Completion::Rename(trimmed.to_string()))
                    }
                }
                EditKind::ChangeVenue => {
                    ConversationOutcome::Complete(Completion::ChangeVenue(trimmed.to_string()))
                }
                EditKind::Reschedule => match parser.parse(trimmed) {
                    Ok(start_unix_ms) => {
                        ConversationOutcome::Complete(Completion::Reschedule(start_unix_ms))
                    }
                    Err(_) => ConversationOutcome::Retry(DATE_RETRY_TEXT),
                },
            },
        }
    }
}
