//! Keyword classification, mention extraction, and fixed-format date parsing.

use chrono::{NaiveDate, NaiveDateTime};
use muster_contract::{DateTimeParser, ParseError};
use regex::Regex;

/// What an inbound message asks for. Classification is keyword-substring
/// based, case-insensitive, first matching group wins; group order is load
/// bearing, so phrases like "not attending" resolve as an RSVP-no before
/// "attending" can mean the attendee list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Edit group; `None` when an edit keyword like "update" matched but no
    /// specific field keyword did (the request is silently dropped after the
    /// guards run).
    Edit(Option<EditKind>),
    Create,
    Invite,
    Cancel,
    Upcoming,
    RsvpNo,
    RsvpYes,
    Attendees,
    Help,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `EditKind` values.
pub enum EditKind {
    Reschedule,
    Rename,
    ChangeVenue,
}

const EDIT_KEYWORDS: [&str; 5] = ["reschedule", "rename", "change", "venue", "update"];
const CREATE_KEYWORDS: [&str; 6] = ["schedule", "set up", "setup", "create", "new", "book"];
const INVITE_KEYWORDS: [&str; 2] = ["invite", "invitations"];
const UPCOMING_KEYWORDS: [&str; 4] = ["upcoming", "events", "happening", "list"];
const RSVP_NO_KEYWORDS: [&str; 9] = [
    "remove",
    "no",
    "nah",
    "nope",
    "not attending",
    "not coming",
    "won't be coming",
    "won't be attending",
    "count me out",
];
const RSVP_YES_KEYWORDS: [&str; 14] = [
    "add",
    "yes",
    "yep",
    "yea",
    "ya",
    "sure",
    "ok",
    "yeah",
    "yah",
    "coming",
    "i'm in",
    "i'll be there",
    "be attending",
    "count me in",
];
const ATTENDEES_KEYWORDS: [&str; 3] = ["attendees", "attendance", "attending"];
const HELP_KEYWORDS: [&str; 3] = ["help", "hello", "hi"];

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}

/// Classifies an inbound message's text.
pub fn classify(text: &str) -> CommandKind {
    let text = text.to_lowercase();
    if contains_any(&text, &EDIT_KEYWORDS) {
        let edit = if text.contains("reschedule") {
            Some(EditKind::Reschedule)
        } else if text.contains("rename") {
            Some(EditKind::Rename)
        } else if text.contains("venue") {
            Some(EditKind::ChangeVenue)
        } else {
            None
        };
        return CommandKind::Edit(edit);
    }
    if contains_any(&text, &CREATE_KEYWORDS) {
        return CommandKind::Create;
    }
    if contains_any(&text, &INVITE_KEYWORDS) {
        return CommandKind::Invite;
    }
    if text.contains("cancel") {
        return CommandKind::Cancel;
    }
    if contains_any(&text, &UPCOMING_KEYWORDS) {
        return CommandKind::Upcoming;
    }
    if contains_any(&text, &RSVP_NO_KEYWORDS) {
        return CommandKind::RsvpNo;
    }
    if contains_any(&text, &RSVP_YES_KEYWORDS) {
        return CommandKind::RsvpYes;
    }
    if contains_any(&text, &ATTENDEES_KEYWORDS) {
        return CommandKind::Attendees;
    }
    if contains_any(&text, &HELP_KEYWORDS) {
        return CommandKind::Help;
    }
    CommandKind::Unknown
}

/// Compiled mention patterns shared by the router.
pub(crate) struct MentionPatterns {
    user: Regex,
    channel: Regex,
}

impl MentionPatterns {
    pub(crate) fn new() -> Self {
        Self {
            user: Regex::new(r"<@([A-Z0-9]{9})>").expect("user mention pattern"),
            channel: Regex::new(r"<#([A-Z0-9]{9})\|([A-Za-z0-9_-]+)>").expect("channel pattern"),
        }
    }

    pub(crate) fn users(&self, text: &str) -> Vec<String> {
        self.user
            .captures_iter(text)
            .map(|capture| capture[1].to_string())
            .collect()
    }

    pub(crate) fn channels(&self, text: &str) -> Vec<String> {
        self.channel
            .captures_iter(text)
            .map(|capture| capture[1].to_string())
            .collect()
    }
}

/// Extracts `<@USERID>` user references from a message.
pub fn extract_user_mentions(text: &str) -> Vec<String> {
    MentionPatterns::new().users(text)
}

/// Extracts `<#CHANNELID|name>` channel references from a message.
pub fn extract_channel_refs(text: &str) -> Vec<String> {
    MentionPatterns::new().channels(text)
}

/// Fixed-format date parser for hosts without a natural-language parser.
/// Accepts a handful of explicit formats and treats everything else as a
/// retryable `Unparseable` input error. Naive inputs are read as UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedFormatParser;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d %B %Y %H:%M",
];

impl DateTimeParser for FixedFormatParser {
    fn parse(&self, text: &str) -> Result<u64, ParseError> {
        let trimmed = text.trim();
        for format in DATETIME_FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
                let millis = parsed.and_utc().timestamp_millis();
                return u64::try_from(millis).map_err(|_| ParseError::Unparseable {
                    input: text.to_string(),
                });
            }
        }
        // Date-only inputs land on midnight.
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            let millis = parsed
                .and_hms_opt(0, 0, 0)
                .map(|at| at.and_utc().timestamp_millis())
                .unwrap_or_default();
            return u64::try_from(millis).map_err(|_| ParseError::Unparseable {
                input: text.to_string(),
            });
        }
        Err(ParseError::Unparseable {
            input: text.to_string(),
        })
    }
}
