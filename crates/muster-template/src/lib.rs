//! Message rendering for Muster: placeholder substitution over an event
//! snapshot plus the summary and attendee-list display builders.
//!
//! Substitution replaces only the first occurrence of each placeholder in the
//! text; repeated placeholders stay literal. Dates render in UTC with fixed
//! English formats.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use muster_contract::{Attachment, AttachmentField, Event, Message, MessageAction};


/// Accent color for summary attachments.
pub const SUMMARY_COLOR: &str = "#3AA3E3";

/// Response-group id the interactive dispatcher routes attendance buttons by.
pub const ATTENDANCE_CALLBACK_ID: &str = "attendance";

const PLACEHOLDERS: [&str; 6] = [
    "{name}",
    "{venue}",
    "{date}",
    "{time}",
    "{attendeeCount}",
    "{creator}",
];

/// Renders a user id in mention form.
pub fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

fn event_datetime(start_unix_ms: u64) -> DateTime<Utc> {
    let millis = i64::try_from(start_unix_ms).unwrap_or(i64::MAX);
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn ordinal_suffix(day: u32) -> &'static str {
    match day % 100 {
        11..=13 => "th",
        _ => match day % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    }
}

/// Formats an event date like `Tuesday, 3rd March, 2026`.
pub fn format_date(start_unix_ms: u64) -> String {
    let when = event_datetime(start_unix_ms);
    format!(
        "{}, {}{} {}, {}",
        when.format("%A"),
        when.day(),
        ordinal_suffix(when.day()),
        when.format("%B"),
        when.format("%Y")
    )
}

/// Formats an event time like `3:04:05 PM`.
pub fn format_time(start_unix_ms: u64) -> String {
    event_datetime(start_unix_ms)
        .format("%-I:%M:%S %p")
        .to_string()
}

fn placeholder_value(token: &str, event: &Event) -> String {
    match token {
        "{name}" => event.name.clone(),
        "{venue}" => event.venue.clone(),
        "{date}" => format_date(event.start_unix_ms),
        "{time}" => format_time(event.start_unix_ms),
        "{attendeeCount}" => event.attendees.len().to_string(),
        "{creator}" => mention(&event.creator),
        _ => token.to_string(),
    }
}

/// Substitutes the first occurrence of each event placeholder into `text`,
/// leaving everything else untouched.
pub fn render(text: &str, event: &Event) -> String {
    let mut rendered = text.to_string();
    for token in PLACEHOLDERS {
        if rendered.contains(token) {
            rendered = rendered.replacen(token, &placeholder_value(token, event), 1);
        }
    }
    rendered
}

fn attendance_actions() -> Vec<MessageAction> {
    vec![
        MessageAction::button("attending", ":white_check_mark: Yes, I'm In!"),
        MessageAction::button("not_attending", ":x: Sorry, Not Now"),
        MessageAction::button("refresh", ":arrows_counterclockwise: Refresh"),
    ]
}

/// Builds the event summary display: rendered body text plus an attachment
/// with the event name and its Date / Time / Venue / attendance fields.
/// `show_actions` attaches the attendance buttons routed by
/// [`ATTENDANCE_CALLBACK_ID`].
pub fn format_summary(text: &str, event: &Event, show_actions: bool) -> Message {
    let mut attachment = Attachment {
        title: "Event".to_string(),
        text: event.name.clone(),
        color: SUMMARY_COLOR.to_string(),
        fields: vec![
            AttachmentField {
                title: "Date".to_string(),
                value: format_date(event.start_unix_ms),
                short: true,
            },
            AttachmentField {
                title: "Time".to_string(),
                value: format_time(event.start_unix_ms),
                short: true,
            },
            AttachmentField {
                title: "Venue".to_string(),
                value: event.venue.clone(),
                short: true,
            },
            AttachmentField {
                title: "Attending So Far".to_string(),
                value: event.attendees.len().to_string(),
                short: true,
            },
        ],
        actions: Vec::new(),
        callback_id: None,
    };
    if show_actions {
        attachment.actions = attendance_actions();
        attachment.callback_id = Some(ATTENDANCE_CALLBACK_ID.to_string());
    }
    Message::plain(render(text, event)).with_attachment(attachment)
}

/// Builds the attendee list display: a "nobody attending" notice when empty,
/// else a 1-based numbered mention list.
pub fn format_attendee_list(event: &Event) -> Message {
    if event.attendees.is_empty() {
        return Message::plain(render("Nobody's attending *{name}* right now.", event));
    }
    let mut listing = String::new();
    for (index, attendee) in event.attendees.iter().enumerate() {
        listing.push_str(&format!("{}. {}\n", index + 1, mention(attendee)));
    }
    Message::plain(render(
        &format!("Here's a list of who's attending *{{name}}* so far:\n{listing}"),
        event,
    ))
}
