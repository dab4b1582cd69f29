#![no_main]

use libfuzzer_sys::fuzz_target;
use muster_contract::Event;
use muster_template::{format_attendee_list, format_summary, render};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let event = Event {
        name: "Fuzz Night".to_string(),
        venue: "The Pit".to_string(),
        start_unix_ms: 1_772_550_245_000,
        attendees: vec!["UFUZZ0001".to_string()],
        creator: "UFUZZ0001".to_string(),
    };
    let rendered = render(&text, &event);
    if text.contains("{name}") {
        assert!(rendered.contains("Fuzz Night"));
    }
    let summary = format_summary(&text, &event, true);
    assert_eq!(summary.attachments.len(), 1);
    assert!(!format_attendee_list(&event).text.is_empty());
});
