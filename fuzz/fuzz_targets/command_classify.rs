#![no_main]

use libfuzzer_sys::fuzz_target;
use muster_commands::{classify, extract_channel_refs, extract_user_mentions, CommandKind};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let kind = classify(&text);
    if text.to_lowercase().contains("reschedule") {
        assert!(matches!(kind, CommandKind::Edit(_)));
    }
    for user in extract_user_mentions(&text) {
        assert_eq!(user.len(), 9);
    }
    for channel in extract_channel_refs(&text) {
        assert_eq!(channel.len(), 9);
    }
});
