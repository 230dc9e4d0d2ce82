#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_protocol::{parse_upload_error, parse_upload_response, ChatEventKind};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    if let Ok(result) = parse_upload_response(&raw) {
        assert_ne!(result.kind, ChatEventKind::Text);
        let announcement = result.announcement();
        assert_eq!(announcement.event_kind(), result.kind);
    }

    if let Some(error) = parse_upload_error(&raw) {
        assert!(!error.is_empty());
    }
});
