#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_protocol::{
    parse_chat_event, parse_control_frame, parse_outbound_chat_frame, AssetReference,
    ControlFrame,
};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    if let Ok(ControlFrame::Resolved(conversation)) = parse_control_frame(&raw) {
        assert!(conversation.is_valid());
    }

    if let Ok(event) = parse_chat_event(&raw) {
        let reparsed = parse_chat_event(&event.encode()).expect("encoded event decodes");
        assert_eq!(reparsed, event);
    }

    if let Ok(frame) = parse_outbound_chat_frame(&raw) {
        assert!(!frame.text.trim().is_empty());
    }

    if let Ok(reference) = AssetReference::parse(&raw) {
        assert!(!reference.asset_id.trim().is_empty());
        assert!(!reference.display_name.is_empty());
    }
});
