//! Frames exchanged over the control socket.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{ConversationId, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Request asking the server for the conversation shared with `target_id`.
pub struct ControlRequest {
    pub target_id: i64,
}

impl ControlRequest {
    pub fn new(target_id: i64) -> Self {
        Self { target_id }
    }

    pub fn encode(&self) -> String {
        json!({ "target_id": self.target_id }).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Decoded inbound control frame.
pub enum ControlFrame {
    Resolved(ConversationId),
    Rejected(String),
    Unrecognized,
}

#[derive(Debug, Deserialize)]
struct RawControlFrame {
    #[serde(default)]
    conv_id: Option<ConversationId>,
    #[serde(default)]
    error: Option<String>,
}

pub fn parse_control_frame(raw: &str) -> Result<ControlFrame, ProtocolError> {
    let frame = serde_json::from_str::<RawControlFrame>(raw)?;
    if let Some(conversation) = frame.conv_id.filter(ConversationId::is_valid) {
        return Ok(ControlFrame::Resolved(conversation));
    }
    match frame.error.map(|error| error.trim().to_string()) {
        Some(error) if !error.is_empty() => Ok(ControlFrame::Rejected(error)),
        _ => Ok(ControlFrame::Unrecognized),
    }
}
