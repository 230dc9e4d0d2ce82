//! Frames exchanged over a conversation's data socket.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::{AssetReference, ProtocolError};

pub const CHAT_KIND_TEXT: u8 = 0;
pub const CHAT_KIND_IMAGE: u8 = 1;
pub const CHAT_KIND_FILE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Discriminant carried by every chat frame.
pub enum ChatEventKind {
    Text,
    Image,
    File,
}

impl ChatEventKind {
    /// Unknown discriminants fall back to a downloadable file.
    pub fn from_wire(value: i64) -> Self {
        match value {
            0 => Self::Text,
            1 => Self::Image,
            _ => Self::File,
        }
    }

    pub fn as_wire(self) -> u8 {
        match self {
            Self::Text => CHAT_KIND_TEXT,
            Self::Image => CHAT_KIND_IMAGE,
            Self::File => CHAT_KIND_FILE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Chat event delivered by the server on a data socket.
pub struct ChatEvent {
    pub author_id: i64,
    pub author_name: String,
    pub timestamp: String,
    pub kind: ChatEventKind,
    pub payload: String,
}

impl ChatEvent {
    pub fn encode(&self) -> String {
        json!({
            "user_id": self.author_id,
            "user_name": self.author_name,
            "time": self.timestamp,
            "text": self.payload,
            "type": self.kind.as_wire(),
        })
        .to_string()
    }
}

#[derive(Debug, Deserialize)]
struct RawChatEvent {
    #[serde(default)]
    user_id: i64,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    time: String,
    text: Option<String>,
    #[serde(default, rename = "type")]
    kind: i64,
}

pub fn parse_chat_event(raw: &str) -> Result<ChatEvent, ProtocolError> {
    let event = serde_json::from_str::<RawChatEvent>(raw)?;
    let payload = event.text.ok_or_else(|| ProtocolError::InvalidField {
        field: "text",
        reason: "chat event is missing text".to_string(),
    })?;
    Ok(ChatEvent {
        author_id: event.user_id,
        author_name: event.user_name,
        timestamp: event.time,
        kind: ChatEventKind::from_wire(event.kind),
        payload,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
/// Frame the client writes to a data socket. Plain text omits `type`.
pub struct OutboundChatFrame {
    pub text: String,
    #[serde(default, rename = "type")]
    pub kind: Option<u8>,
}

impl OutboundChatFrame {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
        }
    }

    pub fn asset(reference: &AssetReference, kind: ChatEventKind) -> Self {
        Self {
            text: reference.encode(),
            kind: Some(kind.as_wire()),
        }
    }

    pub fn event_kind(&self) -> ChatEventKind {
        self.kind
            .map(|kind| ChatEventKind::from_wire(i64::from(kind)))
            .unwrap_or(ChatEventKind::Text)
    }

    pub fn encode(&self) -> String {
        let mut frame = json!({ "text": self.text });
        if let Some(kind) = self.kind {
            frame["type"] = Value::from(kind);
        }
        frame.to_string()
    }
}

pub fn parse_outbound_chat_frame(raw: &str) -> Result<OutboundChatFrame, ProtocolError> {
    let frame = serde_json::from_str::<OutboundChatFrame>(raw)?;
    if frame.text.trim().is_empty() {
        return Err(ProtocolError::InvalidField {
            field: "text",
            reason: "chat frame text must be non-empty".to_string(),
        });
    }
    Ok(frame)
}
