use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
/// Server-assigned identifier grouping one message stream.
///
/// One-to-one conversations resolve to integers; group conversations may use
/// any identifier the server hands out, so opaque strings are accepted too.
pub enum ConversationId {
    Numeric(i64),
    Opaque(String),
}

impl ConversationId {
    /// Zero and blank identifiers are placeholders, never real conversations.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Numeric(value) => *value != 0,
            Self::Opaque(value) => !value.trim().is_empty(),
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(value) => write!(f, "{value}"),
            Self::Opaque(value) => f.write_str(value),
        }
    }
}

impl From<i64> for ConversationId {
    fn from(value: i64) -> Self {
        Self::Numeric(value)
    }
}

impl FromStr for ConversationId {
    type Err = ProtocolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::InvalidField {
                field: "conv_id",
                reason: "conversation id must be non-empty".to_string(),
            });
        }
        let id = match trimmed.parse::<i64>() {
            Ok(numeric) => Self::Numeric(numeric),
            Err(_) => Self::Opaque(trimmed.to_string()),
        };
        if !id.is_valid() {
            return Err(ProtocolError::InvalidField {
                field: "conv_id",
                reason: "conversation id must be non-zero".to_string(),
            });
        }
        Ok(id)
    }
}
