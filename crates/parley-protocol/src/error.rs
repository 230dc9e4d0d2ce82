use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates decoding failures for chat server frames.
pub enum ProtocolError {
    #[error("invalid frame json: {0}")]
    InvalidJson(String),
    #[error("frame field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("invalid asset reference '{raw}': {reason}")]
    InvalidAssetReference { raw: String, reason: &'static str },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidJson(error.to_string())
    }
}
