use parley_protocol::ConversationId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `SessionError` values.
///
/// None of these are retried; each failed operation is reported once.
pub enum SessionError {
    #[error("control channel is closed")]
    ChannelClosed,
    #[error("data channel is not open")]
    ChannelNotOpen,
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("upload finished after conversation {conversation} stopped being active")]
    StaleChannel { conversation: ConversationId },
    #[error("control request queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },
    #[error("message text is empty")]
    EmptyMessage,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}
