//! Client configuration and endpoint derivation.

use std::time::Duration;

use parley_protocol::ConversationId;
use reqwest::Url;

use crate::{OverflowPolicy, SessionError};

pub const DEFAULT_SERVER_BASE_URL: &str = "http://127.0.0.1:8080/api/v1";
const CONTROL_SOCKET_PATH: &str = "ws/convid";
const DATA_SOCKET_PATH: &str = "ws/message";
const UPLOAD_PATH: &str = "upload";
const ASSET_PATH: &str = "files";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Runtime configuration for one chat session.
pub struct ClientConfig {
    pub server_base_url: String,
    pub self_user_id: i64,
    pub queue_capacity: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    /// Zero disables the connect timeout.
    pub connect_timeout_ms: u64,
    /// Zero disables the upload timeout.
    pub upload_timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(server_base_url: impl Into<String>, self_user_id: i64) -> Self {
        Self {
            server_base_url: server_base_url.into(),
            self_user_id,
            queue_capacity: None,
            overflow_policy: OverflowPolicy::default(),
            connect_timeout_ms: 0,
            upload_timeout_ms: 0,
        }
    }

    fn http_base(&self) -> &str {
        self.server_base_url.trim().trim_end_matches('/')
    }

    /// Maps the HTTP base URL onto its websocket scheme.
    pub fn websocket_base_url(&self) -> Result<String, SessionError> {
        let base = self.http_base();
        if let Some(rest) = base.strip_prefix("https://") {
            return Ok(format!("wss://{rest}"));
        }
        if let Some(rest) = base.strip_prefix("http://") {
            return Ok(format!("ws://{rest}"));
        }
        if base.starts_with("ws://") || base.starts_with("wss://") {
            return Ok(base.to_string());
        }
        Err(SessionError::InvalidConfig(format!(
            "server base url '{}' must start with http://, https://, ws:// or wss://",
            self.server_base_url
        )))
    }

    pub fn control_socket_url(&self) -> Result<String, SessionError> {
        Ok(format!(
            "{}/{CONTROL_SOCKET_PATH}",
            self.websocket_base_url()?
        ))
    }

    pub fn data_socket_url(&self, conversation: &ConversationId) -> Result<String, SessionError> {
        let raw = format!("{}/{DATA_SOCKET_PATH}", self.websocket_base_url()?);
        let mut url = Url::parse(&raw).map_err(|error| {
            SessionError::InvalidConfig(format!("invalid data socket url '{raw}': {error}"))
        })?;
        url.query_pairs_mut()
            .append_pair("conv_id", &conversation.to_string());
        Ok(url.to_string())
    }

    pub fn upload_url(&self) -> String {
        format!("{}/{UPLOAD_PATH}", self.http_base())
    }

    pub fn asset_base_url(&self) -> String {
        format!("{}/{ASSET_PATH}", self.http_base())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }

    pub fn upload_timeout(&self) -> Option<Duration> {
        (self.upload_timeout_ms > 0).then(|| Duration::from_millis(self.upload_timeout_ms))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_BASE_URL, 0)
    }
}
