//! Maps inbound chat events onto display records.

use std::fmt;

use parley_protocol::{AssetReference, ChatEvent, ChatEventKind};

use crate::ClientConfig;

const SELF_AUTHOR_LABEL: &str = "You";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBody {
    Text(String),
    InlineAsset {
        asset_id: String,
        url: String,
    },
    DownloadableAsset {
        asset_id: String,
        url: String,
        file_name: String,
        size_kb: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One rendered line of the conversation transcript.
pub struct DisplayRecord {
    pub author: String,
    pub from_self: bool,
    pub timestamp: String,
    pub body: DisplayBody,
}

impl DisplayRecord {
    pub fn kind(&self) -> ChatEventKind {
        match self.body {
            DisplayBody::Text(_) => ChatEventKind::Text,
            DisplayBody::InlineAsset { .. } => ChatEventKind::Image,
            DisplayBody::DownloadableAsset { .. } => ChatEventKind::File,
        }
    }
}

impl fmt::Display for DisplayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timestamp.is_empty() {
            write!(f, "{}: ", self.author)?;
        } else {
            write!(f, "[{}] {}: ", self.timestamp, self.author)?;
        }
        match &self.body {
            DisplayBody::Text(text) => f.write_str(text),
            DisplayBody::InlineAsset { url, .. } => write!(f, "[image] {url}"),
            DisplayBody::DownloadableAsset {
                url,
                file_name,
                size_kb: Some(size_kb),
                ..
            } => write!(f, "[file] {file_name} ({size_kb} KB) {url}"),
            DisplayBody::DownloadableAsset {
                url,
                file_name,
                size_kb: None,
                ..
            } => write!(f, "[file] {file_name} {url}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRenderer {
    self_user_id: i64,
    asset_base_url: String,
}

impl MessageRenderer {
    pub fn new(self_user_id: i64, asset_base_url: impl Into<String>) -> Self {
        Self {
            self_user_id,
            asset_base_url: asset_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.self_user_id, config.asset_base_url())
    }

    /// The event's discriminant alone picks the body; the payload never does.
    pub fn render(&self, event: &ChatEvent) -> DisplayRecord {
        let from_self = event.author_id == self.self_user_id;
        let author = if from_self {
            SELF_AUTHOR_LABEL.to_string()
        } else {
            event.author_name.clone()
        };
        let body = match event.kind {
            ChatEventKind::Text => DisplayBody::Text(event.payload.clone()),
            ChatEventKind::Image => {
                let asset_id = match AssetReference::parse(&event.payload) {
                    Ok(reference) => reference.asset_id,
                    Err(_) => event.payload.clone(),
                };
                DisplayBody::InlineAsset {
                    url: self.asset_url(&asset_id),
                    asset_id,
                }
            }
            ChatEventKind::File => match AssetReference::parse(&event.payload) {
                Ok(reference) => DisplayBody::DownloadableAsset {
                    url: self.asset_url(&reference.asset_id),
                    asset_id: reference.asset_id,
                    file_name: reference.display_name,
                    size_kb: Some(reference.size_kb),
                },
                Err(_) => DisplayBody::DownloadableAsset {
                    url: self.asset_url(&event.payload),
                    asset_id: event.payload.clone(),
                    file_name: event.payload.clone(),
                    size_kb: None,
                },
            },
        };
        DisplayRecord {
            author,
            from_self,
            timestamp: event.timestamp.clone(),
            body,
        }
    }

    fn asset_url(&self, asset_id: &str) -> String {
        format!("{}/{asset_id}", self.asset_base_url)
    }
}

#[cfg(test)]
mod tests {
    use parley_protocol::{ChatEvent, ChatEventKind};

    use super::{DisplayBody, MessageRenderer};
    use crate::ClientConfig;

    fn event(author_id: i64, kind: ChatEventKind, payload: &str) -> ChatEvent {
        ChatEvent {
            author_id,
            author_name: "mira".to_string(),
            timestamp: "2024-05-01 10:00:00".to_string(),
            kind,
            payload: payload.to_string(),
        }
    }

    fn renderer() -> MessageRenderer {
        MessageRenderer::from_config(&ClientConfig::new("http://chat.local/api/v1", 1))
    }

    #[test]
    fn unit_render_text_labels_self_author() {
        let record = renderer().render(&event(1, ChatEventKind::Text, "hello"));
        assert_eq!(record.author, "You");
        assert!(record.from_self);
        assert_eq!(record.body, DisplayBody::Text("hello".to_string()));
        assert_eq!(record.kind(), ChatEventKind::Text);
        assert_eq!(record.to_string(), "[2024-05-01 10:00:00] You: hello");
    }

    #[test]
    fn functional_render_image_points_at_asset_download_url() {
        let record = renderer().render(&event(2, ChatEventKind::Image, "abc.12kb.file.png"));
        assert_eq!(record.author, "mira");
        assert_eq!(
            record.body,
            DisplayBody::InlineAsset {
                asset_id: "abc".to_string(),
                url: "http://chat.local/api/v1/files/abc".to_string(),
            }
        );
    }

    #[test]
    fn functional_render_file_carries_name_and_size() {
        let record = renderer().render(&event(2, ChatEventKind::File, "abc.3kb.notes.v2.txt"));
        assert_eq!(
            record.body,
            DisplayBody::DownloadableAsset {
                asset_id: "abc".to_string(),
                url: "http://chat.local/api/v1/files/abc".to_string(),
                file_name: "notes.v2.txt".to_string(),
                size_kb: Some(3),
            }
        );
        assert_eq!(
            record.to_string(),
            "[2024-05-01 10:00:00] mira: [file] notes.v2.txt (3 KB) http://chat.local/api/v1/files/abc"
        );
    }

    #[test]
    fn regression_render_uses_discriminant_not_payload_shape() {
        let text = renderer().render(&event(2, ChatEventKind::Text, "abc.12kb.file.png"));
        assert_eq!(text.kind(), ChatEventKind::Text);

        let file = renderer().render(&event(2, ChatEventKind::File, "plain-id"));
        assert_eq!(
            file.body,
            DisplayBody::DownloadableAsset {
                asset_id: "plain-id".to_string(),
                url: "http://chat.local/api/v1/files/plain-id".to_string(),
                file_name: "plain-id".to_string(),
                size_kb: None,
            }
        );
    }
}
