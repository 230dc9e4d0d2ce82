//! Upload endpoint response decoding.

use serde::Deserialize;

use crate::{AssetReference, ChatEventKind, OutboundChatFrame, ProtocolError, CHAT_KIND_FILE};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Metadata for one completed upload.
pub struct UploadResult {
    pub asset_id: String,
    pub size_kb: u64,
    pub display_name: String,
    pub kind: ChatEventKind,
}

impl UploadResult {
    pub fn asset_reference(&self) -> AssetReference {
        AssetReference {
            asset_id: self.asset_id.clone(),
            size_kb: self.size_kb,
            display_name: self.display_name.clone(),
        }
    }

    pub fn announcement(&self) -> OutboundChatFrame {
        OutboundChatFrame::asset(&self.asset_reference(), self.kind)
    }
}

#[derive(Debug, Deserialize)]
struct RawUploadResponse {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawUploadError {
    error: String,
}

/// Decodes a successful upload body.
///
/// Accepts both `{uuid, size, name, type}` and the compact `{uuid, type}` shape
/// where `uuid` already holds a full asset reference.
pub fn parse_upload_response(raw: &str) -> Result<UploadResult, ProtocolError> {
    let response = serde_json::from_str::<RawUploadResponse>(raw)?;
    let uuid = response
        .uuid
        .map(|uuid| uuid.trim().to_string())
        .filter(|uuid| !uuid.is_empty())
        .ok_or_else(|| ProtocolError::InvalidField {
            field: "uuid",
            reason: "upload response is missing uuid".to_string(),
        })?;
    // uploads are never announced as plain text
    let wire_kind = response.kind.unwrap_or(i64::from(CHAT_KIND_FILE));
    let kind = match ChatEventKind::from_wire(wire_kind) {
        ChatEventKind::Text => ChatEventKind::File,
        other => other,
    };

    let reference = match (response.size, response.name) {
        (Some(size_kb), Some(display_name)) if !display_name.is_empty() => {
            if uuid.contains('.') {
                return Err(ProtocolError::InvalidField {
                    field: "uuid",
                    reason: "asset id must not contain '.'".to_string(),
                });
            }
            AssetReference {
                asset_id: uuid,
                size_kb,
                display_name,
            }
        }
        _ => AssetReference::parse(&uuid)?,
    };

    Ok(UploadResult {
        asset_id: reference.asset_id,
        size_kb: reference.size_kb,
        display_name: reference.display_name,
        kind,
    })
}

/// Extracts the `error` message from a rejected upload body, if present.
pub fn parse_upload_error(raw: &str) -> Option<String> {
    serde_json::from_str::<RawUploadError>(raw)
        .ok()
        .map(|body| body.error.trim().to_string())
        .filter(|error| !error.is_empty())
}
