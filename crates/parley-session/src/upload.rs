//! Out-of-band asset transfer used by the upload-then-send pipeline.

use std::path::Path;

use async_trait::async_trait;
use parley_protocol::{parse_upload_error, parse_upload_response, ConversationId, UploadResult};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::{ClientConfig, Generation, SessionError};

const UPLOAD_FORM_FIELD: &str = "file";
const UPLOAD_ERROR_BODY_MAX_CHARS: usize = 320;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub async fn read(path: &Path) -> Result<Self, SessionError> {
        let file_name = upload_file_name(path)?;
        let bytes = tokio::fs::read(path).await.map_err(|error| {
            SessionError::UploadFailed(format!("failed to read {}: {error}", path.display()))
        })?;
        if bytes.is_empty() {
            return Err(SessionError::UploadFailed(format!(
                "refusing to upload empty file {}",
                path.display()
            )));
        }
        Ok(Self { file_name, bytes })
    }
}

pub fn upload_file_name(path: &Path) -> Result<String, SessionError> {
    path.file_name()
        .map(|name| name.to_string_lossy().trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            SessionError::UploadFailed(format!("upload path {} has no file name", path.display()))
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Identity of the data channel an upload was started against.
pub struct UploadTicket {
    pub id: u64,
    pub generation: Generation,
    pub conversation: ConversationId,
    pub file_name: String,
}

#[async_trait]
/// Trait contract for asset transfer backends.
pub trait Uploader: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<UploadResult, SessionError>;
}

#[derive(Debug, Clone)]
/// Multipart uploader for the chat server's upload endpoint.
pub struct HttpUploader {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(config: &ClientConfig) -> Result<Self, SessionError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("parley-client"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.upload_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|error| {
            SessionError::InvalidConfig(format!("failed to create upload client: {error}"))
        })?;
        Ok(Self {
            http,
            endpoint: config.upload_url(),
        })
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, file: UploadFile) -> Result<UploadResult, SessionError> {
        let UploadFile { file_name, bytes } = file;
        let size = bytes.len();
        let form = Form::new().part(
            UPLOAD_FORM_FIELD,
            Part::bytes(bytes).file_name(file_name.clone()),
        );
        debug!(file = %file_name, size, endpoint = %self.endpoint, "uploading asset");

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|error| {
                SessionError::UploadFailed(format!("upload request for {file_name} failed: {error}"))
            })?;
        let status = response.status();
        let body = response.text().await.map_err(|error| {
            SessionError::UploadFailed(format!("failed to read upload response: {error}"))
        })?;

        if !status.is_success() {
            let reason = parse_upload_error(&body)
                .unwrap_or_else(|| truncate_for_error(&body, UPLOAD_ERROR_BODY_MAX_CHARS));
            return Err(SessionError::UploadFailed(format!(
                "server rejected {file_name} with status {}: {reason}",
                status.as_u16()
            )));
        }

        parse_upload_response(&body).map_err(|error| {
            SessionError::UploadFailed(format!("undecodable upload response: {error}"))
        })
    }
}

fn truncate_for_error(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
