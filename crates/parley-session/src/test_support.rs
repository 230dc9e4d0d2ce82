//! Test doubles shared by the session unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley_protocol::{ChatEventKind, ControlRequest, UploadResult};
use tokio::sync::{oneshot, Notify};

use crate::{
    Connector, Link, LinkEndpoint, LinkEvent, LinkEventSender, LinkTag, SessionError,
    TaggedLinkEvent, UploadFile, Uploader,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkOp {
    Connect { endpoint: LinkEndpoint, tag: LinkTag },
    Send { tag: LinkTag, frame: String },
    Close { tag: LinkTag },
}

#[derive(Default)]
struct RecordingState {
    ops: Vec<LinkOp>,
    events: Option<LinkEventSender>,
    fail_sends: bool,
}

#[derive(Clone, Default)]
/// Connector that records every link operation in order.
pub(crate) struct RecordingConnector {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingConnector {
    pub(crate) fn ops(&self) -> Vec<LinkOp> {
        self.state.lock().expect("recording state").ops.clone()
    }

    pub(crate) fn sent_frames(&self, tag: LinkTag) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                LinkOp::Send { tag: sent_tag, frame } if sent_tag == tag => Some(frame),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn sent_target_ids(&self) -> Vec<i64> {
        self.sent_frames(LinkTag::Control)
            .iter()
            .map(|frame| {
                serde_json::from_str::<ControlRequest>(frame)
                    .expect("control frame")
                    .target_id
            })
            .collect()
    }

    pub(crate) fn connected(&self, tag: LinkTag) -> bool {
        self.ops()
            .iter()
            .any(|op| matches!(op, LinkOp::Connect { tag: connected, .. } if *connected == tag))
    }

    pub(crate) fn fail_sends(&self, fail: bool) {
        self.state.lock().expect("recording state").fail_sends = fail;
    }

    /// Injects a link event as if the transport task produced it.
    pub(crate) fn emit(&self, tag: LinkTag, event: LinkEvent) {
        let state = self.state.lock().expect("recording state");
        let events = state.events.as_ref().expect("connector has been used");
        events
            .send(TaggedLinkEvent::new(tag, event))
            .expect("session inbox open");
    }

    pub(crate) async fn wait_for_connect(&self, tag: LinkTag) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !self.connected(tag) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("connect recorded before timeout");
    }
}

impl Connector for RecordingConnector {
    fn connect(
        &self,
        endpoint: LinkEndpoint,
        tag: LinkTag,
        events: LinkEventSender,
    ) -> Box<dyn Link> {
        let mut state = self.state.lock().expect("recording state");
        state.ops.push(LinkOp::Connect { endpoint, tag });
        state.events = Some(events);
        Box::new(RecordingLink {
            tag,
            state: Arc::clone(&self.state),
        })
    }
}

struct RecordingLink {
    tag: LinkTag,
    state: Arc<Mutex<RecordingState>>,
}

impl Link for RecordingLink {
    fn send(&mut self, frame: String) -> Result<(), SessionError> {
        let mut state = self.state.lock().expect("recording state");
        if state.fail_sends {
            return Err(SessionError::Transport("recording link refused write".to_string()));
        }
        state.ops.push(LinkOp::Send {
            tag: self.tag,
            frame,
        });
        Ok(())
    }

    fn close(&mut self) {
        self.state
            .lock()
            .expect("recording state")
            .ops
            .push(LinkOp::Close { tag: self.tag });
    }
}

pub(crate) fn image_upload_result(name: &str) -> UploadResult {
    UploadResult {
        asset_id: "5f0c7a64-3d55-4c8e-9b0e-2b1f7c9d8e10".to_string(),
        size_kb: 12,
        display_name: name.to_string(),
        kind: ChatEventKind::Image,
    }
}

/// Uploader that parks until released, so tests can act mid-upload.
pub(crate) struct GatedUploader {
    started: Notify,
    release: Mutex<Option<oneshot::Receiver<Result<UploadResult, SessionError>>>>,
    uploaded: Mutex<Vec<String>>,
}

impl GatedUploader {
    pub(crate) fn new() -> (
        Arc<Self>,
        oneshot::Sender<Result<UploadResult, SessionError>>,
    ) {
        let (release_tx, release_rx) = oneshot::channel();
        let uploader = Arc::new(Self {
            started: Notify::new(),
            release: Mutex::new(Some(release_rx)),
            uploaded: Mutex::new(Vec::new()),
        });
        (uploader, release_tx)
    }

    pub(crate) async fn wait_started(&self) {
        tokio::time::timeout(Duration::from_secs(2), self.started.notified())
            .await
            .expect("upload started before timeout");
    }

    pub(crate) fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().expect("uploaded").clone()
    }
}

#[async_trait]
impl Uploader for GatedUploader {
    async fn upload(&self, file: UploadFile) -> Result<UploadResult, SessionError> {
        self.uploaded
            .lock()
            .expect("uploaded")
            .push(file.file_name.clone());
        let release = self.release.lock().expect("release").take();
        self.started.notify_one();
        match release {
            Some(release) => release
                .await
                .unwrap_or_else(|_| Err(SessionError::UploadFailed("gate dropped".to_string()))),
            None => Err(SessionError::UploadFailed("gate already used".to_string())),
        }
    }
}
