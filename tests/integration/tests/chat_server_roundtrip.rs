use std::{collections::HashMap, net::SocketAddr, time::Duration};

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use parley_protocol::{parse_outbound_chat_frame, ChatEvent, ChatEventKind, ConversationId};
use parley_session::{
    spawn_session, ClientConfig, DisplayBody, DisplayRecord, NoticeReceiver, SessionError,
    SessionNotice, SpawnedSession,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const SELF_USER_ID: i64 = 1;
const UNKNOWN_USER_ID: i64 = 404;
const UPLOADED_ASSET_ID: &str = "7d1c0e52-4a8b-4f0e-b0a1-3f6c2d9e8b44";

fn conversation_between(left: i64, right: i64) -> i64 {
    let (low, high) = if left <= right {
        (left, right)
    } else {
        (right, left)
    };
    (low << 32) | high
}

async fn handle_control_upgrade(websocket: WebSocketUpgrade) -> Response {
    websocket.on_upgrade(run_control_socket).into_response()
}

async fn run_control_socket(socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    while let Some(Ok(message)) = receiver.next().await {
        let WsMessage::Text(text) = message else {
            continue;
        };
        let request = serde_json::from_str::<Value>(text.as_str()).unwrap_or(Value::Null);
        let reply = match request.get("target_id").and_then(Value::as_i64) {
            Some(UNKNOWN_USER_ID) => json!({ "error": "target user not found" }),
            Some(target_id) => json!({ "conv_id": conversation_between(SELF_USER_ID, target_id) }),
            None => json!({ "error": "invalid target_id" }),
        };
        if sender
            .send(WsMessage::Text(reply.to_string().into()))
            .await
            .is_err()
        {
            break;
        }
    }
}

async fn handle_message_upgrade(
    Query(query): Query<HashMap<String, String>>,
    websocket: WebSocketUpgrade,
) -> Response {
    if !query.contains_key("conv_id") {
        return (StatusCode::BAD_REQUEST, "missing conv_id").into_response();
    }
    websocket.on_upgrade(run_message_socket).into_response()
}

/// Echoes every outbound frame back as a chat event authored by the caller.
async fn run_message_socket(socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    while let Some(Ok(message)) = receiver.next().await {
        let WsMessage::Text(text) = message else {
            continue;
        };
        let Ok(frame) = parse_outbound_chat_frame(text.as_str()) else {
            continue;
        };
        let event = ChatEvent {
            author_id: SELF_USER_ID,
            author_name: "tester".to_string(),
            timestamp: "2024-05-01 10:00:00".to_string(),
            kind: frame.event_kind(),
            payload: frame.text,
        };
        if sender
            .send(WsMessage::Text(event.encode().into()))
            .await
            .is_err()
        {
            break;
        }
    }
}

async fn handle_upload(body: Bytes) -> Response {
    let body = String::from_utf8_lossy(&body);
    if !body.contains("name=\"file\"") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing file field" })),
        )
            .into_response();
    }
    if !body.contains("filename=\"file.png\"") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "unsupported file" })),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "uuid": format!("{UPLOADED_ASSET_ID}.1kb.file.png"),
            "type": 1,
        })),
    )
        .into_response()
}

async fn spawn_chat_server() -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind ephemeral listener")?;
    let addr = listener.local_addr().context("resolve listener addr")?;
    let app = Router::new()
        .route("/api/v1/ws/convid", get(handle_control_upgrade))
        .route("/api/v1/ws/message", get(handle_message_upgrade))
        .route("/api/v1/upload", post(handle_upload));
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    Ok((addr, handle))
}

fn client_config(addr: SocketAddr) -> ClientConfig {
    let mut config = ClientConfig::new(format!("http://{addr}/api/v1"), SELF_USER_ID);
    config.connect_timeout_ms = 2_000;
    config.upload_timeout_ms = 2_000;
    config
}

async fn expect_notice<F>(notices: &mut NoticeReceiver, mut matches: F) -> SessionNotice
where
    F: FnMut(&SessionNotice) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let notice = notices.recv().await.expect("notice stream open");
            if matches(&notice) {
                return notice;
            }
        }
    })
    .await
    .expect("notice before timeout")
}

async fn expect_message(notices: &mut NoticeReceiver) -> DisplayRecord {
    match expect_notice(notices, |notice| matches!(notice, SessionNotice::Message(_))).await {
        SessionNotice::Message(record) => record,
        other => panic!("expected message notice, got {other:?}"),
    }
}

#[tokio::test]
async fn integration_session_resolves_chats_uploads_and_switches_against_live_server() {
    let (addr, server) = spawn_chat_server().await.expect("spawn server");
    let SpawnedSession {
        handle,
        mut notices,
        task,
    } = spawn_session(&client_config(addr)).expect("spawn session");

    handle.select_user(2).expect("select user");
    expect_notice(&mut notices, |notice| {
        matches!(notice, SessionNotice::ControlOpened { .. })
    })
    .await;
    let conversation = ConversationId::Numeric(conversation_between(SELF_USER_ID, 2));
    let opened = expect_notice(&mut notices, |notice| {
        matches!(notice, SessionNotice::DataOpened { .. })
    })
    .await;
    assert_eq!(
        opened,
        SessionNotice::DataOpened {
            conversation: conversation.clone()
        }
    );

    handle.send_text("hello over the wire").expect("send text");
    let record = expect_message(&mut notices).await;
    assert_eq!(record.author, "You");
    assert_eq!(
        record.body,
        DisplayBody::Text("hello over the wire".to_string())
    );

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("file.png");
    std::fs::write(&path, b"\x89PNG not really an image").expect("write upload source");
    handle.upload(&path).expect("upload");
    let record = expect_message(&mut notices).await;
    assert_eq!(record.kind(), ChatEventKind::Image);
    assert_eq!(
        record.body,
        DisplayBody::InlineAsset {
            asset_id: UPLOADED_ASSET_ID.to_string(),
            url: format!("http://{addr}/api/v1/files/{UPLOADED_ASSET_ID}"),
        }
    );

    handle.select_user(UNKNOWN_USER_ID).expect("select unknown user");
    let rejected = expect_notice(&mut notices, |notice| {
        matches!(notice, SessionNotice::ControlRejected { .. })
    })
    .await;
    assert_eq!(
        rejected,
        SessionNotice::ControlRejected {
            message: "target user not found".to_string()
        }
    );

    let group = ConversationId::Opaque("grp-1".to_string());
    handle.select_group(group.clone()).expect("select group");
    let closed = expect_notice(&mut notices, |notice| {
        matches!(notice, SessionNotice::DataClosed { .. })
    })
    .await;
    assert!(matches!(
        closed,
        SessionNotice::DataClosed { conversation: closed_conversation, .. }
            if closed_conversation == conversation
    ));
    let opened = expect_notice(&mut notices, |notice| {
        matches!(notice, SessionNotice::DataOpened { .. })
    })
    .await;
    assert_eq!(opened, SessionNotice::DataOpened { conversation: group });

    handle.shutdown().expect("shutdown");
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("runtime stopped")
        .expect("runtime task");
    server.abort();
}

#[tokio::test]
async fn regression_session_reports_rejected_upload_without_announcing() {
    let (addr, server) = spawn_chat_server().await.expect("spawn server");
    let SpawnedSession {
        handle,
        mut notices,
        task: _task,
    } = spawn_session(&client_config(addr)).expect("spawn session");

    handle
        .select_group(ConversationId::Numeric(99))
        .expect("select group");
    expect_notice(&mut notices, |notice| {
        matches!(notice, SessionNotice::DataOpened { .. })
    })
    .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("notes.exe");
    std::fs::write(&path, b"MZ").expect("write upload source");
    handle.upload(&path).expect("upload");

    let notice = expect_notice(&mut notices, |notice| {
        matches!(
            notice,
            SessionNotice::DeliveryFailed { .. } | SessionNotice::Message(_)
        )
    })
    .await;
    match notice {
        SessionNotice::DeliveryFailed { error, .. } => {
            let message = error.to_string();
            assert!(message.contains("unsupported file"), "{message}");
        }
        other => panic!("expected delivery failure, got {other:?}"),
    }
    server.abort();
}

#[tokio::test]
async fn regression_session_reports_unreachable_server_as_control_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let SpawnedSession {
        handle,
        mut notices,
        task: _task,
    } = spawn_session(&client_config(addr)).expect("spawn session");
    handle.select_user(2).expect("select user");

    // the lookup fails either while queued or after the close, never silently
    let mut saw_closed = false;
    let mut saw_failed_lookup = false;
    while !(saw_closed && saw_failed_lookup) {
        match expect_notice(&mut notices, |notice| {
            matches!(
                notice,
                SessionNotice::ControlClosed { .. } | SessionNotice::DeliveryFailed { .. }
            )
        })
        .await
        {
            SessionNotice::ControlClosed { .. } => saw_closed = true,
            SessionNotice::DeliveryFailed { error, .. } => {
                assert_eq!(error, SessionError::ChannelClosed);
                saw_failed_lookup = true;
            }
            other => panic!("unexpected notice {other:?}"),
        }
    }
}
