//! Websocket-backed [`Connector`] built on tokio-tungstenite.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use super::{Connector, Link, LinkEndpoint, LinkEvent, LinkEventSender, LinkTag, TaggedLinkEvent};
use crate::{ClientConfig, SessionError};

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug)]
enum LinkCommand {
    Send(String),
    Close,
}

#[derive(Debug, Clone)]
/// Opens one websocket task per link.
pub struct WebSocketConnector {
    config: ClientConfig,
}

impl WebSocketConnector {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    fn endpoint_url(&self, endpoint: &LinkEndpoint) -> Result<String, SessionError> {
        match endpoint {
            LinkEndpoint::Control => self.config.control_socket_url(),
            LinkEndpoint::Conversation(conversation) => self.config.data_socket_url(conversation),
        }
    }
}

impl Connector for WebSocketConnector {
    fn connect(
        &self,
        endpoint: LinkEndpoint,
        tag: LinkTag,
        events: LinkEventSender,
    ) -> Box<dyn Link> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        match self.endpoint_url(&endpoint) {
            Ok(url) => {
                tokio::spawn(run_websocket_link(
                    url,
                    tag,
                    events,
                    commands_rx,
                    self.config.connect_timeout(),
                ));
            }
            Err(error) => {
                let _ = events.send(TaggedLinkEvent::new(
                    tag,
                    LinkEvent::Closed {
                        reason: Some(error.to_string()),
                    },
                ));
            }
        }
        Box::new(WebSocketLink {
            commands: commands_tx,
        })
    }
}

struct WebSocketLink {
    commands: mpsc::UnboundedSender<LinkCommand>,
}

impl Link for WebSocketLink {
    fn send(&mut self, frame: String) -> Result<(), SessionError> {
        self.commands
            .send(LinkCommand::Send(frame))
            .map_err(|_| SessionError::Transport("websocket link task has exited".to_string()))
    }

    fn close(&mut self) {
        let _ = self.commands.send(LinkCommand::Close);
    }
}

async fn run_websocket_link(
    url: String,
    tag: LinkTag,
    events: LinkEventSender,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    connect_timeout: Option<Duration>,
) {
    let connect = establish(&url, connect_timeout);
    tokio::pin!(connect);

    let stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok(stream) => break stream,
                Err(reason) => {
                    warn!(?tag, %reason, "websocket connect failed");
                    emit_closed(&events, tag, Some(reason));
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(LinkCommand::Send(_)) => {
                    debug!(?tag, "discarding frame written before websocket opened");
                }
                Some(LinkCommand::Close) | None => {
                    debug!(?tag, "websocket closed while connecting");
                    emit_closed(&events, tag, None);
                    return;
                }
            },
        }
    };

    debug!(?tag, %url, "websocket connected");
    if events
        .send(TaggedLinkEvent::new(tag, LinkEvent::Opened))
        .is_err()
    {
        return;
    }
    let reason = pump_websocket(stream, tag, &events, &mut commands).await;
    emit_closed(&events, tag, reason);
}

async fn establish(url: &str, connect_timeout: Option<Duration>) -> Result<SocketStream, String> {
    let result = match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, connect_async(url))
            .await
            .map_err(|_| format!("websocket connect timed out after {}ms", limit.as_millis()))?,
        None => connect_async(url).await,
    };
    result
        .map(|(stream, _response)| stream)
        .map_err(|error| format!("failed to connect websocket {url}: {error}"))
}

async fn pump_websocket(
    stream: SocketStream,
    tag: LinkTag,
    events: &LinkEventSender,
    commands: &mut mpsc::UnboundedReceiver<LinkCommand>,
) -> Option<String> {
    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LinkCommand::Send(frame)) => {
                    if let Err(error) = sink.send(WsMessage::Text(frame.into())).await {
                        return Some(format!("failed to write websocket frame: {error}"));
                    }
                }
                Some(LinkCommand::Close) | None => {
                    let _ = sink.close().await;
                    return None;
                }
            },
            message = source.next() => {
                let Some(message) = message else {
                    return None;
                };
                let message = match message {
                    Ok(message) => message,
                    Err(error) => return Some(format!("failed reading websocket frame: {error}")),
                };
                match frame_text(message) {
                    Ok(Some(text)) => {
                        if events.send(TaggedLinkEvent::new(tag, LinkEvent::Frame(text))).is_err() {
                            return None;
                        }
                    }
                    Ok(None) => {}
                    Err(reason) => warn!(?tag, %reason, "skipping undecodable websocket frame"),
                }
            }
        }
    }
}

fn emit_closed(events: &LinkEventSender, tag: LinkTag, reason: Option<String>) {
    let _ = events.send(TaggedLinkEvent::new(tag, LinkEvent::Closed { reason }));
}

fn frame_text(message: WsMessage) -> Result<Option<String>, String> {
    match message {
        WsMessage::Text(text) => Ok(Some(text.as_str().to_string())),
        WsMessage::Binary(bytes) => String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|_| "invalid utf-8 websocket payload".to_string()),
        WsMessage::Ping(_) | WsMessage::Pong(_) => Ok(None),
        WsMessage::Close(_) => Ok(None),
        WsMessage::Frame(_) => Ok(None),
    }
}
