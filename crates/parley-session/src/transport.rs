//! Link seam between the session state machines and the network.
//!
//! A [`Connector`] opens a [`Link`] and reports its lifecycle as
//! [`TaggedLinkEvent`]s on the session's inbox. The tag identifies which
//! channel instance produced the event, so events from a superseded data
//! channel can be recognised and dropped.

use std::fmt;

use parley_protocol::ConversationId;
use tokio::sync::mpsc;

use crate::{Generation, SessionError};

mod websocket;

pub use websocket::WebSocketConnector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Lifecycle state shared by the control and data channels.
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

impl ChannelState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkTag {
    Control,
    Data(Generation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEndpoint {
    Control,
    Conversation(ConversationId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Opened,
    Frame(String),
    Closed { reason: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedLinkEvent {
    pub tag: LinkTag,
    pub event: LinkEvent,
}

impl TaggedLinkEvent {
    pub fn new(tag: LinkTag, event: LinkEvent) -> Self {
        Self { tag, event }
    }
}

pub type LinkEventSender = mpsc::UnboundedSender<TaggedLinkEvent>;
pub type LinkEventReceiver = mpsc::UnboundedReceiver<TaggedLinkEvent>;

/// Write half of an established (or establishing) connection.
pub trait Link: Send {
    fn send(&mut self, frame: String) -> Result<(), SessionError>;

    /// Requests teardown. Must not block and must tolerate repeated calls.
    fn close(&mut self);
}

/// Trait contract for opening links.
///
/// `connect` returns immediately; the outcome arrives later as
/// [`LinkEvent::Opened`] or [`LinkEvent::Closed`] tagged with `tag`.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        endpoint: LinkEndpoint,
        tag: LinkTag,
        events: LinkEventSender,
    ) -> Box<dyn Link>;
}
