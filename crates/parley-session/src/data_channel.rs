//! Per-conversation data socket and the slot holding the active one.

use std::fmt;

use parley_protocol::{parse_chat_event, ChatEvent, ConversationId, OutboundChatFrame};
use tracing::{debug, info, warn};

use crate::{
    ChannelState, Connector, Link, LinkEndpoint, LinkEvent, LinkEventSender, LinkTag,
    SessionError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
/// Monotonic identity of one data channel instance within a session.
pub struct Generation(pub(crate) u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One conversation's message stream.
pub struct DataChannel {
    generation: Generation,
    conversation: ConversationId,
    state: ChannelState,
    link: Box<dyn Link>,
}

impl DataChannel {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Writes `frame`; no I/O is attempted unless the channel is open.
    pub fn send(&mut self, frame: &OutboundChatFrame) -> Result<(), SessionError> {
        if self.state != ChannelState::Open {
            return Err(SessionError::ChannelNotOpen);
        }
        if let Err(error) = self.link.send(frame.encode()) {
            warn!(
                generation = %self.generation,
                conversation = %self.conversation,
                %error,
                "data link write failed"
            );
            self.link.close();
            self.state = ChannelState::Closed;
            return Err(SessionError::ChannelNotOpen);
        }
        Ok(())
    }

    pub fn close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        self.link.close();
        self.state = ChannelState::Closed;
        debug!(
            generation = %self.generation,
            conversation = %self.conversation,
            "data channel closed"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of applying one link event to the data slot.
pub enum DataOutcome {
    Opened(ConversationId),
    Message(ChatEvent),
    Closed {
        conversation: ConversationId,
        reason: Option<String>,
    },
    Ignored,
}

#[derive(Default)]
/// Holds at most one data channel; replacing it bumps the generation.
pub struct DataSlot {
    active: Option<DataChannel>,
    last_generation: Generation,
}

impl DataSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&DataChannel> {
        self.active.as_ref()
    }

    pub fn current_generation(&self) -> Option<Generation> {
        self.active.as_ref().map(DataChannel::generation)
    }

    /// True only for the active channel instance, and only while it is open.
    pub fn is_current_and_open(&self, generation: Generation) -> bool {
        self.active
            .as_ref()
            .is_some_and(|channel| channel.generation == generation && channel.is_open())
    }

    /// Closes any live channel, then starts connecting a new one.
    pub fn open_for(
        &mut self,
        conversation: ConversationId,
        connector: &dyn Connector,
        events: LinkEventSender,
    ) -> Generation {
        if let Some(previous) = self.active.as_mut() {
            previous.close();
        }
        let generation = self.last_generation.next();
        self.last_generation = generation;
        let link = connector.connect(
            LinkEndpoint::Conversation(conversation.clone()),
            LinkTag::Data(generation),
            events,
        );
        info!(%generation, %conversation, "data channel connecting");
        self.active = Some(DataChannel {
            generation,
            conversation,
            state: ChannelState::Connecting,
            link,
        });
        generation
    }

    pub fn send(&mut self, frame: &OutboundChatFrame) -> Result<(), SessionError> {
        match self.active.as_mut() {
            Some(channel) => channel.send(frame),
            None => Err(SessionError::ChannelNotOpen),
        }
    }

    pub fn handle_event(&mut self, generation: Generation, event: LinkEvent) -> DataOutcome {
        let Some(channel) = self
            .active
            .as_mut()
            .filter(|channel| channel.generation == generation)
        else {
            debug!(%generation, "dropping event from superseded data channel");
            return DataOutcome::Ignored;
        };

        match event {
            LinkEvent::Opened => {
                if channel.state != ChannelState::Connecting {
                    return DataOutcome::Ignored;
                }
                channel.state = ChannelState::Open;
                info!(%generation, conversation = %channel.conversation, "data channel open");
                DataOutcome::Opened(channel.conversation.clone())
            }
            LinkEvent::Frame(raw) => {
                if channel.state != ChannelState::Open {
                    return DataOutcome::Ignored;
                }
                match parse_chat_event(&raw) {
                    Ok(event) => DataOutcome::Message(event),
                    Err(error) => {
                        warn!(%generation, %error, "skipping malformed chat frame");
                        DataOutcome::Ignored
                    }
                }
            }
            LinkEvent::Closed { reason } => {
                if channel.state == ChannelState::Closed {
                    return DataOutcome::Ignored;
                }
                channel.state = ChannelState::Closed;
                info!(
                    %generation,
                    conversation = %channel.conversation,
                    reason = reason.as_deref().unwrap_or("closed"),
                    "data channel closed by peer"
                );
                DataOutcome::Closed {
                    conversation: channel.conversation.clone(),
                    reason,
                }
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(channel) = self.active.as_mut() {
            channel.close();
        }
    }
}
