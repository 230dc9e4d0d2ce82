//! Control socket state machine: resolves chat targets to conversation ids.

use parley_protocol::{parse_control_frame, ControlFrame, ControlRequest, ConversationId};
use tracing::{debug, info, warn};

use crate::{
    ChannelState, Connector, Link, LinkEndpoint, LinkEvent, LinkEventSender, LinkTag,
    OutboundQueue, SessionError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDisposition {
    Sent,
    Queued { evicted: Option<ControlRequest> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of applying one link event to the control channel.
pub enum ControlOutcome {
    Opened {
        flushed: usize,
    },
    Resolved(ConversationId),
    Rejected(String),
    /// Terminal. `abandoned` lists requests that were never written.
    Closed {
        abandoned: Vec<ControlRequest>,
        reason: Option<String>,
    },
    Ignored,
}

/// One persistent control connection per session. Never reconnects.
pub struct ControlChannel {
    state: ChannelState,
    queue: OutboundQueue,
    link: Option<Box<dyn Link>>,
}

impl ControlChannel {
    pub fn open(connector: &dyn Connector, events: LinkEventSender, queue: OutboundQueue) -> Self {
        let link = connector.connect(LinkEndpoint::Control, LinkTag::Control, events);
        debug!("control channel connecting");
        Self {
            state: ChannelState::Connecting,
            queue,
            link: Some(link),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_capacity(&self) -> Option<usize> {
        self.queue.capacity()
    }

    pub fn request(
        &mut self,
        request: ControlRequest,
    ) -> Result<RequestDisposition, SessionError> {
        match self.state {
            ChannelState::Open => {
                self.write(request)?;
                debug!(target_id = request.target_id, "control request sent");
                Ok(RequestDisposition::Sent)
            }
            ChannelState::Connecting => {
                let evicted = self.queue.enqueue(request)?;
                debug!(
                    target_id = request.target_id,
                    pending = self.queue.len(),
                    "control request queued until channel opens"
                );
                Ok(RequestDisposition::Queued { evicted })
            }
            ChannelState::Closed => Err(SessionError::ChannelClosed),
        }
    }

    pub fn handle_event(&mut self, event: LinkEvent) -> ControlOutcome {
        match event {
            LinkEvent::Opened => self.on_opened(),
            LinkEvent::Frame(raw) => self.on_frame(&raw),
            LinkEvent::Closed { reason } => {
                if self.state == ChannelState::Closed {
                    return ControlOutcome::Ignored;
                }
                self.transition_closed(reason)
            }
        }
    }

    /// Closes the link and returns requests that never left the queue.
    pub fn close(&mut self) -> Vec<ControlRequest> {
        if self.state == ChannelState::Closed {
            return Vec::new();
        }
        if let Some(link) = self.link.as_mut() {
            link.close();
        }
        self.link = None;
        self.state = ChannelState::Closed;
        self.queue.drain()
    }

    fn on_opened(&mut self) -> ControlOutcome {
        if self.state != ChannelState::Connecting {
            return ControlOutcome::Ignored;
        }
        self.state = ChannelState::Open;

        let mut queued = self.queue.drain().into_iter();
        let mut flushed = 0_usize;
        while let Some(request) = queued.next() {
            if let Err(error) = self.write(request) {
                let mut abandoned = vec![request];
                abandoned.extend(queued);
                return self.transition_closed_with(abandoned, Some(error.to_string()));
            }
            flushed += 1;
        }
        info!(flushed, "control channel open");
        ControlOutcome::Opened { flushed }
    }

    fn on_frame(&mut self, raw: &str) -> ControlOutcome {
        if self.state != ChannelState::Open {
            return ControlOutcome::Ignored;
        }
        match parse_control_frame(raw) {
            Ok(ControlFrame::Resolved(conversation)) => {
                debug!(%conversation, "conversation resolved");
                ControlOutcome::Resolved(conversation)
            }
            Ok(ControlFrame::Rejected(message)) => {
                warn!(%message, "control request rejected by server");
                ControlOutcome::Rejected(message)
            }
            Ok(ControlFrame::Unrecognized) => {
                debug!(frame = raw, "ignoring unrecognized control frame");
                ControlOutcome::Ignored
            }
            Err(error) => {
                warn!(%error, "ignoring malformed control frame");
                ControlOutcome::Ignored
            }
        }
    }

    fn write(&mut self, request: ControlRequest) -> Result<(), SessionError> {
        let Some(link) = self.link.as_mut() else {
            return Err(SessionError::ChannelClosed);
        };
        if let Err(error) = link.send(request.encode()) {
            warn!(%error, target_id = request.target_id, "control link write failed");
            link.close();
            self.link = None;
            self.state = ChannelState::Closed;
            return Err(SessionError::ChannelClosed);
        }
        Ok(())
    }

    fn transition_closed(&mut self, reason: Option<String>) -> ControlOutcome {
        let abandoned = self.queue.drain();
        self.transition_closed_with(abandoned, reason)
    }

    fn transition_closed_with(
        &mut self,
        abandoned: Vec<ControlRequest>,
        reason: Option<String>,
    ) -> ControlOutcome {
        self.state = ChannelState::Closed;
        self.link = None;
        warn!(
            reason = reason.as_deref().unwrap_or("closed"),
            abandoned = abandoned.len(),
            "control channel closed"
        );
        ControlOutcome::Closed { abandoned, reason }
    }
}
