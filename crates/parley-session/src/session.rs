//! Session: the single owner of the control channel and the data slot.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parley_protocol::{ControlRequest, ConversationId, OutboundChatFrame, UploadResult};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    ChannelState, ClientConfig, Connector, ControlChannel, ControlOutcome, DataOutcome, DataSlot,
    DisplayRecord, Generation, LinkEvent, LinkEventSender, LinkTag, MessageRenderer,
    OutboundQueue, RequestDisposition, SessionError, TaggedLinkEvent, UploadTicket,
};


const REPLACED_REASON: &str = "replaced by another conversation";
const WRITE_FAILED_REASON: &str = "link write failed";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Operation named in a failed-delivery notice.
pub enum DeliveryOperation {
    ControlRequest { target_id: i64 },
    Text,
    Upload { file_name: String },
}

impl fmt::Display for DeliveryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControlRequest { target_id } => write!(f, "conversation lookup for {target_id}"),
            Self::Text => f.write_str("message"),
            Self::Upload { file_name } => write!(f, "upload of {file_name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Notification emitted to the UI collaborator.
pub enum SessionNotice {
    ControlOpened {
        flushed: usize,
    },
    Resolved {
        conversation: ConversationId,
    },
    ControlRejected {
        message: String,
    },
    ControlClosed {
        reason: Option<String>,
    },
    DataOpened {
        conversation: ConversationId,
    },
    DataClosed {
        conversation: ConversationId,
        reason: Option<String>,
    },
    Message(DisplayRecord),
    /// Emitted exactly once per failed operation.
    DeliveryFailed {
        operation: DeliveryOperation,
        error: SessionError,
    },
}

pub type NoticeSender = mpsc::UnboundedSender<SessionNotice>;
pub type NoticeReceiver = mpsc::UnboundedReceiver<SessionNotice>;

/// Multiplexes one control socket and at most one data socket.
///
/// Every mutation goes through `&mut self`; the runtime loop is the only
/// caller in production, so suspension points are re-validated here.
pub struct Session {
    connector: Arc<dyn Connector>,
    events: LinkEventSender,
    notices: NoticeSender,
    control: ControlChannel,
    data: DataSlot,
    renderer: MessageRenderer,
    next_upload_id: u64,
    pending_uploads: BTreeMap<u64, UploadTicket>,
}

impl Session {
    pub fn open(
        config: &ClientConfig,
        connector: Arc<dyn Connector>,
        events: LinkEventSender,
        notices: NoticeSender,
    ) -> Self {
        let queue = OutboundQueue::with_limit(config.queue_capacity, config.overflow_policy);
        let control = ControlChannel::open(connector.as_ref(), events.clone(), queue);
        info!(
            self_user_id = config.self_user_id,
            queue_capacity = ?config.queue_capacity,
            overflow_policy = config.overflow_policy.as_str(),
            "session opened"
        );
        Self {
            connector,
            events,
            notices,
            control,
            data: DataSlot::new(),
            renderer: MessageRenderer::from_config(config),
            next_upload_id: 0,
            pending_uploads: BTreeMap::new(),
        }
    }

    pub fn control_state(&self) -> ChannelState {
        self.control.state()
    }

    pub fn pending_requests(&self) -> usize {
        self.control.pending()
    }

    pub fn active_conversation(&self) -> Option<&ConversationId> {
        self.data.active().map(|channel| channel.conversation())
    }

    pub fn active_generation(&self) -> Option<Generation> {
        self.data.current_generation()
    }

    pub fn data_state(&self) -> Option<ChannelState> {
        self.data.active().map(|channel| channel.state())
    }

    pub fn pending_uploads(&self) -> usize {
        self.pending_uploads.len()
    }

    /// Asks the server for the conversation shared with `target_id`.
    pub fn select_user(&mut self, target_id: i64) -> Result<RequestDisposition, SessionError> {
        let request = ControlRequest::new(target_id);
        let was_open = self.control.state() == ChannelState::Open;
        match self.control.request(request) {
            Ok(disposition) => {
                if let RequestDisposition::Queued {
                    evicted: Some(evicted),
                } = disposition
                {
                    let capacity = self.control.queue_capacity().unwrap_or_default();
                    self.report_failure(
                        DeliveryOperation::ControlRequest {
                            target_id: evicted.target_id,
                        },
                        SessionError::QueueFull { capacity },
                    );
                }
                Ok(disposition)
            }
            Err(error) => {
                self.report_failure(DeliveryOperation::ControlRequest { target_id }, error.clone());
                if was_open && self.control.state() == ChannelState::Closed {
                    self.notify(SessionNotice::ControlClosed {
                        reason: Some(WRITE_FAILED_REASON.to_string()),
                    });
                }
                Err(error)
            }
        }
    }

    /// Group conversations are already known; no control round trip.
    pub fn select_group(&mut self, conversation: ConversationId) -> Generation {
        self.open_conversation(conversation)
    }

    pub fn send_text(&mut self, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        let open_before = self.open_data_channel();
        let result = if text.is_empty() {
            Err(SessionError::EmptyMessage)
        } else {
            self.data.send(&OutboundChatFrame::text(text))
        };
        if let Err(error) = &result {
            self.report_failure(DeliveryOperation::Text, error.clone());
            self.report_write_closed(open_before);
        }
        result
    }

    /// Captures the channel an upload belongs to before any bytes move.
    pub fn begin_upload(&mut self, file_name: &str) -> Result<UploadTicket, SessionError> {
        let Some(channel) = self.data.active().filter(|channel| channel.is_open()) else {
            let error = SessionError::ChannelNotOpen;
            self.report_failure(
                DeliveryOperation::Upload {
                    file_name: file_name.to_string(),
                },
                error.clone(),
            );
            return Err(error);
        };
        self.next_upload_id += 1;
        let ticket = UploadTicket {
            id: self.next_upload_id,
            generation: channel.generation(),
            conversation: channel.conversation().clone(),
            file_name: file_name.to_string(),
        };
        self.pending_uploads.insert(ticket.id, ticket.clone());
        debug!(
            upload_id = ticket.id,
            generation = %ticket.generation,
            conversation = %ticket.conversation,
            file = %ticket.file_name,
            "upload started"
        );
        Ok(ticket)
    }

    /// Sends the asset reference only if the ticket's channel is still the
    /// active one and open.
    pub fn complete_upload(
        &mut self,
        ticket: &UploadTicket,
        outcome: Result<UploadResult, SessionError>,
    ) -> Result<(), SessionError> {
        if self.pending_uploads.remove(&ticket.id).is_none() {
            // already reported when the session shut down
            debug!(upload_id = ticket.id, "ignoring completion for unknown upload");
            return Err(SessionError::StaleChannel {
                conversation: ticket.conversation.clone(),
            });
        }
        let open_before = self.open_data_channel();
        let result = outcome.and_then(|upload| {
            if !self.data.is_current_and_open(ticket.generation) {
                warn!(
                    upload_id = ticket.id,
                    generation = %ticket.generation,
                    conversation = %ticket.conversation,
                    "dropping upload announcement for inactive channel"
                );
                return Err(SessionError::StaleChannel {
                    conversation: ticket.conversation.clone(),
                });
            }
            self.data.send(&upload.announcement())
        });
        match &result {
            Ok(()) => debug!(upload_id = ticket.id, "upload announced"),
            Err(error) => {
                self.report_failure(
                    DeliveryOperation::Upload {
                        file_name: ticket.file_name.clone(),
                    },
                    error.clone(),
                );
                self.report_write_closed(open_before);
            }
        }
        result
    }

    pub fn handle_link_event(&mut self, event: TaggedLinkEvent) {
        match event.tag {
            LinkTag::Control => self.on_control_event(event.event),
            LinkTag::Data(generation) => self.on_data_event(generation, event.event),
        }
    }

    /// Closes both channels. Queued requests and in-flight uploads are
    /// reported as failed.
    pub fn shutdown(&mut self) {
        let abandoned = self.control.close();
        self.report_abandoned(abandoned);
        for (_, ticket) in std::mem::take(&mut self.pending_uploads) {
            self.report_failure(
                DeliveryOperation::Upload {
                    file_name: ticket.file_name,
                },
                SessionError::ChannelNotOpen,
            );
        }
        self.data.close();
        info!("session shut down");
    }

    fn on_control_event(&mut self, event: LinkEvent) {
        match self.control.handle_event(event) {
            ControlOutcome::Opened { flushed } => {
                self.notify(SessionNotice::ControlOpened { flushed });
            }
            ControlOutcome::Resolved(conversation) => {
                self.notify(SessionNotice::Resolved {
                    conversation: conversation.clone(),
                });
                self.open_conversation(conversation);
            }
            ControlOutcome::Rejected(message) => {
                self.notify(SessionNotice::ControlRejected { message });
            }
            ControlOutcome::Closed { abandoned, reason } => {
                self.report_abandoned(abandoned);
                self.notify(SessionNotice::ControlClosed { reason });
            }
            ControlOutcome::Ignored => {}
        }
    }

    fn on_data_event(&mut self, generation: Generation, event: LinkEvent) {
        match self.data.handle_event(generation, event) {
            DataOutcome::Opened(conversation) => {
                self.notify(SessionNotice::DataOpened { conversation });
            }
            DataOutcome::Message(event) => {
                let record = self.renderer.render(&event);
                self.notify(SessionNotice::Message(record));
            }
            DataOutcome::Closed {
                conversation,
                reason,
            } => {
                self.notify(SessionNotice::DataClosed {
                    conversation,
                    reason,
                });
            }
            DataOutcome::Ignored => {}
        }
    }

    fn open_conversation(&mut self, conversation: ConversationId) -> Generation {
        let replaced = self
            .data
            .active()
            .filter(|channel| channel.state() != ChannelState::Closed)
            .map(|channel| channel.conversation().clone());
        let generation =
            self.data
                .open_for(conversation, self.connector.as_ref(), self.events.clone());
        if let Some(previous) = replaced {
            self.notify(SessionNotice::DataClosed {
                conversation: previous,
                reason: Some(REPLACED_REASON.to_string()),
            });
        }
        generation
    }

    fn open_data_channel(&self) -> Option<(Generation, ConversationId)> {
        self.data
            .active()
            .filter(|channel| channel.is_open())
            .map(|channel| (channel.generation(), channel.conversation().clone()))
    }

    /// Emits the close notice for a channel that a failed write just closed.
    fn report_write_closed(&self, open_before: Option<(Generation, ConversationId)>) {
        let Some((generation, conversation)) = open_before else {
            return;
        };
        let closed_by_write = self.data.active().is_some_and(|channel| {
            channel.generation() == generation && channel.state() == ChannelState::Closed
        });
        if closed_by_write {
            self.notify(SessionNotice::DataClosed {
                conversation,
                reason: Some(WRITE_FAILED_REASON.to_string()),
            });
        }
    }

    fn report_abandoned(&self, abandoned: Vec<ControlRequest>) {
        for request in abandoned {
            self.report_failure(
                DeliveryOperation::ControlRequest {
                    target_id: request.target_id,
                },
                SessionError::ChannelClosed,
            );
        }
    }

    fn report_failure(&self, operation: DeliveryOperation, error: SessionError) {
        warn!(%operation, %error, "delivery failed");
        self.notify(SessionNotice::DeliveryFailed { operation, error });
    }

    fn notify(&self, notice: SessionNotice) {
        if self.notices.send(notice).is_err() {
            debug!("notice receiver dropped");
        }
    }
}
