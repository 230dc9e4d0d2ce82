//! Single-task event loop driving a [`Session`].
//!
//! Link events, user commands and upload completions arrive on separate
//! channels and are applied to the session one at a time. Uploads run in
//! spawned tasks and report back through the completion channel, so the
//! session is re-validated when they finish rather than when they start.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parley_protocol::{ConversationId, UploadResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    ClientConfig, Connector, HttpUploader, LinkEventReceiver, NoticeReceiver, Session,
    SessionError, UploadFile, UploadTicket, Uploader, WebSocketConnector,
};


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    SelectUser(i64),
    SelectGroup(ConversationId),
    SendText(String),
    Upload(PathBuf),
    Shutdown,
}

#[derive(Debug, Clone)]
/// Cloneable input side of a running session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn select_user(&self, target_id: i64) -> Result<(), SessionError> {
        self.submit(SessionCommand::SelectUser(target_id))
    }

    pub fn select_group(&self, conversation: ConversationId) -> Result<(), SessionError> {
        self.submit(SessionCommand::SelectGroup(conversation))
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.submit(SessionCommand::SendText(text.into()))
    }

    pub fn upload(&self, path: impl Into<PathBuf>) -> Result<(), SessionError> {
        self.submit(SessionCommand::Upload(path.into()))
    }

    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.submit(SessionCommand::Shutdown)
    }

    fn submit(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::ChannelClosed)
    }
}

struct UploadCompletion {
    ticket: UploadTicket,
    outcome: Result<UploadResult, SessionError>,
}

pub struct SessionRuntime {
    session: Session,
    uploader: Arc<dyn Uploader>,
    link_events: LinkEventReceiver,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    completions_tx: mpsc::UnboundedSender<UploadCompletion>,
    completions_rx: mpsc::UnboundedReceiver<UploadCompletion>,
}

impl SessionRuntime {
    /// Runs until a shutdown command arrives or every handle is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.link_events.recv() => {
                    self.session.handle_link_event(event);
                }
                Some(completion) = self.completions_rx.recv() => {
                    // failures are already on the notice stream
                    let _ = self
                        .session
                        .complete_upload(&completion.ticket, completion.outcome);
                }
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
            }
        }
        self.session.shutdown();
        info!("session runtime stopped");
    }

    fn apply(&mut self, command: SessionCommand) {
        debug!(?command, "applying session command");
        match command {
            SessionCommand::SelectUser(target_id) => {
                let _ = self.session.select_user(target_id);
            }
            SessionCommand::SelectGroup(conversation) => {
                self.session.select_group(conversation);
            }
            SessionCommand::SendText(text) => {
                let _ = self.session.send_text(&text);
            }
            SessionCommand::Upload(path) => self.start_upload(path),
            SessionCommand::Shutdown => {}
        }
    }

    fn start_upload(&mut self, path: PathBuf) {
        let Ok(ticket) = self.session.begin_upload(&display_file_name(&path)) else {
            return;
        };
        let uploader = Arc::clone(&self.uploader);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let outcome = match UploadFile::read(&path).await {
                Ok(file) => uploader.upload(file).await,
                Err(error) => Err(error),
            };
            if completions
                .send(UploadCompletion { ticket, outcome })
                .is_err()
            {
                debug!("upload finished after session runtime stopped");
            }
        });
    }
}

fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A running session: its input handle, notice stream and loop task.
pub struct SpawnedSession {
    pub handle: SessionHandle,
    pub notices: NoticeReceiver,
    pub task: JoinHandle<()>,
}

/// Spawns a session wired to the websocket transport and HTTP uploads.
pub fn spawn_session(config: &ClientConfig) -> Result<SpawnedSession, SessionError> {
    config.websocket_base_url()?;
    let uploader = HttpUploader::new(config)?;
    let connector = WebSocketConnector::new(config.clone());
    Ok(spawn_session_with(
        config,
        Arc::new(connector),
        Arc::new(uploader),
    ))
}

pub fn spawn_session_with(
    config: &ClientConfig,
    connector: Arc<dyn Connector>,
    uploader: Arc<dyn Uploader>,
) -> SpawnedSession {
    let (events_tx, link_events) = mpsc::unbounded_channel();
    let (notices_tx, notices) = mpsc::unbounded_channel();
    let (commands_tx, commands) = mpsc::unbounded_channel();
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();

    let session = Session::open(config, connector, events_tx, notices_tx);
    let runtime = SessionRuntime {
        session,
        uploader,
        link_events,
        commands,
        completions_tx,
        completions_rx,
    };
    let task = tokio::spawn(runtime.run());
    SpawnedSession {
        handle: SessionHandle {
            commands: commands_tx,
        },
        notices,
        task,
    }
}
