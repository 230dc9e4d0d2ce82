//! Line-oriented console: stdin commands in, rendered notices out.

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parley_protocol::ConversationId;
use parley_session::{NoticeReceiver, SessionHandle, SessionNotice};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

pub(crate) const CONSOLE_USAGE: &str = "commands:
  /user <id>       open the conversation with a user
  /group <conv-id> open a group conversation
  /upload <path>   upload a file into the active conversation
  /help            show this help
  /quit            leave
anything else is sent as a message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConsoleCommand {
    SelectUser(i64),
    SelectGroup(ConversationId),
    Upload(PathBuf),
    Send(String),
    Help,
    Quit,
    Empty,
}

pub(crate) fn parse_console_command(line: &str) -> Result<ConsoleCommand, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(ConsoleCommand::Empty);
    }
    let Some(command_line) = trimmed.strip_prefix('/') else {
        return Ok(ConsoleCommand::Send(trimmed.to_string()));
    };
    let (name, argument) = match command_line.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (command_line, ""),
    };
    match name {
        "user" => {
            let target_id = argument
                .parse::<i64>()
                .map_err(|_| format!("usage: /user <id> (got '{argument}')"))?;
            if target_id <= 0 {
                return Err("user id must be greater than 0".to_string());
            }
            Ok(ConsoleCommand::SelectUser(target_id))
        }
        "group" => argument
            .parse::<ConversationId>()
            .map(ConsoleCommand::SelectGroup)
            .map_err(|error| format!("usage: /group <conv-id> ({error})")),
        "upload" => {
            if argument.is_empty() {
                return Err("usage: /upload <path>".to_string());
            }
            Ok(ConsoleCommand::Upload(PathBuf::from(argument)))
        }
        "help" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(format!("unknown command '/{other}', try /help")),
    }
}

pub(crate) fn render_notice(notice: &SessionNotice) -> String {
    match notice {
        SessionNotice::ControlOpened { .. } => "* connected".to_string(),
        SessionNotice::Resolved { conversation } => {
            format!("* resolved conversation {conversation}")
        }
        SessionNotice::ControlRejected { message } => format!("! server rejected lookup: {message}"),
        SessionNotice::ControlClosed { reason } => format!(
            "! control connection closed ({}); restart to select new users",
            reason.as_deref().unwrap_or("no reason given")
        ),
        SessionNotice::DataOpened { conversation } => {
            format!("* joined conversation {conversation}")
        }
        SessionNotice::DataClosed {
            conversation,
            reason,
        } => format!(
            "* left conversation {conversation} ({})",
            reason.as_deref().unwrap_or("closed")
        ),
        SessionNotice::Message(record) => record.to_string(),
        SessionNotice::DeliveryFailed { operation, error } => {
            format!("! {operation} failed: {error}")
        }
    }
}

fn dispatch(handle: &SessionHandle, command: ConsoleCommand) -> Result<()> {
    match command {
        ConsoleCommand::SelectUser(target_id) => handle.select_user(target_id)?,
        ConsoleCommand::SelectGroup(conversation) => handle.select_group(conversation)?,
        ConsoleCommand::Upload(path) => handle.upload(path)?,
        ConsoleCommand::Send(text) => handle.send_text(text)?,
        ConsoleCommand::Help => println!("{CONSOLE_USAGE}"),
        ConsoleCommand::Quit | ConsoleCommand::Empty => {}
    }
    Ok(())
}

/// Runs until `/quit`, end of input, ctrl-c, or the session stops.
pub(crate) async fn run_console(handle: &SessionHandle, notices: NoticeReceiver) -> Result<()> {
    let input = BufReader::new(tokio::io::stdin());
    run_console_with(handle, notices, input, tokio::signal::ctrl_c()).await
}

/// `interrupt` is polled across iterations, so a signal raised while a line is
/// being dispatched still ends the loop.
pub(crate) async fn run_console_with<R, S, T>(
    handle: &SessionHandle,
    mut notices: NoticeReceiver,
    input: R,
    interrupt: S,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = T>,
{
    let mut lines = input.lines();
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read console input")? else {
                    break;
                };
                match parse_console_command(&line) {
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(command) => dispatch(handle, command)
                        .context("chat session stopped unexpectedly")?,
                    Err(message) => eprintln!("{message}"),
                }
            }
            notice = notices.recv() => {
                let Some(notice) = notice else {
                    break;
                };
                println!("{}", render_notice(&notice));
            }
            _ = &mut interrupt => break,
        }
    }
    Ok(())
}
