use clap::Parser;
use parley_protocol::ConversationId;
use parley_session::{ClientConfig, DEFAULT_SERVER_BASE_URL};

use crate::cli_types::CliOverflowPolicy;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_i64(value: &str) -> Result<i64, String> {
    let parsed = value
        .trim()
        .parse::<i64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed <= 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_conversation_id(value: &str) -> Result<ConversationId, String> {
    value.parse::<ConversationId>().map_err(|error| error.to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "parley",
    about = "Terminal client for one-to-one and group chat conversations",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "PARLEY_SERVER",
        default_value = DEFAULT_SERVER_BASE_URL,
        help = "HTTP base URL of the chat server API; websocket URLs are derived from it"
    )]
    pub server: String,

    #[arg(
        long = "user-id",
        env = "PARLEY_USER_ID",
        value_parser = parse_positive_i64,
        help = "Your own user id, used to label your messages as 'You'"
    )]
    pub user_id: i64,

    #[arg(
        long = "chat-with",
        value_parser = parse_positive_i64,
        conflicts_with = "group",
        help = "Open the one-to-one conversation with this user id on startup"
    )]
    pub chat_with: Option<i64>,

    #[arg(
        long,
        value_parser = parse_conversation_id,
        help = "Open this group conversation id on startup"
    )]
    pub group: Option<ConversationId>,

    #[arg(
        long = "queue-capacity",
        env = "PARLEY_QUEUE_CAPACITY",
        value_parser = parse_positive_usize,
        help = "Maximum conversation lookups held while the control socket connects (unbounded when unset)"
    )]
    pub queue_capacity: Option<usize>,

    #[arg(
        long = "queue-overflow",
        env = "PARLEY_QUEUE_OVERFLOW",
        value_enum,
        default_value_t = CliOverflowPolicy::RejectNewest,
        help = "What to do when --queue-capacity is reached"
    )]
    pub queue_overflow: CliOverflowPolicy,

    #[arg(
        long = "connect-timeout-ms",
        env = "PARLEY_CONNECT_TIMEOUT_MS",
        default_value_t = 10_000,
        help = "Websocket connect timeout in milliseconds (0 disables)"
    )]
    pub connect_timeout_ms: u64,

    #[arg(
        long = "upload-timeout-ms",
        env = "PARLEY_UPLOAD_TIMEOUT_MS",
        default_value_t = 120_000,
        help = "Upload request timeout in milliseconds (0 disables)"
    )]
    pub upload_timeout_ms: u64,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_base_url: self.server.clone(),
            self_user_id: self.user_id,
            queue_capacity: self.queue_capacity,
            overflow_policy: self.queue_overflow.into(),
            connect_timeout_ms: self.connect_timeout_ms,
            upload_timeout_ms: self.upload_timeout_ms,
        }
    }
}
