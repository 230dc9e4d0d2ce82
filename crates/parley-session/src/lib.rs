//! Conversation socket multiplexer for the parley chat client.
//!
//! A [`Session`] owns one control socket, used to resolve a chat target into a
//! conversation id, and at most one data socket carrying the active
//! conversation's message stream. [`SessionRuntime`] drives a session from a
//! single task: link events, user commands and upload completions are all
//! processed one at a time, and failures surface on the [`SessionNotice`]
//! stream.

pub mod config;
pub mod control_channel;
pub mod data_channel;
pub mod error;
pub mod outbound_queue;
pub mod render;
pub mod runtime;
pub mod session;
pub mod transport;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use config::*;
pub use control_channel::*;
pub use data_channel::*;
pub use error::*;
pub use outbound_queue::*;
pub use render::*;
pub use runtime::*;
pub use session::*;
pub use transport::*;
pub use upload::*;
