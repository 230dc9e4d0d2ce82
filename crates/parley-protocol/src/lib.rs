//! Wire protocol for the parley chat client.
//!
//! Frame types and codecs for the control socket (conversation resolution),
//! the per-conversation data socket (chat events), asset references and the
//! upload endpoint response.
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use parley_protocol::{parse_control_frame, ControlFrame, ConversationId};
//!
//! let frame = parse_control_frame(r#"{"conv_id": 4294967298}"#)?;
//! assert_eq!(frame, ControlFrame::Resolved(ConversationId::Numeric(4294967298)));
//! # Ok(())
//! # }
//! ```

pub mod asset_reference;
pub mod chat_protocol;
pub mod control_protocol;
pub mod conversation_id;
pub mod error;
pub mod upload_protocol;

pub use asset_reference::*;
pub use chat_protocol::*;
pub use control_protocol::*;
pub use conversation_id::*;
pub use error::*;
pub use upload_protocol::*;
