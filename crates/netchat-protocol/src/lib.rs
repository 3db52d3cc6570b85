//! Wire protocol for the netchat client and server.
//!
//! # Protocol overview
//!
//! Every protocol message is one [`Message`] envelope, sent as
//! length-prefixed JSON over a persistent TCP stream:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```
//!
//! The length prefix makes frames self-delimiting: a receiver always
//! reconstructs exactly one envelope per read, with no partial-record
//! ambiguity. The envelope enum is internally tagged (`"type"`), so each
//! message kind admits exactly one payload shape by construction.
//!
//! # Example
//!
//! ```rust
//! use netchat_protocol::{Message, decode_message, encode_message};
//!
//! let message = Message::text("hello");
//! let bytes = encode_message(&message).unwrap();
//! let decoded = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, message);
//! ```

mod error;
mod framing;
mod message;
mod transport;

pub use error::{TransportError, TransportResult};
pub use framing::{FrameReader, FrameWriter, decode_message, encode_message};
pub use message::Message;
pub use transport::Channel;

/// Maximum frame size (64 KiB). Chat envelopes are small; anything bigger
/// is a framing error, not a message.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;
