//! Transport and framing error types.

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while framing, sending, or receiving envelopes.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Frame exceeds the maximum allowed size.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: u32, max: u32 },

    /// A frame with a zero-length payload.
    #[error("empty frame")]
    EmptyFrame,

    /// A complete frame was read but its payload is not a valid envelope.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The channel was closed locally; no further I/O is possible.
    #[error("channel closed")]
    Closed,

    /// The peer closed the connection.
    #[error("peer disconnected")]
    Disconnected,

    /// I/O error on the underlying connection.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True when the error left the byte stream in sync, so the caller may
    /// keep receiving. A malformed or empty payload is fully consumed before
    /// it is rejected; everything else tears the connection down.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::EmptyFrame)
    }
}
