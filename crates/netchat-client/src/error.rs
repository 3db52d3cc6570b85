//! Client error types.

use std::fmt;

use netchat_protocol::TransportError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Connecting to the server failed.
    Connection(String),
    /// The server refused the requested display name.
    NameTaken,
    /// Transport error on the established connection.
    Transport(TransportError),
    /// A locally rejected request (bad recipient, bad name).
    Validation(String),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::NameTaken => write!(f, "a user with this name is already in the chat"),
            Self::Transport(err) => write!(f, "transport error: {}", err),
            Self::Validation(msg) => write!(f, "{}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}
