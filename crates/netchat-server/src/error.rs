//! Server error types.

use std::io;
use thiserror::Error;

use netchat_protocol::TransportError;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
///
/// Everything here is contained to the session it happened in: a failing
/// client never takes down the accept loop or other sessions.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (bind, accept, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Transport error on a client connection.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A display name is already registered.
    #[error("display name already in use: {name}")]
    DuplicateName { name: String },

    /// A name failed the syntax rules or a request was inconsistent with
    /// the session's state.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The user-store collaborator failed.
    #[error("user store error: {message}")]
    Persistence { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Server shutdown requested.
    #[error("server shutdown requested")]
    Shutdown,
}

impl ServerError {
    /// Creates a duplicate-name error.
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
