//! Domain events emitted by the chat session state machines.
//!
//! The core session logic never touches a screen, a speaker, or a widget;
//! instead it emits [`ChatEvent`] values and a presentation layer (terminal,
//! GUI, sound effects) subscribes to the stream and renders them however it
//! likes.

/// A discrete, presentation-agnostic event produced by a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A broadcast chat message arrived.
    MessageReceived {
        /// The chat body, exactly as sent.
        text: String,
    },

    /// A private message addressed to this session arrived.
    PrivateMessageReceived {
        /// Who sent it.
        sender: String,
        /// The message body.
        body: String,
    },

    /// Another user joined the chat.
    UserJoined {
        /// The joining user's display name.
        name: String,
    },

    /// A user left the chat (orderly or by connection loss).
    UserLeft {
        /// The departing user's display name.
        name: String,
    },

    /// A user changed their display name (possibly this session's own).
    NameChanged {
        /// The previous display name.
        old: String,
        /// The new display name.
        new: String,
    },

    /// The server rejected a requested name (registration or rename).
    NameRejected,

    /// The peer sent something outside the protocol contract; the session
    /// logged it and kept going.
    ProtocolViolation {
        /// Human-readable description of what was wrong.
        detail: String,
    },

    /// The connection to the server is gone; the session has stopped.
    Disconnected,
}

impl ChatEvent {
    /// Returns true for events that indicate a presence change, i.e. the
    /// roster shown to the user needs refreshing.
    pub fn is_presence_change(&self) -> bool {
        matches!(
            self,
            Self::UserJoined { .. } | Self::UserLeft { .. } | Self::NameChanged { .. }
        )
    }
}
