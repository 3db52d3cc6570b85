//! The message envelope: one discrete protocol message per frame.

use serde::{Deserialize, Serialize};

/// A protocol message exchanged between client and server.
///
/// The set of kinds is closed, and each kind carries exactly the payload
/// declared on its variant. Presence announcements (`UserAdded`,
/// `UserRemoved`, `NameChanged`) and the registration handshake kinds are
/// only ever sent by the server; `UserName`, `Disable`, and the rename
/// request form of `NameChanged` only by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Server asks the freshly connected client to pick a display name.
    NameRequest,

    /// Client offers a candidate display name.
    UserName {
        /// The candidate name.
        name: String,
    },

    /// The candidate (or requested) name is not available.
    NameUsed,

    /// Registration succeeded. Carries the full membership snapshot in join
    /// order, including the newly accepted client itself.
    NameAccepted {
        /// Current roster snapshot.
        users: Vec<String>,
    },

    /// Broadcast chat text. Client to server, then fanned out unchanged to
    /// every other registered client.
    Text {
        /// The chat body.
        text: String,
    },

    /// Private message routed to a single recipient.
    ///
    /// The client sends `body` and `recipient`; the server fills in `sender`
    /// before forwarding, so the recipient never has to parse names out of
    /// the body.
    PrivateText {
        /// The message body.
        body: String,
        /// Who the message is for.
        recipient: String,
        /// Who sent it. Absent on the client-to-server leg.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
    },

    /// Rename. As a client-to-server request, `old` must be the session's
    /// current name; as a server broadcast it announces a completed rename.
    NameChanged {
        /// The name being given up.
        old: String,
        /// The name taking its place.
        new: String,
    },

    /// A user joined; sent to everyone except the joiner.
    UserAdded {
        /// The joining user's name.
        name: String,
    },

    /// A user left (orderly or by connection loss); sent to everyone still
    /// registered.
    UserRemoved {
        /// The departing user's name.
        name: String,
    },

    /// Client announces an orderly disconnect.
    Disable,
}

impl Message {
    /// Creates a `UserName` message.
    pub fn user_name(name: impl Into<String>) -> Self {
        Self::UserName { name: name.into() }
    }

    /// Creates a `NameAccepted` message with the given roster snapshot.
    pub fn name_accepted(users: Vec<String>) -> Self {
        Self::NameAccepted { users }
    }

    /// Creates a broadcast `Text` message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates the client-to-server leg of a private message (no sender).
    pub fn private_text(body: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self::PrivateText {
            body: body.into(),
            recipient: recipient.into(),
            sender: None,
        }
    }

    /// Creates the server-to-recipient leg of a private message.
    pub fn private_from(
        body: impl Into<String>,
        recipient: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self::PrivateText {
            body: body.into(),
            recipient: recipient.into(),
            sender: Some(sender.into()),
        }
    }

    /// Creates a `NameChanged` message (request or announcement).
    pub fn name_changed(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self::NameChanged {
            old: old.into(),
            new: new.into(),
        }
    }

    /// Creates a `UserAdded` presence message.
    pub fn user_added(name: impl Into<String>) -> Self {
        Self::UserAdded { name: name.into() }
    }

    /// Creates a `UserRemoved` presence message.
    pub fn user_removed(name: impl Into<String>) -> Self {
        Self::UserRemoved { name: name.into() }
    }

    /// The wire tag of this message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NameRequest => "name_request",
            Self::UserName { .. } => "user_name",
            Self::NameUsed => "name_used",
            Self::NameAccepted { .. } => "name_accepted",
            Self::Text { .. } => "text",
            Self::PrivateText { .. } => "private_text",
            Self::NameChanged { .. } => "name_changed",
            Self::UserAdded { .. } => "user_added",
            Self::UserRemoved { .. } => "user_removed",
            Self::Disable => "disable",
        }
    }
}
