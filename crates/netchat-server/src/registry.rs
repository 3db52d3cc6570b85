//! The connection registry: who is online, and how to reach them.
//!
//! A single insertion-ordered map from display name to live channel, shared
//! by every session handler. Structural changes (`add`, `remove`, `rename`)
//! take the write lock and are mutually exclusive with each other and with
//! snapshot/fan-out iteration; lookups take the read lock and only ever see
//! fully-formed entries.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use netchat_protocol::{Channel, Message};

use crate::error::{ServerError, ServerResult};

struct RegistryEntry {
    name: String,
    channel: Arc<Channel>,
}

/// Concurrent map of display name to live [`Channel`].
///
/// The session handler owns its channel; the registry holds a routing
/// reference that exists exactly from successful registration until
/// disconnect or removal.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<Vec<RegistryEntry>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a name. Fails with [`ServerError::DuplicateName`] if the
    /// name is already present, leaving the existing entry untouched.
    pub async fn add(&self, name: &str, channel: Arc<Channel>) -> ServerResult<()> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.name == name) {
            return Err(ServerError::duplicate_name(name));
        }
        entries.push(RegistryEntry {
            name: name.to_string(),
            channel,
        });
        Ok(())
    }

    /// Removes a name if present. A missing name is a no-op; returns
    /// whether an entry was actually removed.
    pub async fn remove(&self, name: &str) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.name != name);
        entries.len() != before
    }

    /// Looks up the channel registered under `name`.
    pub async fn lookup(&self, name: &str) -> Option<Arc<Channel>> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.channel.clone())
    }

    /// A point-in-time copy of all registered names, in join order.
    pub async fn snapshot(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Number of registered names.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true when nobody is registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Moves an entry from `old` to `new` as one logical transition: the
    /// entry keeps its position and its channel, and there is no instant at
    /// which it is absent or at which both names resolve.
    ///
    /// Fails, leaving the entry registered under `old`, if `new` is already
    /// taken or `old` is not registered.
    pub async fn rename(&self, old: &str, new: &str) -> ServerResult<()> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.name == new) {
            return Err(ServerError::duplicate_name(new));
        }
        match entries.iter_mut().find(|e| e.name == old) {
            Some(entry) => {
                entry.name = new.to_string();
                Ok(())
            }
            None => Err(ServerError::validation(format!(
                "cannot rename unregistered name: {old}"
            ))),
        }
    }

    /// Sends `message` to every registered channel except `exclude`.
    ///
    /// The recipient list is captured under the read lock, then the sends
    /// happen outside it. A failed send never aborts the fan-out; the
    /// failing recipient's channel is closed so its own session handler
    /// observes the disconnect and cleans up.
    pub async fn broadcast_except(&self, exclude: Option<&str>, message: &Message) {
        let recipients: Vec<(String, Arc<Channel>)> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|e| exclude != Some(e.name.as_str()))
                .map(|e| (e.name.clone(), e.channel.clone()))
                .collect()
        };

        debug!(
            kind = message.kind(),
            recipients = recipients.len(),
            "broadcasting"
        );

        for (name, channel) in recipients {
            if let Err(e) = channel.send(message).await {
                warn!(name = %name, error = %e, "dropping unreachable recipient");
                channel.close().await;
            }
        }
    }
}
