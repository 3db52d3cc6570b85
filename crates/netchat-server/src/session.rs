//! The server session handler: one per accepted connection.
//!
//! Each handler owns its client's channel for the connection's lifetime and
//! walks it through three states: awaiting a name, active, closed. Name
//! registration consults the registry and the injected user store; the
//! active loop routes broadcast, private, rename, and disconnect traffic
//! through the shared registry.

use std::sync::Arc;

use tracing::{debug, info, warn};

use netchat_protocol::{Channel, Message};

use crate::error::{ServerError, ServerResult};
use crate::registry::Registry;
use crate::users::UserStore;

/// Injected display-name syntax rules.
///
/// Returns `Err` with a human-readable reason when a candidate name is
/// unacceptable. The actual rule set belongs to the deployment; the server
/// only consumes the verdict.
pub type NameRules = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Baseline rules: printable, reasonably short, not blank.
pub fn default_name_rules() -> NameRules {
    Arc::new(|name: &str| {
        if name.trim().is_empty() {
            return Err("name is blank".to_string());
        }
        if name.chars().count() > 32 {
            return Err("name is longer than 32 characters".to_string());
        }
        if name.chars().any(char::is_control) {
            return Err("name contains control characters".to_string());
        }
        Ok(())
    })
}

/// Why an active session ended.
enum Departure {
    /// The client sent an orderly disconnect.
    Orderly,
    /// The transport failed underneath the session.
    ConnectionLost,
}

/// Drives one client connection from accept to close.
pub struct SessionHandler {
    channel: Arc<Channel>,
    registry: Arc<Registry>,
    users: Arc<dyn UserStore>,
    name_rules: NameRules,
}

impl SessionHandler {
    /// Creates a handler for an accepted connection.
    pub fn new(
        channel: Arc<Channel>,
        registry: Arc<Registry>,
        users: Arc<dyn UserStore>,
        name_rules: NameRules,
    ) -> Self {
        Self {
            channel,
            registry,
            users,
            name_rules,
        }
    }

    /// Runs the session to completion. Never returns an error: every
    /// failure is contained here, logged, and ends with the channel closed
    /// and the registry consistent.
    pub async fn run(self) {
        match self.register().await {
            Ok(Some(name)) => {
                info!(name = %name, peer = ?self.channel.peer_addr(), "user joined");
                let mut name = name;
                let departure = self.active_loop(&mut name).await;
                match departure {
                    Departure::Orderly => info!(name = %name, "user left"),
                    Departure::ConnectionLost => {
                        info!(name = %name, "user connection lost")
                    }
                }
                self.cleanup(&name).await;
            }
            Ok(None) => {
                // Registration was refused; the refusal has been sent.
                self.channel.close().await;
            }
            Err(e) => {
                debug!(error = %e, peer = ?self.channel.peer_addr(), "connection lost during registration");
                self.channel.close().await;
            }
        }
    }

    /// The registration handshake. `Ok(Some(name))` means the session is
    /// registered and active; `Ok(None)` means it was refused (the client
    /// has been told); `Err` means the transport died mid-handshake.
    async fn register(&self) -> ServerResult<Option<String>> {
        self.channel.send(&Message::NameRequest).await?;

        loop {
            match self.channel.receive().await {
                Ok(Message::UserName { name }) => {
                    return self.try_register(name).await;
                }
                Ok(Message::Disable) => return Ok(None),
                Ok(other) => {
                    warn!(kind = other.kind(), "unexpected message before registration");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn try_register(&self, name: String) -> ServerResult<Option<String>> {
        if let Err(reason) = (self.name_rules)(&name) {
            debug!(name = %name, reason = %reason, "rejecting invalid name");
            self.channel.send(&Message::NameUsed).await?;
            return Ok(None);
        }

        // Names reserved by a persisted account are off limits even when
        // their owner is offline.
        match self.users.lookup_nickname(&name).await {
            Ok(None) => {}
            Ok(Some(_)) => {
                debug!(name = %name, "rejecting reserved name");
                self.channel.send(&Message::NameUsed).await?;
                return Ok(None);
            }
            Err(e) => {
                warn!(name = %name, error = %e, "user store lookup failed");
                self.channel.send(&Message::NameUsed).await?;
                return Ok(None);
            }
        }

        match self.registry.add(&name, self.channel.clone()).await {
            Ok(()) => {}
            Err(ServerError::DuplicateName { .. }) => {
                debug!(name = %name, "rejecting name already in use");
                self.channel.send(&Message::NameUsed).await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        // The snapshot is taken after the add, so the joiner sees itself.
        let roster = self.registry.snapshot().await;
        if let Err(e) = self.channel.send(&Message::name_accepted(roster)).await {
            self.registry.remove(&name).await;
            return Err(e.into());
        }

        self.registry
            .broadcast_except(Some(&name), &Message::user_added(&name))
            .await;

        Ok(Some(name))
    }

    /// The active dispatch loop. Returns why the session ended; the caller
    /// runs the cleanup path either way.
    async fn active_loop(&self, name: &mut String) -> Departure {
        loop {
            match self.channel.receive().await {
                Ok(Message::Text { text }) => {
                    self.registry
                        .broadcast_except(Some(name), &Message::Text { text })
                        .await;
                }
                Ok(Message::PrivateText {
                    body, recipient, ..
                }) => {
                    self.route_private(name, &recipient, body).await;
                }
                Ok(Message::NameChanged { old, new }) => {
                    self.handle_rename(name, old, new).await;
                }
                Ok(Message::Disable) => return Departure::Orderly,
                Ok(other) => {
                    warn!(name = %name, kind = other.kind(), "unexpected message in active session");
                }
                Err(e) => {
                    debug!(name = %name, error = %e, "transport failure in active session");
                    return Departure::ConnectionLost;
                }
            }
        }
    }

    /// Forwards a private message to its single recipient. An unknown
    /// recipient drops the message silently.
    async fn route_private(&self, sender: &str, recipient: &str, body: String) {
        match self.registry.lookup(recipient).await {
            Some(channel) => {
                let forwarded = Message::private_from(body, recipient, sender);
                if let Err(e) = channel.send(&forwarded).await {
                    warn!(recipient = %recipient, error = %e, "dropping unreachable recipient");
                    channel.close().await;
                }
            }
            None => {
                debug!(sender = %sender, recipient = %recipient, "dropping private message to unknown recipient");
            }
        }
    }

    /// Handles a rename request. On success the session continues under the
    /// new name and everyone hears the announcement; any refusal is
    /// reported to the initiator alone and changes nothing.
    async fn handle_rename(&self, current: &mut String, old: String, new: String) {
        if old != *current {
            warn!(name = %current, claimed = %old, "rename request with stale name");
            self.refuse(current).await;
            return;
        }
        if let Err(reason) = (self.name_rules)(&new) {
            debug!(name = %current, new = %new, reason = %reason, "rejecting invalid rename");
            self.refuse(current).await;
            return;
        }

        if let Err(e) = self.users.rename_nickname(&old, &new).await {
            debug!(name = %current, new = %new, error = %e, "user store refused rename");
            self.refuse(current).await;
            return;
        }

        if let Err(e) = self.registry.rename(&old, &new).await {
            debug!(name = %current, new = %new, error = %e, "registry refused rename");
            // Put the persisted reservation back where it was.
            if let Err(e) = self.users.rename_nickname(&new, &old).await {
                warn!(old = %old, new = %new, error = %e, "could not restore reservation after failed rename");
            }
            self.refuse(current).await;
            return;
        }

        info!(old = %old, new = %new, "user renamed");
        *current = new.clone();
        self.registry
            .broadcast_except(None, &Message::name_changed(old, new))
            .await;
    }

    /// Tells the initiating client its requested name is not available. A
    /// failure here will surface on the session's next receive.
    async fn refuse(&self, name: &str) {
        if let Err(e) = self.channel.send(&Message::NameUsed).await {
            debug!(name = %name, error = %e, "could not deliver refusal");
        }
    }

    /// Removes the session from the registry, announces the departure once,
    /// and releases the connection.
    async fn cleanup(&self, name: &str) {
        if self.registry.remove(name).await {
            self.registry
                .broadcast_except(None, &Message::user_removed(name))
                .await;
        }
        self.channel.close().await;
    }
}
