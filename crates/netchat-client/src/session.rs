//! The client session state machine.
//!
//! A session walks `Disconnected → Connecting → Registering → Active` in
//! [`ClientSession::connect`], then splits into two concurrent paths: the
//! caller keeps the send methods, and [`ClientSession::spawn_receiver`]
//! runs the receive loop in its own task so incoming broadcasts never block
//! user-initiated sends. The receive loop updates the local roster and
//! emits [`ChatEvent`]s; presentation is entirely the subscriber's problem.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use netchat_core::{ChatEvent, Roster};
use netchat_protocol::{Channel, Message};

use crate::error::{ClientError, ClientResult};

/// An active connection to a chat server.
pub struct ClientSession {
    channel: Arc<Channel>,
    nickname: RwLock<String>,
    roster: RwLock<Roster>,
    connected: AtomicBool,
    events: mpsc::UnboundedSender<ChatEvent>,
}

impl ClientSession {
    /// Connects to `addr` and registers `nickname`.
    ///
    /// Drives the whole handshake: waits for the server's name request,
    /// offers the candidate name, and returns an active session on
    /// acceptance. A refused name yields [`ClientError::NameTaken`].
    pub async fn connect(
        addr: &str,
        nickname: &str,
        handshake_timeout: Duration,
        events: mpsc::UnboundedSender<ChatEvent>,
    ) -> ClientResult<Arc<Self>> {
        let channel = timeout(handshake_timeout, Channel::connect(addr))
            .await
            .map_err(|_| {
                ClientError::Connection(format!(
                    "connection timed out after {}s",
                    handshake_timeout.as_secs()
                ))
            })?
            .map_err(|e| ClientError::Connection(format!("failed to connect to {addr}: {e}")))?;

        debug!(addr = %addr, nickname = %nickname, "connected, registering name");

        loop {
            let reply = timeout(handshake_timeout, channel.receive())
                .await
                .map_err(|_| ClientError::Connection("timed out during registration".into()))?;

            match reply {
                Ok(Message::NameRequest) => {
                    channel.send(&Message::user_name(nickname)).await?;
                }
                Ok(Message::NameUsed) => {
                    channel.close().await;
                    return Err(ClientError::NameTaken);
                }
                Ok(Message::NameAccepted { users }) => {
                    debug!(roster = ?users, "name accepted");
                    let session = Arc::new(Self {
                        channel: Arc::new(channel),
                        nickname: RwLock::new(nickname.to_string()),
                        roster: RwLock::new(Roster::from_names(users)),
                        connected: AtomicBool::new(true),
                        events,
                    });
                    return Ok(session);
                }
                Ok(other) => {
                    debug!(kind = other.kind(), "ignoring unexpected message during registration");
                }
                Err(e) => {
                    channel.close().await;
                    return Err(e.into());
                }
            }
        }
    }

    /// Spawns the receive loop in its own task.
    pub fn spawn_receiver(self: &Arc<Self>) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move { session.receive_loop().await })
    }

    /// True until the transport fails or [`ClientSession::disable`] runs.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The session's current display name (tracks accepted renames).
    pub async fn nickname(&self) -> String {
        self.nickname.read().await.clone()
    }

    /// The locally cached roster, in join order.
    pub async fn roster(&self) -> Vec<String> {
        self.roster.read().await.names().to_vec()
    }

    /// Sends a broadcast chat message.
    pub async fn send_text(&self, text: &str) -> ClientResult<()> {
        self.ensure_connected()?;
        self.channel.send(&Message::text(text)).await?;
        Ok(())
    }

    /// Sends a private message to a single recipient.
    pub async fn send_private(&self, recipient: &str, body: &str) -> ClientResult<()> {
        self.ensure_connected()?;
        if *self.nickname.read().await == recipient {
            return Err(ClientError::Validation(
                "you cannot send a private message to yourself".into(),
            ));
        }
        self.channel
            .send(&Message::private_text(body, recipient))
            .await?;
        Ok(())
    }

    /// Asks the server to change this session's display name. The outcome
    /// arrives as a [`ChatEvent::NameChanged`] or [`ChatEvent::NameRejected`].
    pub async fn request_rename(&self, new: &str) -> ClientResult<()> {
        self.ensure_connected()?;
        let current = self.nickname.read().await.clone();
        self.channel
            .send(&Message::name_changed(current, new))
            .await?;
        Ok(())
    }

    /// Announces an orderly disconnect and releases the connection.
    pub async fn disable(&self) -> ClientResult<()> {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.channel.send(&Message::Disable).await;
        self.channel.close().await;
        result?;
        Ok(())
    }

    fn ensure_connected(&self) -> ClientResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ClientError::Connection("not connected".into()))
        }
    }

    /// The active receive loop: dispatches incoming envelopes to roster
    /// updates and domain events until the transport goes away. A single
    /// malformed or unexpected envelope is reported and skipped; transport
    /// failure ends the loop and flips the connected flag.
    async fn receive_loop(&self) {
        loop {
            match self.channel.receive().await {
                Ok(message) => self.dispatch(message).await,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "skipping undecodable frame");
                    self.emit(ChatEvent::ProtocolViolation {
                        detail: e.to_string(),
                    });
                }
                Err(e) => {
                    debug!(error = %e, "receive loop ending");
                    break;
                }
            }
        }

        self.connected.store(false, Ordering::Release);
        self.channel.close().await;
        self.emit(ChatEvent::Disconnected);
    }

    async fn dispatch(&self, message: Message) {
        match message {
            Message::Text { text } => {
                self.emit(ChatEvent::MessageReceived { text });
            }
            Message::PrivateText {
                body,
                sender: Some(sender),
                ..
            } => {
                self.emit(ChatEvent::PrivateMessageReceived { sender, body });
            }
            Message::PrivateText { sender: None, .. } => {
                self.emit(ChatEvent::ProtocolViolation {
                    detail: "private message without a sender".into(),
                });
            }
            Message::UserAdded { name } => {
                self.roster.write().await.insert(name.clone());
                self.emit(ChatEvent::UserJoined { name });
            }
            Message::UserRemoved { name } => {
                self.roster.write().await.remove(&name);
                self.emit(ChatEvent::UserLeft { name });
            }
            Message::NameChanged { old, new } => {
                self.roster.write().await.rename(&old, new.clone());
                {
                    let mut nickname = self.nickname.write().await;
                    if *nickname == old {
                        *nickname = new.clone();
                    }
                }
                self.emit(ChatEvent::NameChanged { old, new });
            }
            Message::NameUsed => {
                // In the active state this is the server refusing a rename.
                self.emit(ChatEvent::NameRejected);
            }
            other => {
                warn!(kind = other.kind(), "unexpected message in active session");
                self.emit(ChatEvent::ProtocolViolation {
                    detail: format!("unexpected {} message", other.kind()),
                });
            }
        }
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.events.send(event);
    }
}
