//! TCP listener and accept loop.
//!
//! Binds the configured address and spawns one [`SessionHandler`] task per
//! accepted connection. A semaphore caps concurrent connections; accept
//! errors are logged and the loop keeps going.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use netchat_protocol::Channel;

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::registry::Registry;
use crate::session::{NameRules, SessionHandler, default_name_rules};
use crate::users::UserStore;

/// The chat server: listener, shared registry, and injected collaborators.
pub struct ChatServer {
    listener: TcpListener,
    connection_semaphore: Arc<Semaphore>,
    registry: Arc<Registry>,
    users: Arc<dyn UserStore>,
    name_rules: NameRules,
}

impl ChatServer {
    /// Binds the configured address with the given user store and the
    /// default name rules.
    pub async fn bind(config: ServerConfig, users: Arc<dyn UserStore>) -> ServerResult<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "chat server listening");

        Ok(Self {
            listener,
            connection_semaphore: Arc::new(Semaphore::new(config.max_connections)),
            registry: Arc::new(Registry::new()),
            users,
            name_rules: default_name_rules(),
        })
    }

    /// Builder: replace the display-name syntax rules.
    pub fn with_name_rules(mut self, rules: NameRules) -> Self {
        self.name_rules = rules;
        self
    }

    /// The address the server actually bound (useful with port 0).
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The shared connection registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Runs the accept loop indefinitely.
    pub async fn run(&self) -> ServerResult<()> {
        loop {
            let permit = self.connection_semaphore.clone().acquire_owned().await;
            let permit = permit.expect("semaphore should not be closed");

            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "accepted connection");
                    let handler = SessionHandler::new(
                        Arc::new(Channel::new(stream)),
                        self.registry.clone(),
                        self.users.clone(),
                        self.name_rules.clone(),
                    );
                    tokio::spawn(async move {
                        let _permit = permit;
                        handler.run().await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    // Keep accepting despite errors.
                }
            }
        }
    }

    /// Runs the accept loop until the shutdown future completes.
    pub async fn run_until_shutdown<S>(&self, shutdown: S) -> ServerResult<()>
    where
        S: std::future::Future<Output = ()> + Send,
    {
        tokio::select! {
            result = self.run() => result,
            _ = shutdown => {
                info!("shutdown signal received");
                Ok(())
            }
        }
    }
}
