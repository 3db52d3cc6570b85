//! The netchat daemon: connection registry, session handlers, TCP listener.
//!
//! The server accepts persistent TCP connections, walks each client through
//! the name-registration handshake, and routes broadcast, private, rename,
//! and presence traffic between sessions through a shared concurrent
//! registry.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use netchat_server::{ChatServer, MemoryUserStore, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ChatServer::bind(
//!         ServerConfig::default(),
//!         Arc::new(MemoryUserStore::new()),
//!     )
//!     .await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod listener;
mod registry;
mod session;
mod signals;
mod users;

pub use config::{ServerConfig, default_bind_addr};
pub use error::{ServerError, ServerResult};
pub use listener::ChatServer;
pub use registry::Registry;
pub use session::{NameRules, SessionHandler, default_name_rules};
pub use signals::{ShutdownSignal, SignalHandler};
pub use users::{MemoryUserStore, UserStore};
