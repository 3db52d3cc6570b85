//! Core types shared by the netchat server and client: the domain events the
//! session state machines emit, the ordered roster of online users, and
//! unified tracing initialization for all binaries.

pub mod event;
pub mod roster;
pub mod tracing;

pub use event::ChatEvent;
pub use roster::Roster;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
