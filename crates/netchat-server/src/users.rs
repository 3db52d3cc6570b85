//! The persistent user-store collaborator.
//!
//! Cross-session identity (which display names are reserved, independent of
//! who is online right now) is not the registry's business. It is consumed
//! through [`UserStore`], an explicitly constructed object injected into the
//! server and passed to each session handler, so deployments can back it
//! with whatever storage they run and tests can hand in a mock.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{ServerError, ServerResult};

/// Lookup/mutation interface over persisted display-name reservations.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the stored name matching the candidate, if one is reserved.
    async fn lookup_nickname(&self, candidate: &str) -> ServerResult<Option<String>>;

    /// Moves a reservation from `old` to `new`. A missing `old` reservation
    /// is not an error: there is simply nothing to move.
    async fn rename_nickname(&self, old: &str, new: &str) -> ServerResult<()>;

    /// Records a reservation for `nickname`.
    async fn register_nickname(&self, nickname: &str) -> ServerResult<()>;
}

/// In-memory [`UserStore`]: reservations live for the process lifetime.
///
/// The daemon uses it as the default store (seeded from `--reserve` flags);
/// tests use it as the mock.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    reserved: RwLock<Vec<String>>,
}

impl MemoryUserStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given names already reserved.
    pub fn with_reserved(names: impl IntoIterator<Item = String>) -> Self {
        let mut reserved: Vec<String> = Vec::new();
        for name in names {
            if !reserved.contains(&name) {
                reserved.push(name);
            }
        }
        Self {
            reserved: RwLock::new(reserved),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn lookup_nickname(&self, candidate: &str) -> ServerResult<Option<String>> {
        let reserved = self.reserved.read().await;
        Ok(reserved.iter().find(|n| *n == candidate).cloned())
    }

    async fn rename_nickname(&self, old: &str, new: &str) -> ServerResult<()> {
        let mut reserved = self.reserved.write().await;
        if reserved.iter().any(|n| n == new) {
            return Err(ServerError::duplicate_name(new));
        }
        if let Some(slot) = reserved.iter_mut().find(|n| *n == old) {
            *slot = new.to_string();
        }
        Ok(())
    }

    async fn register_nickname(&self, nickname: &str) -> ServerResult<()> {
        let mut reserved = self.reserved.write().await;
        if reserved.iter().any(|n| n == nickname) {
            return Err(ServerError::duplicate_name(nickname));
        }
        reserved.push(nickname.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_reserved_name() {
        let store = MemoryUserStore::with_reserved(vec!["admin".into()]);
        assert_eq!(
            store.lookup_nickname("admin").await.unwrap(),
            Some("admin".to_string())
        );
        assert_eq!(store.lookup_nickname("alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn register_then_lookup() {
        let store = MemoryUserStore::new();
        store.register_nickname("alice").await.unwrap();
        assert!(store.lookup_nickname("alice").await.unwrap().is_some());

        let err = store.register_nickname("alice").await.unwrap_err();
        assert!(matches!(err, ServerError::DuplicateName { .. }));
    }

    #[tokio::test]
    async fn rename_moves_reservation() {
        let store = MemoryUserStore::with_reserved(vec!["alice".into()]);
        store.rename_nickname("alice", "alicia").await.unwrap();
        assert!(store.lookup_nickname("alice").await.unwrap().is_none());
        assert!(store.lookup_nickname("alicia").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rename_without_reservation_is_noop() {
        let store = MemoryUserStore::new();
        store.rename_nickname("ghost", "spirit").await.unwrap();
        assert!(store.lookup_nickname("spirit").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_onto_reserved_name_fails() {
        let store = MemoryUserStore::with_reserved(vec!["alice".into(), "bob".into()]);
        let err = store.rename_nickname("alice", "bob").await.unwrap_err();
        assert!(matches!(err, ServerError::DuplicateName { .. }));
        assert!(store.lookup_nickname("alice").await.unwrap().is_some());
    }
}
