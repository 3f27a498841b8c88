//! In-memory session store with grant deduplication.
//!
//! Two co-maintained indices over one set of sessions: the forward index
//! resolves relay requests (`session id -> session`), the reverse index
//! deduplicates authorization prompts (`grant key -> session id`) so a
//! given origin/target pair is prompted at most once for its session's
//! lifetime. Sessions live for the process lifetime; there is no expiry
//! or revocation path.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// One authorized relay channel.
///
/// The `(origin, target_host)` pair is fixed at authorization time and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque unique token, 32 lowercase hex chars, never reused.
    pub id: String,
    /// Requesting page's declared origin at authorization time.
    pub origin: String,
    /// Host (and optional port) the session is allowed to reach.
    pub target_host: String,
}

/// Identity of one `(origin, target host)` authorization.
///
/// Used as the reverse-index key. A struct key with derived equality is
/// collision-free by construction, unlike delimiter-concatenated strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrantKey {
    /// Requesting page's declared origin.
    pub origin: String,
    /// Host the page wants to reach.
    pub target_host: String,
}

impl GrantKey {
    /// Build a key from the two grant components.
    pub fn new(origin: impl Into<String>, target_host: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            target_host: target_host.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Indices {
    /// session id -> session
    forward: HashMap<String, Session>,
    /// grant key -> session id
    reverse: HashMap<GrantKey, String>,
}

/// Authoritative mapping of session IDs to sessions, plus the reverse
/// grant index. All access goes through one lock per store; the raw maps
/// are never exposed.
#[derive(Debug, Default)]
pub struct SessionStore {
    indices: RwLock<Indices>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a session by ID.
    pub async fn lookup(&self, session_id: &str) -> Option<Session> {
        self.indices.read().await.forward.get(session_id).cloned()
    }

    /// Resolve an existing grant to its session ID.
    pub async fn lookup_by_grant(&self, key: &GrantKey) -> Option<String> {
        self.indices.read().await.reverse.get(key).cloned()
    }

    /// Insert a freshly granted session, minting its ID.
    ///
    /// Re-checks the reverse index under the write lock: if another flow
    /// already stored a session for the same grant key, that session is
    /// returned instead of inserting a second one, so a race can never
    /// leave two live sessions for one pair.
    pub async fn create(&self, key: GrantKey) -> Session {
        let mut indices = self.indices.write().await;
        if let Some(existing) = indices
            .reverse
            .get(&key)
            .and_then(|id| indices.forward.get(id))
        {
            return existing.clone();
        }

        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            origin: key.origin.clone(),
            target_host: key.target_host.clone(),
        };
        indices.reverse.insert(key, session.id.clone());
        indices.forward.insert(session.id.clone(), session.clone());
        debug!(session_id = %session.id, "Stored session");
        session
    }

    /// Number of live sessions.
    pub async fn count(&self) -> usize {
        self.indices.read().await.forward.len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn create_and_lookup() {
        let store = SessionStore::new();
        let session = store
            .create(GrantKey::new("https://app.example", "api.local:8080"))
            .await;

        assert_eq!(session.origin, "https://app.example");
        assert_eq!(session.target_host, "api.local:8080");

        let resolved = store.lookup(&session.id).await.unwrap();
        assert_eq!(resolved, session);
    }

    #[tokio::test]
    async fn lookup_unknown_returns_none() {
        let store = SessionStore::new();
        assert!(store.lookup("deadbeef").await.is_none());
        assert!(
            store
                .lookup_by_grant(&GrantKey::new("https://a", "b"))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn session_id_is_32_hex_chars() {
        let store = SessionStore::new();
        let session = store.create(GrantKey::new("https://a", "b:1")).await;

        assert_eq!(session.id.len(), 32);
        assert!(session.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!session.id.contains('-'));
    }

    #[tokio::test]
    async fn same_grant_key_keeps_single_session() {
        let store = SessionStore::new();
        let key = GrantKey::new("https://app.example", "api.local:8080");

        let first = store.create(key.clone()).await;
        let second = store.create(key.clone()).await;

        assert_eq!(first.id, second.id);
        assert_eq!(store.count().await, 1);
        assert_eq!(store.lookup_by_grant(&key).await.unwrap(), first.id);
    }

    #[tokio::test]
    async fn distinct_pairs_get_distinct_sessions() {
        let store = SessionStore::new();
        let a = store
            .create(GrantKey::new("https://one.example", "api.local:8080"))
            .await;
        let b = store
            .create(GrantKey::new("https://two.example", "api.local:8080"))
            .await;
        let c = store
            .create(GrantKey::new("https://one.example", "other.local:9090"))
            .await;

        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(store.count().await, 3);
        assert_eq!(store.lookup(&b.id).await.unwrap().target_host, "api.local:8080");
        assert_eq!(store.lookup(&c.id).await.unwrap().target_host, "other.local:9090");
    }

    #[tokio::test]
    async fn concurrent_create_converges_on_one_session() {
        let store = std::sync::Arc::new(SessionStore::new());
        let key = GrantKey::new("https://app.example", "api.local:8080");

        let (a, b, c) = tokio::join!(
            store.create(key.clone()),
            store.create(key.clone()),
            store.create(key.clone()),
        );

        assert_eq!(a.id, b.id);
        assert_eq!(b.id, c.id);
        assert_eq!(store.count().await, 1);
    }
}
