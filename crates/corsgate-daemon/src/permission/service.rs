//! Grant orchestration.
//!
//! Validates a grant request, reuses existing sessions, serializes prompts
//! per pairing, and turns an approval into a stored session.

use std::collections::HashMap;
use std::sync::Arc;

use corsgate_core::{GateError, GrantKey, SessionStore};
use tokio::sync::Mutex;
use tracing::info;

use super::authority::{AuthorityTimings, Decision, PermissionAuthority};

/// Decides whether an (origin, target host) pairing gets a session.
pub struct AuthorizationService {
    store: Arc<SessionStore>,
    authority: Arc<dyn PermissionAuthority>,
    timings: AuthorityTimings,
    /// One lock per pairing so concurrent identical requests share a single
    /// prompt. Entries are never removed; the map is bounded by the number
    /// of distinct pairings ever requested.
    in_flight: Mutex<HashMap<GrantKey, Arc<Mutex<()>>>>,
}

impl AuthorizationService {
    pub fn new(
        store: Arc<SessionStore>,
        authority: Arc<dyn PermissionAuthority>,
        timings: AuthorityTimings,
    ) -> Self {
        Self {
            store,
            authority,
            timings,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a grant request to a session id.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::RequireOrigin`] or [`GateError::RequireHost`]
    /// when a field is missing, and [`GateError::PermissionDenied`] when the
    /// user declines, the prompt times out, or no user is reachable.
    pub async fn authorize(&self, origin: &str, target_host: &str) -> Result<String, GateError> {
        if origin.is_empty() {
            return Err(GateError::RequireOrigin);
        }
        if target_host.is_empty() {
            return Err(GateError::RequireHost);
        }

        let key = GrantKey::new(origin, target_host);

        // 1. Reuse an existing grant without bothering the user.
        if let Some(session_id) = self.store.lookup_by_grant(&key).await {
            info!(session_id = %session_id, "Using existing session");
            return Ok(session_id);
        }

        // 2. Serialize interactions per pairing so a burst of identical
        //    requests produces one prompt.
        let key_lock = self.key_lock(&key).await;
        let _guard = key_lock.lock().await;

        // Another request for the same pairing may have finished the grant
        // while this one waited for the key lock.
        if let Some(session_id) = self.store.lookup_by_grant(&key).await {
            info!(session_id = %session_id, "Using existing session");
            return Ok(session_id);
        }

        // 3. Ask the user. The authority enforces its own deadline.
        match self
            .authority
            .request(origin, target_host, self.timings)
            .await
        {
            Decision::Denied => {
                info!(
                    target_host = %target_host,
                    authority = self.authority.name(),
                    "Permission denied"
                );
                Err(GateError::PermissionDenied)
            }
            Decision::Allowed => {
                let session = self.store.create(key).await;
                info!(
                    session_id = %session.id,
                    origin = %origin,
                    target_host = %target_host,
                    "New session"
                );
                Ok(session.id)
            }
        }
    }

    async fn key_lock(&self, key: &GrantKey) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        Arc::clone(in_flight.entry(key.clone()).or_default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::super::authority::StaticAuthority;
    use super::*;

    struct CountingAuthority {
        decision: Decision,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl CountingAuthority {
        fn new(decision: Decision) -> Arc<Self> {
            Arc::new(Self {
                decision,
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn delayed(decision: Decision, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                decision,
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PermissionAuthority for CountingAuthority {
        async fn request(
            &self,
            _origin: &str,
            _target_host: &str,
            _timings: AuthorityTimings,
        ) -> Decision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.decision
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn service_with(authority: Arc<dyn PermissionAuthority>) -> AuthorizationService {
        AuthorizationService::new(
            Arc::new(SessionStore::new()),
            authority,
            AuthorityTimings::new(Duration::ZERO, Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn missing_origin_is_rejected_before_prompting() {
        let authority = CountingAuthority::new(Decision::Allowed);
        let service = service_with(authority.clone());

        let result = service.authorize("", "api.local:8080").await;

        assert_eq!(result, Err(GateError::RequireOrigin));
        assert_eq!(authority.calls(), 0);
    }

    #[tokio::test]
    async fn missing_host_is_rejected_before_prompting() {
        let authority = CountingAuthority::new(Decision::Allowed);
        let service = service_with(authority.clone());

        let result = service.authorize("https://app.example", "").await;

        assert_eq!(result, Err(GateError::RequireHost));
        assert_eq!(authority.calls(), 0);
    }

    #[tokio::test]
    async fn granted_pairing_is_reused_without_a_second_prompt() {
        let authority = CountingAuthority::new(Decision::Allowed);
        let service = service_with(authority.clone());

        let first = service
            .authorize("https://app.example", "api.local:8080")
            .await
            .unwrap();
        let second = service
            .authorize("https://app.example", "api.local:8080")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(authority.calls(), 1);
    }

    #[tokio::test]
    async fn denial_is_not_cached() {
        let authority = CountingAuthority::new(Decision::Denied);
        let service = service_with(authority.clone());

        let first = service.authorize("https://app.example", "api.local").await;
        let second = service.authorize("https://app.example", "api.local").await;

        assert_eq!(first, Err(GateError::PermissionDenied));
        assert_eq!(second, Err(GateError::PermissionDenied));
        assert_eq!(authority.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_identical_requests_share_one_prompt() {
        let authority = CountingAuthority::delayed(Decision::Allowed, Duration::from_millis(10));
        let service = service_with(authority.clone());

        let (first, second) = tokio::join!(
            service.authorize("https://app.example", "api.local:8080"),
            service.authorize("https://app.example", "api.local:8080"),
        );

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(authority.calls(), 1);
    }

    #[tokio::test]
    async fn distinct_pairings_prompt_separately() {
        let authority = CountingAuthority::new(Decision::Allowed);
        let service = service_with(authority.clone());

        let first = service
            .authorize("https://app.example", "api.local:8080")
            .await
            .unwrap();
        let second = service
            .authorize("https://other.example", "api.local:8080")
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(authority.calls(), 2);
    }

    #[tokio::test]
    async fn slow_approval_collapses_to_denial() {
        let store = Arc::new(SessionStore::new());
        let authority = StaticAuthority::allowing().with_delay(Duration::from_millis(200));
        let service = AuthorizationService::new(
            store.clone(),
            Arc::new(authority),
            AuthorityTimings::new(Duration::ZERO, Duration::from_millis(50)),
        );

        let result = service.authorize("https://app.example", "api.local").await;

        assert_eq!(result, Err(GateError::PermissionDenied));
        assert_eq!(store.count().await, 0);
    }
}
