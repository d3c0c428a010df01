//! Decision resolution.
//!
//! Order matters: staleness is checked before validation, validation before
//! any store query. UNKNOWN covers both staleness and store failure; the log
//! line says which.

use std::sync::Arc;
use std::time::Duration;

use stationauth_core::{
    AuthorizationRequest, Clock, Deadline, DecisionOutcome, validate_callback_url,
    validate_driver_token,
};
use tracing::{debug, warn};

use crate::acl::AccessControlStore;
use crate::error::AclError;

pub struct DecisionResolver {
    store: Arc<dyn AccessControlStore>,
    clock: Arc<dyn Clock>,
    query_timeout: Option<Duration>,
}

impl DecisionResolver {
    pub fn new(store: Arc<dyn AccessControlStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            query_timeout: None,
        }
    }

    /// Cap every store query at `timeout`, even when the request has more time left.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Resolve `request` against the store, bounded by `deadline`.
    pub async fn resolve(
        &self,
        request: &AuthorizationRequest,
        deadline: Deadline,
    ) -> DecisionOutcome {
        if deadline.is_expired(self.clock.now()) {
            warn!(
                station_id = %request.station_id,
                expiry_time = %request.expiry_time,
                "Task expired before processing"
            );
            return DecisionOutcome::Unknown;
        }

        if !validate_driver_token(&request.driver_token)
            || !validate_callback_url(&request.callback_url)
        {
            debug!(station_id = %request.station_id, "Request failed validation");
            return DecisionOutcome::Invalid;
        }

        // Re-read the clock: validation is cheap, but expiry may have passed
        // in between, and a zero-length query is not a query.
        let Some(remaining) = deadline.remaining(self.clock.now()) else {
            warn!(
                station_id = %request.station_id,
                "Task expired before the store query could start"
            );
            return DecisionOutcome::Unknown;
        };
        let budget = match self.query_timeout {
            Some(cap) => remaining.min(cap),
            None => remaining,
        };

        debug!(
            station_id = %request.station_id,
            driver_token = %request.driver_token,
            budget_ms = budget.as_millis() as u64,
            "Querying access control store"
        );

        let query = self
            .store
            .is_authorized(request.station_id, &request.driver_token, budget);
        let answer = match tokio::time::timeout(budget, query).await {
            Ok(answer) => answer,
            Err(_) => Err(AclError::Timeout),
        };

        match answer {
            Ok(true) => DecisionOutcome::Allowed,
            Ok(false) => DecisionOutcome::NotAllowed,
            Err(AclError::Timeout) => {
                warn!(
                    station_id = %request.station_id,
                    budget_ms = budget.as_millis() as u64,
                    "Access control store timed out"
                );
                DecisionOutcome::Unknown
            }
            Err(e) => {
                warn!(
                    station_id = %request.station_id,
                    error = %e,
                    "Access control store query failed"
                );
                DecisionOutcome::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use stationauth_core::FixedClock;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;
    use time::macros::datetime;
    use uuid::Uuid;

    const NOW: OffsetDateTime = datetime!(2024-05-01 12:00:00 UTC);

    enum Behavior {
        Member(bool),
        Fail,
        Hang,
    }

    struct FakeStore {
        behavior: Behavior,
        calls: AtomicUsize,
        last_timeout: Mutex<Option<Duration>>,
    }

    impl FakeStore {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
                last_timeout: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AccessControlStore for FakeStore {
        async fn is_authorized(
            &self,
            _station_id: Uuid,
            _driver_token: &str,
            timeout: Duration,
        ) -> Result<bool, AclError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_timeout.lock().unwrap() = Some(timeout);
            match self.behavior {
                Behavior::Member(member) => Ok(member),
                Behavior::Fail => Err(AclError::Transport("connection refused".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(true)
                }
            }
        }
    }

    fn resolver(store: Arc<FakeStore>) -> DecisionResolver {
        DecisionResolver::new(store, Arc::new(FixedClock::new(NOW)))
    }

    fn request(token: &str, url: &str, expiry: OffsetDateTime) -> AuthorizationRequest {
        AuthorizationRequest::new(Uuid::new_v4(), token, url, expiry)
    }

    fn valid_request() -> AuthorizationRequest {
        request(
            "valid_driver_token_12345",
            "http://callback.url",
            NOW + Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_member_is_allowed() {
        let store = FakeStore::new(Behavior::Member(true));
        let request = valid_request();
        let outcome = resolver(store.clone()).resolve(&request, request.deadline()).await;
        assert_eq!(outcome, DecisionOutcome::Allowed);
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_member_is_not_allowed() {
        let store = FakeStore::new(Behavior::Member(false));
        let request = valid_request();
        let outcome = resolver(store.clone()).resolve(&request, request.deadline()).await;
        assert_eq!(outcome, DecisionOutcome::NotAllowed);
    }

    #[tokio::test]
    async fn test_bad_token_skips_store() {
        let store = FakeStore::new(Behavior::Member(true));
        let request = request("invalid_token", "http://callback.url", NOW + Duration::from_secs(5));
        let outcome = resolver(store.clone()).resolve(&request, request.deadline()).await;
        assert_eq!(outcome, DecisionOutcome::Invalid);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_bad_callback_url_skips_store() {
        let store = FakeStore::new(Behavior::Member(true));
        let request = request(
            "valid_driver_token_12345",
            "invalid_url",
            NOW + Duration::from_secs(5),
        );
        let outcome = resolver(store.clone()).resolve(&request, request.deadline()).await;
        assert_eq!(outcome, DecisionOutcome::Invalid);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_request_is_unknown_without_query() {
        let store = FakeStore::new(Behavior::Member(true));
        let request = request(
            "valid_driver_token_12345",
            "http://callback.url",
            NOW - Duration::from_nanos(1),
        );
        let outcome = resolver(store.clone()).resolve(&request, request.deadline()).await;
        assert_eq!(outcome, DecisionOutcome::Unknown);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_expiry_wins_over_invalid_input() {
        let store = FakeStore::new(Behavior::Member(true));
        let request = request("invalid_token", "invalid_url", NOW);
        let outcome = resolver(store.clone()).resolve(&request, request.deadline()).await;
        assert_eq!(outcome, DecisionOutcome::Unknown);
    }

    #[tokio::test]
    async fn test_store_failure_is_unknown() {
        let store = FakeStore::new(Behavior::Fail);
        let request = valid_request();
        let outcome = resolver(store.clone()).resolve(&request, request.deadline()).await;
        assert_eq!(outcome, DecisionOutcome::Unknown);
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_store_is_cut_off_at_deadline() {
        let store = FakeStore::new(Behavior::Hang);
        let request = valid_request();
        let outcome = resolver(store.clone()).resolve(&request, request.deadline()).await;
        assert_eq!(outcome, DecisionOutcome::Unknown);
        assert_eq!(*store.last_timeout.lock().unwrap(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_query_budget_is_capped() {
        let store = FakeStore::new(Behavior::Member(true));
        let request = valid_request();
        let resolver = resolver(store.clone()).with_query_timeout(Duration::from_secs(1));
        resolver.resolve(&request, request.deadline()).await;
        assert_eq!(*store.last_timeout.lock().unwrap(), Some(Duration::from_secs(1)));
    }
}
