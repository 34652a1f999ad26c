//! Common test utilities for the authentication integration tests
//!
//! - In-memory store seeded with one principal
//! - Manual clock pinned to a fixed instant
//! - Managers and resolver wired the same way the server wires them

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, TimeZone, Utc};
use lrnr_shared::auth::{ApiKeyManager, AuthConfig, Authenticator, SessionManager};
use lrnr_shared::clock::ManualClock;
use lrnr_shared::models::Principal;
use lrnr_shared::store::MemoryCredentialStore;

/// Fixed starting instant for every test
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

pub struct TestContext {
    pub store: Arc<MemoryCredentialStore>,
    pub clock: Arc<ManualClock>,
    pub auth: Authenticator,
    pub user: Principal,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_store(MemoryCredentialStore::new()).await
    }

    pub async fn with_store(store: MemoryCredentialStore) -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let store = Arc::new(store.with_clock(clock.clone()));
        let user = store
            .insert_principal(Principal::new("Test User", "test@example.com", "test_hash"))
            .await;
        let auth = Authenticator::new(store.clone(), clock.clone(), AuthConfig::default());

        Self {
            store,
            clock,
            auth,
            user,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        self.auth.sessions()
    }

    pub fn api_keys(&self) -> &ApiKeyManager {
        self.auth.api_keys()
    }

    /// Seeds another principal
    pub async fn add_user(&self, email: &str) -> Principal {
        self.store
            .insert_principal(Principal::new("Other User", email, "test_hash"))
            .await
    }
}

/// Polls `check` until it returns true or a second passes
pub async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    false
}
