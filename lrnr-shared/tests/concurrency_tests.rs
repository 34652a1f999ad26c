/// Concurrent sign-in tests
///
/// Two sign-ins for the same user race through delete-then-insert. A store
/// wrapper holds both calls at a barrier right after their deletes, which is
/// the interleaving that leaves two live rows when nothing in the store
/// enforces one session per user.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lrnr_shared::auth::{AuthConfig, SessionManager};
use lrnr_shared::clock::ManualClock;
use lrnr_shared::models::{ApiKey, NewApiKey, Principal, Session};
use lrnr_shared::store::{CredentialStore, MemoryCredentialStore, StoreResult};
use tokio::sync::Barrier;
use uuid::Uuid;

/// Delegates to an inner store and parks `delete_sessions_for_user` callers
/// at a barrier. Uses the trait's default (non-atomic) session replacement.
struct InterleavingStore {
    inner: Arc<MemoryCredentialStore>,
    barrier: Barrier,
}

#[async_trait]
impl CredentialStore for InterleavingStore {
    async fn find_session_with_principal(
        &self,
        session_id: &str,
    ) -> StoreResult<Option<(Session, Principal)>> {
        self.inner.find_session_with_principal(session_id).await
    }

    async fn find_session(&self, session_id: &str) -> StoreResult<Option<Session>> {
        self.inner.find_session(session_id).await
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        self.inner.insert_session(session).await
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        self.inner.delete_session(session_id).await
    }

    async fn delete_session_if_expired(&self, session_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.delete_session_if_expired(session_id, now).await
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        let removed = self.inner.delete_sessions_for_user(user_id).await?;
        self.barrier.wait().await;
        Ok(removed)
    }

    async fn update_session_expiry(
        &self,
        session_id: &str,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner.update_session_expiry(session_id, new_expiry, now).await
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.inner.delete_expired_sessions(now).await
    }

    async fn find_active_api_key(
        &self,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<(ApiKey, Principal)>> {
        self.inner.find_active_api_key(key_hash, now).await
    }

    async fn insert_api_key(&self, new_key: NewApiKey) -> StoreResult<ApiKey> {
        self.inner.insert_api_key(new_key).await
    }

    async fn update_api_key_last_used(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        self.inner.update_api_key_last_used(id, now).await
    }

    async fn set_api_key_active(&self, id: Uuid, user_id: Uuid, active: bool) -> StoreResult<u64> {
        self.inner.set_api_key_active(id, user_id, active).await
    }

    async fn list_api_keys_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ApiKey>> {
        self.inner.list_api_keys_for_user(user_id).await
    }

    async fn find_api_key_for_user(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<ApiKey>> {
        self.inner.find_api_key_for_user(id, user_id).await
    }

    async fn find_principal_by_id(&self, user_id: Uuid) -> StoreResult<Option<Principal>> {
        self.inner.find_principal_by_id(user_id).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

/// Runs two interleaved `create` calls and returns the live row count
async fn race_two_sign_ins(inner: MemoryCredentialStore) -> usize {
    let inner = Arc::new(inner);
    let user = inner
        .insert_principal(Principal::new("Racer", "racer@example.com", "hash"))
        .await;
    let store = Arc::new(InterleavingStore {
        inner: inner.clone(),
        barrier: Barrier::new(2),
    });
    let sessions = SessionManager::new(
        store,
        Arc::new(ManualClock::new(common::epoch())),
        &AuthConfig::default(),
    );

    let (first, second) = tokio::join!(sessions.create(user.id), sessions.create(user.id));
    first.unwrap();
    second.unwrap();

    inner.session_count_for_user(user.id).await
}

#[tokio::test]
async fn test_unconstrained_store_can_leave_two_sessions() {
    let live = race_two_sign_ins(MemoryCredentialStore::new()).await;

    assert_eq!(live, 2);
}

#[tokio::test]
async fn test_unique_user_constraint_leaves_one_session() {
    let live = race_two_sign_ins(MemoryCredentialStore::with_unique_user_sessions()).await;

    assert_eq!(live, 1);
}

#[tokio::test]
async fn test_atomic_replace_keeps_one_session_under_load() {
    let store = Arc::new(MemoryCredentialStore::new());
    let user = store
        .insert_principal(Principal::new("Busy", "busy@example.com", "hash"))
        .await;
    let sessions = SessionManager::new(
        store.clone(),
        Arc::new(ManualClock::new(common::epoch())),
        &AuthConfig::default(),
    );

    let user_id = user.id;
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let sessions = sessions.clone();
            tokio::spawn(async move { sessions.create(user_id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.session_count_for_user(user_id).await, 1);
}
