/// In-memory credential store
///
/// Mirrors the filtering rules of the Postgres store so the managers behave the
/// same against either. Useful for tests and local demos.
///
/// # Test Hooks
///
/// - [`MemoryCredentialStore::set_unavailable`]: every call fails with
///   [`StoreError::Unavailable`], like a database outage
/// - [`MemoryCredentialStore::query_count`]: number of trait calls served, to
///   assert that a code path never touched the store
/// - [`MemoryCredentialStore::with_unique_user_sessions`]: `insert_session`
///   behaves like an upsert on `user_id`, the hardened schema constraint
/// - [`MemoryCredentialStore::set_last_used_failing`]: only
///   `update_api_key_last_used` fails, lookups keep working
/// - [`MemoryCredentialStore::with_clock`]: audit timestamps
///   (`created_at`, `updated_at`) follow the given clock
///
/// # Example
///
/// ```
/// use lrnr_shared::models::Principal;
/// use lrnr_shared::store::{CredentialStore, MemoryCredentialStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryCredentialStore::new();
/// let principal = store.insert_principal(Principal::new("Ada", "ada@example.com", "x")).await;
/// assert!(store.find_principal_by_id(principal.id).await?.is_some());
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CredentialStore, StoreError, StoreResult};
use crate::clock::{Clock, SystemClock};
use crate::models::{ApiKey, NewApiKey, Principal, Session};

#[derive(Debug, Default)]
struct Tables {
    principals: HashMap<Uuid, Principal>,
    sessions: HashMap<String, Session>,
    api_keys: HashMap<Uuid, ApiKey>,
}

/// In-process [`CredentialStore`]
pub struct MemoryCredentialStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
    unique_user_sessions: bool,
    unavailable: AtomicBool,
    last_used_failing: AtomicBool,
    queries: AtomicUsize,
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self {
            tables: RwLock::default(),
            clock: Arc::new(SystemClock),
            unique_user_sessions: false,
            unavailable: AtomicBool::new(false),
            last_used_failing: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
        }
    }
}

impl MemoryCredentialStore {
    /// Empty store without a `user_id` constraint on sessions
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps audit columns from `clock` instead of wall-clock time
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Empty store where a session insert replaces the user's existing row
    pub fn with_unique_user_sessions() -> Self {
        Self {
            unique_user_sessions: true,
            ..Self::default()
        }
    }

    /// Seeds a principal; not counted as a query
    pub async fn insert_principal(&self, principal: Principal) -> Principal {
        let mut tables = self.tables.write().await;
        tables.principals.insert(principal.id, principal.clone());
        principal
    }

    /// Toggles simulated outage
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes `update_api_key_last_used` fail while every other call succeeds
    pub fn set_last_used_failing(&self, failing: bool) {
        self.last_used_failing.store(failing, Ordering::SeqCst);
    }

    /// Number of trait calls served so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of session rows (live or expired) held for a user; not counted as a query
    pub async fn session_count_for_user(&self, user_id: Uuid) -> usize {
        let tables = self.tables.read().await;
        tables.sessions.values().filter(|s| s.user_id == user_id).count()
    }

    fn begin(&self) -> StoreResult<()> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_session_with_principal(
        &self,
        session_id: &str,
    ) -> StoreResult<Option<(Session, Principal)>> {
        self.begin()?;
        let tables = self.tables.read().await;

        Ok(tables.sessions.get(session_id).and_then(|session| {
            tables
                .principals
                .get(&session.user_id)
                .map(|principal| (session.clone(), principal.clone()))
        }))
    }

    async fn find_session(&self, session_id: &str) -> StoreResult<Option<Session>> {
        self.begin()?;
        Ok(self.tables.read().await.sessions.get(session_id).cloned())
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        self.begin()?;
        let mut tables = self.tables.write().await;

        if tables.sessions.contains_key(&session.id) {
            return Err(StoreError::Conflict(format!(
                "duplicate session id {}",
                session.id
            )));
        }
        if self.unique_user_sessions {
            tables.sessions.retain(|_, s| s.user_id != session.user_id);
        }
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        self.begin()?;
        self.tables.write().await.sessions.remove(session_id);
        Ok(())
    }

    async fn delete_session_if_expired(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.begin()?;
        let mut tables = self.tables.write().await;

        match tables.sessions.get(session_id) {
            Some(session) if session.is_expired(now) => {
                tables.sessions.remove(session_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        self.begin()?;
        let mut tables = self.tables.write().await;

        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn update_session_expiry(
        &self,
        session_id: &str,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.begin()?;
        let mut tables = self.tables.write().await;

        match tables.sessions.get_mut(session_id) {
            Some(session) if !session.is_expired(now) => {
                session.expires_at = new_expiry;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.begin()?;
        let mut tables = self.tables.write().await;

        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn replace_session_for_user(&self, session: &Session) -> StoreResult<()> {
        self.begin()?;
        let mut tables = self.tables.write().await;

        if tables.sessions.contains_key(&session.id) {
            return Err(StoreError::Conflict(format!(
                "duplicate session id {}",
                session.id
            )));
        }
        tables.sessions.retain(|_, s| s.user_id != session.user_id);
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_active_api_key(
        &self,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<(ApiKey, Principal)>> {
        self.begin()?;
        let tables = self.tables.read().await;

        Ok(tables
            .api_keys
            .values()
            .find(|k| k.key_hash == key_hash && k.is_usable(now))
            .and_then(|k| {
                tables
                    .principals
                    .get(&k.user_id)
                    .map(|principal| (k.clone(), principal.clone()))
            }))
    }

    async fn insert_api_key(&self, new_key: NewApiKey) -> StoreResult<ApiKey> {
        self.begin()?;
        let mut tables = self.tables.write().await;

        if tables.api_keys.values().any(|k| k.key_hash == new_key.key_hash) {
            return Err(StoreError::Conflict("duplicate key_hash".to_string()));
        }

        let now = self.clock.now();
        let api_key = ApiKey {
            id: Uuid::new_v4(),
            name: new_key.name,
            key_hash: new_key.key_hash,
            key_prefix: new_key.key_prefix,
            user_id: new_key.user_id,
            last_used_at: None,
            expires_at: new_key.expires_at,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.api_keys.insert(api_key.id, api_key.clone());
        Ok(api_key)
    }

    async fn update_api_key_last_used(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        self.begin()?;
        if self.last_used_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "last_used_at write rejected".to_string(),
            ));
        }
        if let Some(api_key) = self.tables.write().await.api_keys.get_mut(&id) {
            api_key.last_used_at = Some(now);
        }
        Ok(())
    }

    async fn set_api_key_active(&self, id: Uuid, user_id: Uuid, active: bool) -> StoreResult<u64> {
        self.begin()?;
        let mut tables = self.tables.write().await;

        match tables.api_keys.get_mut(&id) {
            Some(api_key) if api_key.user_id == user_id => {
                api_key.is_active = active;
                api_key.updated_at = self.clock.now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn list_api_keys_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ApiKey>> {
        self.begin()?;
        let tables = self.tables.read().await;

        let mut keys: Vec<ApiKey> = tables
            .api_keys
            .values()
            .filter(|k| k.user_id == user_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn find_api_key_for_user(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<ApiKey>> {
        self.begin()?;
        Ok(self
            .tables
            .read()
            .await
            .api_keys
            .get(&id)
            .filter(|k| k.user_id == user_id)
            .cloned())
    }

    async fn find_principal_by_id(&self, user_id: Uuid) -> StoreResult<Option<Principal>> {
        self.begin()?;
        Ok(self.tables.read().await.principals.get(&user_id).cloned())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.begin()
    }
}
