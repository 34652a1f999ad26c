/// Credential persistence
///
/// The managers in [`crate::auth`] only talk to storage through the
/// [`CredentialStore`] trait. Two implementations ship with the crate:
///
/// - [`postgres::PgCredentialStore`]: sqlx/Postgres, used by the server
/// - [`memory::MemoryCredentialStore`]: in-process, used by tests and demos
///
/// # Consistency
///
/// Every read-then-write in the authentication flow is expressed as one
/// conditional statement (`delete_session_if_expired`, `update_session_expiry`)
/// so concurrent requests cannot resurrect or double-delete a row.
/// [`CredentialStore::replace_session_for_user`] is the one compound operation;
/// its default body is the plain delete-then-insert sequence, and stores that
/// can do better (a transaction plus a unique `user_id`) override it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ApiKey, NewApiKey, Principal, Session};

pub mod memory;
pub mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure talking to the credential store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached (pool exhausted, connection refused, I/O)
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    /// A unique constraint rejected the write
    #[error("Credential store conflict: {0}")]
    Conflict(String),

    /// Any other store-side failure
    #[error("Credential store error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Internal(err.to_string()),
        }
    }
}

/// Persistence interface for sessions, API keys and principals
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // Sessions

    /// Looks up a session joined with its owning principal
    async fn find_session_with_principal(
        &self,
        session_id: &str,
    ) -> StoreResult<Option<(Session, Principal)>>;

    /// Looks up a bare session row
    async fn find_session(&self, session_id: &str) -> StoreResult<Option<Session>>;

    /// Inserts a session row
    async fn insert_session(&self, session: &Session) -> StoreResult<()>;

    /// Deletes a session row; absent rows are not an error
    async fn delete_session(&self, session_id: &str) -> StoreResult<()>;

    /// Deletes the row only if it is expired at `now`; returns whether a row went away
    async fn delete_session_if_expired(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Deletes every session of a user; returns the number of rows removed
    async fn delete_sessions_for_user(&self, user_id: Uuid) -> StoreResult<u64>;

    /// Sets a new expiry, only if the row is still unexpired at `now`
    ///
    /// Returns false when the row is gone or already expired.
    async fn update_session_expiry(
        &self,
        session_id: &str,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Removes all sessions expired at `now`
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Makes `session` the only session of its user
    ///
    /// The default implementation is two round trips and races with a
    /// concurrent call for the same user.
    async fn replace_session_for_user(&self, session: &Session) -> StoreResult<()> {
        self.delete_sessions_for_user(session.user_id).await?;
        self.insert_session(session).await
    }

    // API keys

    /// Finds an active, unexpired key by hash, joined with its owner
    async fn find_active_api_key(
        &self,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<(ApiKey, Principal)>>;

    /// Inserts a key with `is_active = true` and returns the stored row
    async fn insert_api_key(&self, new_key: NewApiKey) -> StoreResult<ApiKey>;

    /// Records a successful use of a key
    async fn update_api_key_last_used(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()>;

    /// Sets `is_active` on a key owned by `user_id`; returns affected rows
    async fn set_api_key_active(&self, id: Uuid, user_id: Uuid, active: bool) -> StoreResult<u64>;

    /// Lists every key of a user, newest first
    async fn list_api_keys_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ApiKey>>;

    /// Fetches a key only if it belongs to `user_id`
    async fn find_api_key_for_user(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<ApiKey>>;

    // Principals

    /// Finds a principal by ID
    async fn find_principal_by_id(&self, user_id: Uuid) -> StoreResult<Option<Principal>>;

    /// Connectivity probe
    async fn ping(&self) -> StoreResult<()>;
}
