/// Browser session lifecycle
///
/// A session is keyed by the SHA-256 digest of its token; the raw token only
/// ever lives in the client's cookie. Each user has at most one session.
///
/// # Lifetime
///
/// - `create` grants `max_duration` (30 days by default)
/// - `validate` deletes the row once `now >= expires_at` (lazy expiry)
/// - `validate` extends the expiry to `now + max_duration` once the session is
///   inside its trailing `refresh_window` (15 days by default)
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use lrnr_shared::auth::{AuthConfig, SessionManager};
/// use lrnr_shared::clock::SystemClock;
/// use lrnr_shared::models::Principal;
/// use lrnr_shared::store::MemoryCredentialStore;
///
/// # async fn example() -> Result<(), lrnr_shared::auth::AuthError> {
/// let store = Arc::new(MemoryCredentialStore::new());
/// let user = store.insert_principal(Principal::new("Ada", "ada@example.com", "hash")).await;
///
/// let sessions = SessionManager::new(store, Arc::new(SystemClock), &AuthConfig::default());
/// let (token, _session) = sessions.create(user.id).await?;
///
/// let validated = sessions.validate(&token).await?.expect("fresh session is valid");
/// assert_eq!(validated.principal.id, user.id);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::auth::config::AuthConfig;
use crate::auth::error::{store_failure, AuthError, AuthResult};
use crate::auth::token::{fingerprint, generate_token, hash_token, is_well_formed_token};
use crate::clock::Clock;
use crate::models::{Principal, Session};
use crate::store::CredentialStore;

/// A session that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub session: Session,
    pub principal: Principal,
    /// True if this validation pushed `expires_at` forward
    pub renewed: bool,
}

/// Creates, validates, renews and invalidates sessions
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    max_duration: Duration,
    refresh_window: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, config: &AuthConfig) -> Self {
        Self {
            store,
            clock,
            max_duration: config.session_max_duration,
            refresh_window: config.session_refresh_window,
        }
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    pub fn refresh_window(&self) -> Duration {
        self.refresh_window
    }

    /// Starts a new session for `user_id`, replacing any existing one
    ///
    /// Returns the raw token for the cookie and the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`](crate::auth::AuthError) if the store fails.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, user_id: Uuid) -> AuthResult<(String, Session)> {
        let token = generate_token();
        let session = Session {
            id: hash_token(&token),
            user_id,
            expires_at: self.clock.now() + self.max_duration,
        };

        self.store
            .replace_session_for_user(&session)
            .await
            .map_err(|e| store_failure("replace_session_for_user", e))?;

        tracing::info!(
            user_id = %user_id,
            session_id = fingerprint(&session.id),
            expires_at = %session.expires_at,
            "Session created"
        );

        Ok((token, session))
    }

    /// Validates a raw session token
    ///
    /// Returns `Ok(None)` for unknown, malformed or expired tokens. Expired rows
    /// are deleted on the way out. A session inside its refresh window is
    /// extended before it is returned.
    ///
    /// # Errors
    ///
    /// Only store failures are returned as errors.
    #[tracing::instrument(skip(self, token))]
    pub async fn validate(&self, token: &str) -> AuthResult<Option<ValidatedSession>> {
        if !is_well_formed_token(token) {
            let rejection = AuthError::MalformedCredential(format!(
                "session token of {} chars is not a base-32 token",
                token.len()
            ));
            tracing::debug!(kind = rejection.code(), error = %rejection, "Rejected session cookie");
            return Ok(None);
        }

        let session_id = hash_token(token);
        let now = self.clock.now();

        let Some((mut session, principal)) = self
            .store
            .find_session_with_principal(&session_id)
            .await
            .map_err(|e| store_failure("find_session_with_principal", e))?
        else {
            tracing::debug!(session_id = fingerprint(&session_id), "Unknown session");
            return Ok(None);
        };

        if session.is_expired(now) {
            self.store
                .delete_session_if_expired(&session_id, now)
                .await
                .map_err(|e| store_failure("delete_session_if_expired", e))?;

            let rejection = AuthError::ExpiredCredential;
            tracing::debug!(
                session_id = fingerprint(&session_id),
                user_id = %session.user_id,
                expired_at = %session.expires_at,
                kind = rejection.code(),
                "Expired session removed"
            );
            return Ok(None);
        }

        let mut renewed = false;
        if session.is_due_for_renewal(now, self.refresh_window) {
            let new_expiry = now + self.max_duration;
            let updated = self
                .store
                .update_session_expiry(&session_id, new_expiry, now)
                .await
                .map_err(|e| store_failure("update_session_expiry", e))?;

            // Row vanished between the read and the update (sign-out or replacement)
            if !updated {
                tracing::debug!(session_id = fingerprint(&session_id), "Session gone before renewal");
                return Ok(None);
            }

            tracing::debug!(
                session_id = fingerprint(&session_id),
                user_id = %session.user_id,
                expires_at = %new_expiry,
                "Session renewed"
            );
            session.expires_at = new_expiry;
            renewed = true;
        }

        Ok(Some(ValidatedSession {
            session,
            principal,
            renewed,
        }))
    }

    /// Deletes a session by ID; absent sessions are fine
    #[tracing::instrument(skip(self, session_id))]
    pub async fn invalidate(&self, session_id: &str) -> AuthResult<()> {
        self.store
            .delete_session(session_id)
            .await
            .map_err(|e| store_failure("delete_session", e))?;

        tracing::info!(session_id = fingerprint(session_id), "Session invalidated");
        Ok(())
    }

    /// Deletes every session of a user (password change, security revocation)
    #[tracing::instrument(skip(self))]
    pub async fn invalidate_all_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let removed = self
            .store
            .delete_sessions_for_user(user_id)
            .await
            .map_err(|e| store_failure("delete_sessions_for_user", e))?;

        tracing::info!(user_id = %user_id, removed, "All sessions invalidated for user");
        Ok(removed)
    }

    /// Deletes all sessions already expired
    ///
    /// Validation expires sessions lazily, so this is only hygiene. Nothing in
    /// this crate schedules it.
    pub async fn sweep_expired(&self) -> AuthResult<u64> {
        let removed = self
            .store
            .delete_expired_sessions(self.clock.now())
            .await
            .map_err(|e| store_failure("delete_expired_sessions", e))?;

        if removed > 0 {
            tracing::info!(removed, "Swept expired sessions");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryCredentialStore;
    use chrono::{TimeZone, Utc};

    async fn setup() -> (SessionManager, Arc<MemoryCredentialStore>, Arc<ManualClock>, Principal) {
        let store = Arc::new(MemoryCredentialStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()));
        let user = store
            .insert_principal(Principal::new("Test User", "test@example.com", "hash"))
            .await;
        let manager = SessionManager::new(store.clone(), clock.clone(), &AuthConfig::default());
        (manager, store, clock, user)
    }

    #[tokio::test]
    async fn test_create_stores_hash_not_token() {
        let (manager, store, clock, user) = setup().await;

        let (token, session) = manager.create(user.id).await.unwrap();

        assert_ne!(token, session.id);
        assert_eq!(session.id, hash_token(&token));
        assert_eq!(session.expires_at, clock.now() + Duration::days(30));
        assert!(store.find_session(&session.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_validate_fresh_session_is_not_renewed() {
        let (manager, _store, _clock, user) = setup().await;
        let (token, session) = manager.create(user.id).await.unwrap();

        let validated = manager.validate(&token).await.unwrap().unwrap();

        assert!(!validated.renewed);
        assert_eq!(validated.session.expires_at, session.expires_at);
        assert_eq!(validated.principal.id, user.id);
    }

    #[tokio::test]
    async fn test_malformed_token_skips_store() {
        let (manager, store, _clock, _user) = setup().await;
        let before = store.query_count();

        assert!(manager.validate("not-a-token").await.unwrap().is_none());
        assert!(manager.validate("").await.unwrap().is_none());
        assert_eq!(store.query_count(), before);
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let (manager, _store, _clock, user) = setup().await;
        let (token, session) = manager.create(user.id).await.unwrap();

        manager.invalidate(&session.id).await.unwrap();
        manager.invalidate(&session.id).await.unwrap();

        assert!(manager.validate(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let (manager, store, clock, user) = setup().await;
        let (_token, session) = manager.create(user.id).await.unwrap();

        assert_eq!(manager.sweep_expired().await.unwrap(), 0);

        clock.set(session.expires_at);
        assert_eq!(manager.sweep_expired().await.unwrap(), 1);
        assert!(store.find_session(&session.id).await.unwrap().is_none());
    }
}
