/// PostgreSQL credential store
///
/// Implements [`CredentialStore`] on top of a sqlx [`PgPool`]. The schema lives in
/// `lrnr-shared/migrations/` and is applied by [`crate::db::migrations::run_migrations`].
///
/// # Atomicity
///
/// - Lazy expiry and renewal are single conditional statements
/// - `replace_session_for_user` runs delete + upsert in one transaction, and the
///   `UNIQUE (user_id)` constraint on `sessions` backs the one-session-per-user rule
///
/// # Example
///
/// ```no_run
/// use lrnr_shared::db::pool::{create_pool, DatabaseConfig};
/// use lrnr_shared::store::{CredentialStore, PgCredentialStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let store = PgCredentialStore::new(pool);
/// store.ping().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CredentialStore, StoreResult};
use crate::models::{ApiKey, NewApiKey, Principal, Session};

const API_KEY_COLUMNS: &str = "id, name, key_hash, key_prefix, user_id, last_used_at, \
                               expires_at, is_active, created_at, updated_at";

/// Postgres-backed [`CredentialStore`]
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

/// Session joined with its user
#[derive(sqlx::FromRow)]
struct SessionPrincipalRow {
    session_id: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<SessionPrincipalRow> for (Session, Principal) {
    fn from(row: SessionPrincipalRow) -> Self {
        (
            Session {
                id: row.session_id,
                user_id: row.user_id,
                expires_at: row.expires_at,
            },
            Principal {
                id: row.user_id,
                name: row.name,
                email: row.email,
                password_hash: row.password_hash,
                created_at: row.created_at,
            },
        )
    }
}

/// API key joined with its owner
#[derive(sqlx::FromRow)]
struct ApiKeyPrincipalRow {
    #[sqlx(flatten)]
    api_key: ApiKey,
    owner_name: String,
    owner_email: String,
    owner_password_hash: String,
    owner_created_at: DateTime<Utc>,
}

impl From<ApiKeyPrincipalRow> for (ApiKey, Principal) {
    fn from(row: ApiKeyPrincipalRow) -> Self {
        let principal = Principal {
            id: row.api_key.user_id,
            name: row.owner_name,
            email: row.owner_email,
            password_hash: row.owner_password_hash,
            created_at: row.owner_created_at,
        };
        (row.api_key, principal)
    }
}

impl PgCredentialStore {
    /// Wraps an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_session_with_principal(
        &self,
        session_id: &str,
    ) -> StoreResult<Option<(Session, Principal)>> {
        let row = sqlx::query_as::<_, SessionPrincipalRow>(
            r#"
            SELECT s.id AS session_id, s.user_id, s.expires_at,
                   u.name, u.email, u.password_hash, u.created_at
            FROM sessions s
            INNER JOIN users u ON u.id = s.user_id
            WHERE s.id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_session(&self, session_id: &str) -> StoreResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, expires_at FROM sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_session_if_expired(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1 AND expires_at <= $2")
            .bind(session_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_sessions_for_user(&self, user_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn update_session_expiry(
        &self,
        session_id: &str,
        new_expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET expires_at = $2
            WHERE id = $1 AND expires_at > $3
            "#,
        )
        .bind(session_id)
        .bind(new_expiry)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn replace_session_for_user(&self, session: &Session) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(session.user_id)
            .execute(&mut *tx)
            .await?;

        // A parallel sign-in that slipped in after our DELETE is overwritten, not duplicated
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET id = EXCLUDED.id, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_active_api_key(
        &self,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<(ApiKey, Principal)>> {
        let row = sqlx::query_as::<_, ApiKeyPrincipalRow>(
            r#"
            SELECT k.id, k.name, k.key_hash, k.key_prefix, k.user_id, k.last_used_at,
                   k.expires_at, k.is_active, k.created_at, k.updated_at,
                   u.name AS owner_name, u.email AS owner_email,
                   u.password_hash AS owner_password_hash, u.created_at AS owner_created_at
            FROM api_keys k
            INNER JOIN users u ON u.id = k.user_id
            WHERE k.key_hash = $1
              AND k.is_active = TRUE
              AND (k.expires_at IS NULL OR k.expires_at > $2)
            "#,
        )
        .bind(key_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn insert_api_key(&self, new_key: NewApiKey) -> StoreResult<ApiKey> {
        let api_key = sqlx::query_as::<_, ApiKey>(&format!(
            r#"
            INSERT INTO api_keys (name, key_hash, key_prefix, user_id, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {API_KEY_COLUMNS}
            "#
        ))
        .bind(new_key.name)
        .bind(new_key.key_hash)
        .bind(new_key.key_prefix)
        .bind(new_key.user_id)
        .bind(new_key.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(api_key)
    }

    async fn update_api_key_last_used(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_api_key_active(&self, id: Uuid, user_id: Uuid, active: bool) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys
            SET is_active = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_api_keys_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ApiKey>> {
        let keys = sqlx::query_as::<_, ApiKey>(&format!(
            r#"
            SELECT {API_KEY_COLUMNS}
            FROM api_keys
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    async fn find_api_key_for_user(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<ApiKey>> {
        let api_key = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(api_key)
    }

    async fn find_principal_by_id(&self, user_id: Uuid) -> StoreResult<Option<Principal>> {
        let principal = sqlx::query_as::<_, Principal>(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(principal)
    }

    async fn ping(&self) -> StoreResult<()> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }
}
