/// Session model
///
/// A session row is keyed by the SHA-256 of the cookie token, never the token
/// itself. At most one live row exists per user.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE sessions (
///     id TEXT PRIMARY KEY,
///     user_id UUID NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
///     expires_at TIMESTAMPTZ NOT NULL
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Browser session record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    /// Hex SHA-256 of the session token
    pub id: String,

    /// Owning user
    pub user_id: Uuid,

    /// Absolute instant after which the session is void
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// True once `now` has reached `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True when `now` falls inside the trailing renewal window
    ///
    /// An expired session is also "due", callers check [`Session::is_expired`] first.
    pub fn is_due_for_renewal(&self, now: DateTime<Utc>, refresh_window: Duration) -> bool {
        now >= self.expires_at - refresh_window
    }
}
