/// API Key model
///
/// API keys give programmatic access without a browser session.
///
/// # Security
///
/// - Keys are stored as SHA-256 hashes (never plaintext)
/// - `key_prefix` holds the first 8 chars for display only; it cannot authenticate
/// - The full key is only returned on creation (never again)
/// - Revocation flips `is_active` and keeps the row for audit
///
/// # Schema
///
/// ```sql
/// CREATE TABLE api_keys (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL,
///     key_hash TEXT NOT NULL UNIQUE,
///     key_prefix TEXT NOT NULL,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     last_used_at TIMESTAMPTZ,
///     expires_at TIMESTAMPTZ,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// API Key model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique API key ID
    pub id: Uuid,

    /// Human-readable label chosen by the owner
    pub name: String,

    /// SHA-256 hash of the full key, never sent to clients
    #[serde(skip_serializing, default)]
    pub key_hash: String,

    /// First 8 characters of the key (for display: "lrnr_abc")
    pub key_prefix: String,

    /// Owning user
    pub user_id: Uuid,

    /// When the key last authenticated a request
    pub last_used_at: Option<DateTime<Utc>>,

    /// Optional expiration date (None = never expires)
    pub expires_at: Option<DateTime<Utc>>,

    /// False once revoked; never flips back
    pub is_active: bool,

    /// When the key was created
    pub created_at: DateTime<Utc>,

    /// When the row was last modified
    pub updated_at: DateTime<Utc>,
}

impl ApiKey {
    /// Returns true if expires_at is set and `now` has passed it
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Active and not expired
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }
}

/// Caller input for creating an API key
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateApiKey {
    /// Label, 1-100 characters
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    /// Optional expiration date (ISO 8601)
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Row to insert; the store assigns `id` and the audit timestamps
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub user_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}
