/// API key issuance, validation and revocation
///
/// # Key Format
///
/// API keys follow the pattern `lrnr_<32 base-32 chars>` (37 chars total):
/// - Prefix: `lrnr_` (5 chars)
/// - Random part: a 20-byte token from [`generate_token`]
///
/// Only the SHA-256 hash of the full key is stored. The first 8 characters are
/// kept in cleartext so owners can tell their keys apart; they carry no
/// authentication weight.
///
/// # Example
///
/// ```
/// use lrnr_shared::auth::api_key::{generate_api_key, validate_api_key_format, API_KEY_LENGTH};
/// use lrnr_shared::auth::token::hash_token;
///
/// let generated = generate_api_key();
/// assert!(generated.key.starts_with("lrnr_"));
/// assert_eq!(generated.key.len(), API_KEY_LENGTH);
/// assert_eq!(generated.hash, hash_token(&generated.key));
/// assert_eq!(generated.prefix, &generated.key[..8]);
/// assert!(validate_api_key_format(&generated.key));
/// ```

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::auth::error::{store_failure, AuthError, AuthResult};
use crate::auth::token::{fingerprint, generate_token, hash_token, is_base32_lower, TOKEN_BYTES, TOKEN_LENGTH};
use crate::clock::Clock;
use crate::models::{ApiKey, CreateApiKey, NewApiKey, Principal};
use crate::store::CredentialStore;

/// Literal every key starts with
pub const API_KEY_PREFIX: &str = "lrnr_";

/// Random bytes behind the suffix
pub const API_KEY_RANDOM_BYTES: usize = TOKEN_BYTES;

/// Total length of an API key (prefix + random)
pub const API_KEY_LENGTH: usize = API_KEY_PREFIX.len() + TOKEN_LENGTH;

/// Characters of the key stored in cleartext for display
pub const API_KEY_DISPLAY_PREFIX_LENGTH: usize = 8;

/// A freshly generated key, before it is persisted
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    /// Raw key; shown to the owner exactly once
    pub key: String,
    /// SHA-256 hash used as the lookup key
    pub hash: String,
    /// First 8 characters, for display
    pub prefix: String,
}

/// Generates a new API key with its hash and display prefix
pub fn generate_api_key() -> GeneratedApiKey {
    let key = format!("{}{}", API_KEY_PREFIX, generate_token());
    let hash = hash_token(&key);
    let prefix = key[..API_KEY_DISPLAY_PREFIX_LENGTH].to_string();

    GeneratedApiKey { key, hash, prefix }
}

/// Validates API key format
///
/// # Example
///
/// ```
/// use lrnr_shared::auth::api_key::validate_api_key_format;
///
/// assert!(validate_api_key_format("lrnr_abcdefghijklmnopqrstuvwxyz234567"));
///
/// // Wrong prefix
/// assert!(!validate_api_key_format("lrnx_abcdefghijklmnopqrstuvwxyz234567"));
///
/// // Too short
/// assert!(!validate_api_key_format("lrnr_short"));
///
/// // Outside the base-32 alphabet
/// assert!(!validate_api_key_format("lrnr_ABCDEFGHIJKLMNOPQRSTUVWXYZ234567"));
/// ```
pub fn validate_api_key_format(key: &str) -> bool {
    check_api_key_format(key).is_ok()
}

/// Like [`validate_api_key_format`], but says what is wrong
///
/// # Errors
///
/// [`AuthError::MalformedCredential`] naming the first violated rule.
pub fn check_api_key_format(key: &str) -> AuthResult<()> {
    match format_violation(key) {
        Some(reason) => Err(AuthError::MalformedCredential(reason.to_string())),
        None => Ok(()),
    }
}

fn format_violation(key: &str) -> Option<&'static str> {
    let Some(suffix) = key.strip_prefix(API_KEY_PREFIX) else {
        return Some("missing key prefix");
    };
    if key.len() != API_KEY_LENGTH {
        return Some("wrong key length");
    }
    if !is_base32_lower(suffix) {
        return Some("invalid key characters");
    }
    None
}

/// Issues, validates, lists and revokes API keys
#[derive(Clone)]
pub struct ApiKeyManager {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl ApiKeyManager {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates a key for `user_id`
    ///
    /// Returns the stored record and the raw key. The raw key cannot be
    /// retrieved again after this call.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidInput`] if the name is not 1-100 chars or `expires_at` is not in the future
    /// - [`AuthError::StoreUnavailable`] if the store fails
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, user_id: Uuid, input: CreateApiKey) -> AuthResult<(ApiKey, String)> {
        input
            .validate()
            .map_err(|e| AuthError::InvalidInput(e.to_string()))?;

        let now = self.clock.now();
        if input.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(AuthError::InvalidInput(
                "expires_at must be in the future".to_string(),
            ));
        }

        let generated = generate_api_key();
        let api_key = self
            .store
            .insert_api_key(NewApiKey {
                name: input.name,
                key_hash: generated.hash,
                key_prefix: generated.prefix,
                user_id,
                expires_at: input.expires_at,
            })
            .await
            .map_err(|e| store_failure("insert_api_key", e))?;

        tracing::info!(
            api_key_id = %api_key.id,
            user_id = %user_id,
            key_prefix = %api_key.key_prefix,
            "API key created"
        );

        Ok((api_key, generated.key))
    }

    /// Resolves a raw key to its record and owner
    ///
    /// Keys without the `lrnr_` prefix, of the wrong length or with characters
    /// outside the base-32 alphabet are rejected before the store is touched.
    /// Revoked and expired keys resolve to `None`.
    ///
    /// On success `last_used_at` is written by a detached task. A failed write is
    /// logged and does not affect the result.
    #[tracing::instrument(skip(self, raw_key))]
    pub async fn validate(&self, raw_key: &str) -> AuthResult<Option<(ApiKey, Principal)>> {
        if let Err(rejection) = check_api_key_format(raw_key) {
            tracing::debug!(kind = rejection.code(), error = %rejection, "Rejected API key");
            return Ok(None);
        }

        let key_hash = hash_token(raw_key);
        let now = self.clock.now();

        let Some((mut api_key, principal)) = self
            .store
            .find_active_api_key(&key_hash, now)
            .await
            .map_err(|e| store_failure("find_active_api_key", e))?
        else {
            tracing::debug!(key_hash = fingerprint(&key_hash), "No active API key for hash");
            return Ok(None);
        };

        let store = Arc::clone(&self.store);
        let api_key_id = api_key.id;
        tokio::spawn(async move {
            if let Err(e) = store.update_api_key_last_used(api_key_id, now).await {
                tracing::warn!(
                    api_key_id = %api_key_id,
                    error = %e,
                    "Failed to record API key usage"
                );
            }
        });

        api_key.last_used_at = Some(now);
        tracing::debug!(
            api_key_id = %api_key.id,
            user_id = %principal.id,
            "API key validated"
        );

        Ok(Some((api_key, principal)))
    }

    /// Revokes a key owned by `user_id`
    ///
    /// Returns false when no row matched, which covers both unknown keys and
    /// keys owned by someone else.
    #[tracing::instrument(skip(self))]
    pub async fn revoke(&self, api_key_id: Uuid, user_id: Uuid) -> AuthResult<bool> {
        let affected = self
            .store
            .set_api_key_active(api_key_id, user_id, false)
            .await
            .map_err(|e| store_failure("set_api_key_active", e))?;

        if affected == 0 {
            let rejection = AuthError::OwnershipViolation;
            tracing::debug!(
                api_key_id = %api_key_id,
                user_id = %user_id,
                kind = rejection.code(),
                "Revoke matched no key owned by user"
            );
            return Ok(false);
        }

        tracing::info!(api_key_id = %api_key_id, user_id = %user_id, "API key revoked");
        Ok(true)
    }

    /// Lists a user's keys, revoked ones included
    pub async fn list(&self, user_id: Uuid) -> AuthResult<Vec<ApiKey>> {
        self.store
            .list_api_keys_for_user(user_id)
            .await
            .map_err(|e| store_failure("list_api_keys_for_user", e))
    }

    /// Fetches one key; `None` if it does not exist or belongs to another user
    pub async fn get(&self, api_key_id: Uuid, user_id: Uuid) -> AuthResult<Option<ApiKey>> {
        self.store
            .find_api_key_for_user(api_key_id, user_id)
            .await
            .map_err(|e| store_failure("find_api_key_for_user", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryCredentialStore;
    use chrono::{Duration, TimeZone, Utc};

    async fn setup() -> (ApiKeyManager, Arc<MemoryCredentialStore>, Arc<ManualClock>, Principal) {
        let store = Arc::new(MemoryCredentialStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()));
        let user = store
            .insert_principal(Principal::new("Key Owner", "owner@example.com", "hash"))
            .await;
        (ApiKeyManager::new(store.clone(), clock.clone()), store, clock, user)
    }

    fn named(name: &str) -> CreateApiKey {
        CreateApiKey {
            name: name.to_string(),
            expires_at: None,
        }
    }

    #[test]
    fn test_generate_api_key() {
        let first = generate_api_key();
        let second = generate_api_key();

        assert!(first.key.starts_with(API_KEY_PREFIX));
        assert_eq!(first.key.len(), 37);
        assert_eq!(first.hash.len(), 64);
        assert_eq!(first.prefix.len(), API_KEY_DISPLAY_PREFIX_LENGTH);

        assert_ne!(first.key, second.key);
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn test_format_violations() {
        let valid = generate_api_key().key;
        assert_eq!(format_violation(&valid), None);

        assert_eq!(format_violation("lrnx_abc"), Some("missing key prefix"));
        assert_eq!(format_violation(""), Some("missing key prefix"));
        assert_eq!(format_violation("lrnr_abc"), Some("wrong key length"));
        assert_eq!(format_violation(&format!("{}a", valid)), Some("wrong key length"));
        assert_eq!(
            format_violation("lrnr_abcdefghijklmnopqrstuvwxyz234561"),
            Some("invalid key characters")
        );
    }

    #[test]
    fn test_check_api_key_format_names_the_violation() {
        assert!(check_api_key_format(&generate_api_key().key).is_ok());

        match check_api_key_format("lrnr_abc") {
            Err(AuthError::MalformedCredential(reason)) => assert_eq!(reason, "wrong key length"),
            other => panic!("expected MalformedCredential, got {:?}", other),
        }
        assert!(matches!(
            check_api_key_format("sk-live"),
            Err(AuthError::MalformedCredential(_))
        ));
    }

    #[tokio::test]
    async fn test_create_returns_raw_key_once() {
        let (manager, store, _clock, user) = setup().await;

        let (api_key, raw_key) = manager.create(user.id, named("CI")).await.unwrap();

        assert_eq!(api_key.user_id, user.id);
        assert!(api_key.is_active);
        assert_eq!(api_key.key_hash, hash_token(&raw_key));
        assert_eq!(api_key.key_prefix, &raw_key[..8]);

        // Listing never exposes the raw key
        let listed = store.list_api_keys_for_user(user.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_ne!(listed[0].key_hash, raw_key);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let (manager, _store, clock, user) = setup().await;

        let err = manager.create(user.id, named("")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));

        let err = manager.create(user.id, named(&"x".repeat(101))).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));

        let past = CreateApiKey {
            name: "old".to_string(),
            expires_at: Some(clock.now() - Duration::seconds(1)),
        };
        let err = manager.create(user.id, past).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_validate_round_trip() {
        let (manager, _store, clock, user) = setup().await;
        let (created, raw_key) = manager.create(user.id, named("CLI")).await.unwrap();

        let (api_key, principal) = manager.validate(&raw_key).await.unwrap().unwrap();

        assert_eq!(api_key.id, created.id);
        assert_eq!(principal.id, user.id);
        assert_eq!(api_key.last_used_at, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_get_is_owner_scoped() {
        let (manager, store, _clock, user) = setup().await;
        let other = store
            .insert_principal(Principal::new("Other", "other@example.com", "hash"))
            .await;
        let (created, _) = manager.create(user.id, named("mine")).await.unwrap();

        assert!(manager.get(created.id, user.id).await.unwrap().is_some());
        assert!(manager.get(created.id, other.id).await.unwrap().is_none());
        assert_eq!(manager.list(other.id).await.unwrap().len(), 0);
    }
}
