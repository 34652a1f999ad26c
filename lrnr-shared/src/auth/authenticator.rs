/// Wiring of the authentication subsystem
///
/// [`Authenticator`] owns the session and API key managers, the resolver built
/// from them and the [`AuthConfig`]. The HTTP layer holds one behind an `Arc`
/// and hands it to the [`authenticate`](crate::auth::middleware::authenticate)
/// middleware.

use std::sync::Arc;

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::auth::api_key::ApiKeyManager;
use crate::auth::config::AuthConfig;
use crate::auth::cookie::{clear_session_cookie_header, session_cookie_header};
use crate::auth::error::AuthResult;
use crate::auth::resolver::{AuthenticationOutcome, AuthenticationResolver, RequestCredentials, Resolution};
use crate::auth::session::SessionManager;
use crate::clock::Clock;
use crate::models::Session;
use crate::store::CredentialStore;

/// Session created by [`Authenticator::sign_in`]
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session: Session,
    /// `Set-Cookie` value carrying the new token
    pub set_cookie: String,
}

pub struct Authenticator {
    sessions: SessionManager,
    api_keys: ApiKeyManager,
    resolver: AuthenticationResolver,
    config: AuthConfig,
}

impl Authenticator {
    /// Builds the managers and the standard resolver over one store and clock
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, config: AuthConfig) -> Self {
        let sessions = SessionManager::new(Arc::clone(&store), Arc::clone(&clock), &config);
        let api_keys = ApiKeyManager::new(store, clock);
        let resolver = AuthenticationResolver::standard(sessions.clone(), api_keys.clone(), config.clone());

        Self {
            sessions,
            api_keys,
            resolver,
            config,
        }
    }

    /// Replaces the standard resolver, e.g. to add a credential scheme
    pub fn with_resolver(mut self, resolver: AuthenticationResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn api_keys(&self) -> &ApiKeyManager {
        &self.api_keys
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Resolves the identity carried by a request's headers
    pub async fn resolve(&self, headers: &HeaderMap, path: &str) -> AuthResult<Resolution> {
        let credentials = RequestCredentials::from_headers(headers, path, &self.config.cookie_name);
        self.resolver.resolve(&credentials).await
    }

    /// Starts a session for a user whose password has already been checked
    pub async fn sign_in(&self, user_id: Uuid) -> AuthResult<SignedIn> {
        let (token, session) = self.sessions.create(user_id).await?;
        let set_cookie = session_cookie_header(
            &self.config.cookie_name,
            &token,
            session.expires_at,
            self.config.production,
        );

        Ok(SignedIn { session, set_cookie })
    }

    /// Ends the session behind `outcome`, if any
    ///
    /// Returns the `Set-Cookie` value that clears the cookie. API key and
    /// anonymous requests have no session to end but still get the clearing
    /// header.
    pub async fn sign_out(&self, outcome: &AuthenticationOutcome) -> AuthResult<String> {
        if let AuthenticationOutcome::Session { session, .. } = outcome {
            self.sessions.invalidate(&session.id).await?;
        }

        Ok(clear_session_cookie_header(&self.config.cookie_name, self.config.production))
    }
}
