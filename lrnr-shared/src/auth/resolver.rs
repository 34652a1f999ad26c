/// Per-request credential resolution
///
/// The resolver runs an ordered list of [`CredentialStrategy`] values against
/// the credentials of a request. The first strategy that resolves an identity
/// wins. The standard order checks the session cookie before the bearer key,
/// so a request carrying both authenticates as the session principal.
///
/// Anonymous is a normal outcome. Only store failures make resolution fail.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

use crate::auth::api_key::ApiKeyManager;
use crate::auth::config::AuthConfig;
use crate::auth::cookie::{read_cookie, CookieDirective};
use crate::auth::error::AuthResult;
use crate::auth::session::SessionManager;
use crate::models::{ApiKey, Principal, Session};

/// Credentials pulled off an inbound request
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    /// Session cookie value, if present and non-empty
    pub session_token: Option<String>,

    /// Raw `Authorization` header value
    pub authorization: Option<String>,

    /// Request path, used to spot sign-in/sign-out routes
    pub path: String,
}

impl RequestCredentials {
    pub fn from_headers(headers: &HeaderMap, path: &str, cookie_name: &str) -> Self {
        Self {
            session_token: read_cookie(headers, cookie_name),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            path: path.to_string(),
        }
    }

    /// Token of an `Authorization: Bearer <token>` header
    pub fn bearer_token(&self) -> Option<&str> {
        self.authorization
            .as_deref()?
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

/// How a request was authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Session,
    ApiKey,
}

/// Identity attached to a request
///
/// Never carries a session and an API key at the same time.
#[derive(Debug, Clone)]
pub enum AuthenticationOutcome {
    Session { session: Session, principal: Principal },
    ApiKey { api_key: ApiKey, principal: Principal },
    Anonymous,
}

impl AuthenticationOutcome {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthenticationOutcome::Session { principal, .. }
            | AuthenticationOutcome::ApiKey { principal, .. } => Some(principal),
            AuthenticationOutcome::Anonymous => None,
        }
    }

    pub fn method(&self) -> Option<AuthMethod> {
        match self {
            AuthenticationOutcome::Session { .. } => Some(AuthMethod::Session),
            AuthenticationOutcome::ApiKey { .. } => Some(AuthMethod::ApiKey),
            AuthenticationOutcome::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthenticationOutcome::Anonymous)
    }
}

/// Result of resolving one request
#[derive(Debug, Clone)]
pub struct Resolution {
    pub outcome: AuthenticationOutcome,
    pub cookie: CookieDirective,
}

/// What a single strategy made of the request
#[derive(Debug, Clone)]
pub enum StrategyResult {
    /// The strategy established an identity
    Resolved {
        outcome: AuthenticationOutcome,
        cookie: CookieDirective,
    },
    /// No identity from this strategy; the cookie directive still applies
    Skipped { cookie: CookieDirective },
}

impl StrategyResult {
    pub fn skipped() -> Self {
        StrategyResult::Skipped {
            cookie: CookieDirective::Keep,
        }
    }
}

/// One credential scheme
#[async_trait]
pub trait CredentialStrategy: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Tries to authenticate the request
    ///
    /// Must return `Err` only for store failures.
    async fn resolve(&self, credentials: &RequestCredentials) -> AuthResult<StrategyResult>;
}

/// Authenticates with the session cookie
pub struct SessionCookieStrategy {
    sessions: SessionManager,
    config: AuthConfig,
}

impl SessionCookieStrategy {
    pub fn new(sessions: SessionManager, config: AuthConfig) -> Self {
        Self { sessions, config }
    }
}

#[async_trait]
impl CredentialStrategy for SessionCookieStrategy {
    fn name(&self) -> &'static str {
        "session_cookie"
    }

    async fn resolve(&self, credentials: &RequestCredentials) -> AuthResult<StrategyResult> {
        let Some(token) = credentials.session_token.as_deref() else {
            return Ok(StrategyResult::skipped());
        };

        // Sign-in and sign-out handlers write the cookie themselves
        let auth_route = self.config.is_auth_route(&credentials.path);

        match self.sessions.validate(token).await? {
            Some(validated) => {
                let cookie = if validated.renewed && !auth_route {
                    CookieDirective::Set {
                        token: token.to_string(),
                        expires_at: validated.session.expires_at,
                    }
                } else {
                    CookieDirective::Keep
                };

                Ok(StrategyResult::Resolved {
                    outcome: AuthenticationOutcome::Session {
                        session: validated.session,
                        principal: validated.principal,
                    },
                    cookie,
                })
            }
            None if auth_route => Ok(StrategyResult::skipped()),
            None => Ok(StrategyResult::Skipped {
                cookie: CookieDirective::Clear,
            }),
        }
    }
}

/// Authenticates with an `Authorization: Bearer <api key>` header
pub struct BearerApiKeyStrategy {
    api_keys: ApiKeyManager,
}

impl BearerApiKeyStrategy {
    pub fn new(api_keys: ApiKeyManager) -> Self {
        Self { api_keys }
    }
}

#[async_trait]
impl CredentialStrategy for BearerApiKeyStrategy {
    fn name(&self) -> &'static str {
        "bearer_api_key"
    }

    async fn resolve(&self, credentials: &RequestCredentials) -> AuthResult<StrategyResult> {
        let Some(raw_key) = credentials.bearer_token() else {
            if credentials.authorization.is_some() {
                tracing::debug!("Ignoring Authorization header without a bearer token");
            }
            return Ok(StrategyResult::skipped());
        };

        Ok(match self.api_keys.validate(raw_key).await? {
            Some((api_key, principal)) => StrategyResult::Resolved {
                outcome: AuthenticationOutcome::ApiKey { api_key, principal },
                cookie: CookieDirective::Keep,
            },
            None => StrategyResult::skipped(),
        })
    }
}

/// Runs strategies in order until one resolves
pub struct AuthenticationResolver {
    strategies: Vec<Box<dyn CredentialStrategy>>,
}

impl AuthenticationResolver {
    pub fn new(strategies: Vec<Box<dyn CredentialStrategy>>) -> Self {
        Self { strategies }
    }

    /// Session cookie first, then bearer API key
    pub fn standard(sessions: SessionManager, api_keys: ApiKeyManager, config: AuthConfig) -> Self {
        Self::new(vec![
            Box::new(SessionCookieStrategy::new(sessions, config)),
            Box::new(BearerApiKeyStrategy::new(api_keys)),
        ])
    }

    /// Resolves the identity of a request
    ///
    /// A non-`Keep` cookie directive from a skipped strategy is carried over
    /// unless a later strategy issues its own.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`](crate::auth::AuthError) as soon as
    /// any strategy hits a store failure.
    #[tracing::instrument(skip_all, fields(path = %credentials.path))]
    pub async fn resolve(&self, credentials: &RequestCredentials) -> AuthResult<Resolution> {
        let mut cookie = CookieDirective::Keep;

        for strategy in &self.strategies {
            match strategy.resolve(credentials).await? {
                StrategyResult::Resolved {
                    outcome,
                    cookie: directive,
                } => {
                    if directive != CookieDirective::Keep {
                        cookie = directive;
                    }
                    tracing::debug!(
                        strategy = strategy.name(),
                        user_id = ?outcome.principal().map(|p| p.id),
                        "Request authenticated"
                    );
                    return Ok(Resolution { outcome, cookie });
                }
                StrategyResult::Skipped { cookie: directive } => {
                    if directive != CookieDirective::Keep {
                        cookie = directive;
                    }
                }
            }
        }

        Ok(Resolution {
            outcome: AuthenticationOutcome::Anonymous,
            cookie,
        })
    }
}
