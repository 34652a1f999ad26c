/// Authentication middleware and extractors for Axum
///
/// [`authenticate`] resolves every request once and stores the
/// [`AuthenticationOutcome`] in the request extensions. Handlers then pick
/// one of two extractors:
///
/// - `AuthenticationOutcome`: optional auth, anonymous requests pass through
/// - [`Authenticated`]: rejects anonymous requests with 401
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::get, Router};
/// use lrnr_shared::auth::middleware::{authenticate, Authenticated};
/// use lrnr_shared::auth::{AuthConfig, Authenticator};
/// use lrnr_shared::clock::SystemClock;
/// use lrnr_shared::store::MemoryCredentialStore;
///
/// async fn me(auth: Authenticated) -> String {
///     format!("Hello, {}!", auth.principal.name)
/// }
///
/// let auth = Arc::new(Authenticator::new(
///     Arc::new(MemoryCredentialStore::new()),
///     Arc::new(SystemClock),
///     AuthConfig::default(),
/// ));
///
/// let app: Router = Router::new()
///     .route("/me", get(me))
///     .layer(middleware::from_fn_with_state(auth, authenticate));
/// ```

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::auth::authenticator::Authenticator;
use crate::auth::error::AuthError;
use crate::auth::resolver::{AuthMethod, AuthenticationOutcome, Resolution};
use crate::models::Principal;

/// Resolves the request's identity and applies the session cookie directive
///
/// # Errors
///
/// Responds 503 when the credential store is unavailable. The request is not
/// passed on as anonymous in that case.
pub async fn authenticate(
    State(auth): State<Arc<Authenticator>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Resolution { outcome, cookie } = auth.resolve(req.headers(), req.uri().path()).await?;

    req.extensions_mut().insert(outcome);
    let mut response = next.run(req).await;

    let config = auth.config();
    if let Some(value) = cookie.to_header_value(&config.cookie_name, config.production) {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => {
                tracing::error!(error = %e, "Session cookie is not a valid header value");
            }
        }
    }

    Ok(response)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticationOutcome
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticationOutcome>()
            .cloned()
            .ok_or_else(|| AuthError::Internal("authentication middleware not installed".to_string()))
    }
}

/// An authenticated principal; rejects anonymous requests
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub principal: Principal,
    pub method: AuthMethod,
    pub outcome: AuthenticationOutcome,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let outcome = AuthenticationOutcome::from_request_parts(parts, state).await?;

        let (principal, method) = match &outcome {
            AuthenticationOutcome::Session { principal, .. } => (principal.clone(), AuthMethod::Session),
            AuthenticationOutcome::ApiKey { principal, .. } => (principal.clone(), AuthMethod::ApiKey),
            AuthenticationOutcome::Anonymous => return Err(AuthError::NotAuthenticated),
        };

        Ok(Authenticated {
            principal,
            method,
            outcome,
        })
    }
}
