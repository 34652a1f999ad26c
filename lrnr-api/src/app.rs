/// Application state and router builder
///
/// The server owns no business routes of its own. Callers hand their routes to
/// [`build_router`], which puts them behind the authentication middleware and
/// adds `/health` and request tracing.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::{routing::get, Router};
/// use lrnr_api::{app::{build_router, AppState}, config::Config};
/// use lrnr_shared::auth::Authenticated;
/// use lrnr_shared::clock::SystemClock;
/// use lrnr_shared::store::MemoryCredentialStore;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(MemoryCredentialStore::new()), Arc::new(SystemClock), config);
///
/// let routes = Router::new().route(
///     "/me",
///     get(|auth: Authenticated| async move { auth.principal.email }),
/// );
/// let app = build_router(state, routes);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use axum::{routing::get, Router};
use lrnr_shared::auth::{authenticate, Authenticator};
use lrnr_shared::clock::Clock;
use lrnr_shared::store::CredentialStore;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::Config;
use crate::routes::health::health_check;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Managers, resolver and cookie settings
    pub auth: Arc<Authenticator>,

    /// Credential store, also used by the health check
    pub store: Arc<dyn CredentialStore>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>, config: Config) -> Self {
        let auth = Authenticator::new(Arc::clone(&store), clock, config.auth());

        Self {
            auth: Arc::new(auth),
            store,
            config: Arc::new(config),
        }
    }
}

/// Builds the Axum router
///
/// # Layout
///
/// ```text
/// /
/// ├── GET /health        # public, outside authentication
/// └── <app_routes>       # every request resolved to session, API key or anonymous
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Logging (tower-http TraceLayer)
/// 2. Authentication (`lrnr_shared::auth::authenticate`) on `app_routes` only
pub fn build_router(state: AppState, app_routes: Router<AppState>) -> Router {
    let authenticated = app_routes.layer(axum::middleware::from_fn_with_state(
        Arc::clone(&state.auth),
        authenticate,
    ));

    Router::new()
        .route("/health", get(health_check))
        .merge(authenticated)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
