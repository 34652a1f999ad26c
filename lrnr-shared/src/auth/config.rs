/// Authentication tunables
///
/// `Default` carries the production constants: 30-day sessions renewed once
/// they enter their last 15 days, a cookie named `session`, and `/auth` as the
/// sign-in/sign-out route prefix.

use chrono::Duration;

/// Days in the trailing renewal window
pub const SESSION_REFRESH_WINDOW_DAYS: i64 = 15;

/// Total session lifetime in days (twice the renewal window)
pub const SESSION_MAX_DURATION_DAYS: i64 = SESSION_REFRESH_WINDOW_DAYS * 2;

/// Default session cookie name
pub const SESSION_COOKIE_NAME: &str = "session";

/// Default path prefix of the sign-in/sign-out routes
pub const AUTH_PATH_PREFIX: &str = "/auth";

/// Configuration consumed by the managers, the resolver and the middleware
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Production mode: adds `Secure` to session cookies
    pub production: bool,

    /// Name of the session cookie
    pub cookie_name: String,

    /// Lifetime granted on creation and on every renewal
    pub session_max_duration: Duration,

    /// Trailing window in which validation extends the session
    pub session_refresh_window: Duration,

    /// Requests under this prefix never get a renewal cookie; their handlers own the cookie
    pub auth_path_prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            production: false,
            cookie_name: SESSION_COOKIE_NAME.to_string(),
            session_max_duration: Duration::days(SESSION_MAX_DURATION_DAYS),
            session_refresh_window: Duration::days(SESSION_REFRESH_WINDOW_DAYS),
            auth_path_prefix: AUTH_PATH_PREFIX.to_string(),
        }
    }
}

impl AuthConfig {
    /// Default configuration with the production flag set
    pub fn for_environment(production: bool) -> Self {
        Self {
            production,
            ..Self::default()
        }
    }

    /// True for the prefix itself and any path below it
    pub fn is_auth_route(&self, path: &str) -> bool {
        let prefix = self.auth_path_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return false;
        }
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
