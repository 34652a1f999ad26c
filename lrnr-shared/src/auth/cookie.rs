/// Session cookie rendering and parsing
///
/// Attributes: `HttpOnly; SameSite=Lax; Path=/`, `Expires` set to the session
/// expiry, and `Secure` only in production. Clearing sends the same attributes
/// with an empty value and `Max-Age=0`.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};

/// What the response should do with the session cookie
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CookieDirective {
    /// Leave the client's cookie alone
    #[default]
    Keep,

    /// (Re)issue the cookie with a new expiry
    Set {
        token: String,
        expires_at: DateTime<Utc>,
    },

    /// Tell the client to drop the cookie
    Clear,
}

impl CookieDirective {
    /// Renders the `Set-Cookie` value, if any
    pub fn to_header_value(&self, cookie_name: &str, production: bool) -> Option<String> {
        match self {
            CookieDirective::Keep => None,
            CookieDirective::Set { token, expires_at } => Some(session_cookie_header(
                cookie_name,
                token,
                *expires_at,
                production,
            )),
            CookieDirective::Clear => Some(clear_session_cookie_header(cookie_name, production)),
        }
    }
}

/// Renders a `Set-Cookie` value carrying the session token
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use lrnr_shared::auth::cookie::session_cookie_header;
///
/// let expires = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap();
/// assert_eq!(
///     session_cookie_header("session", "tok", expires, false),
///     "session=tok; HttpOnly; SameSite=Lax; Path=/; Expires=Fri, 31 Jan 2025 12:00:00 GMT"
/// );
/// ```
pub fn session_cookie_header(
    cookie_name: &str,
    token: &str,
    expires_at: DateTime<Utc>,
    production: bool,
) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Expires={}",
        cookie_name,
        token,
        expires_at.format("%a, %d %b %Y %H:%M:%S GMT")
    );
    if production {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Renders a `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie_header(cookie_name: &str, production: bool) -> String {
    let mut cookie = format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", cookie_name);
    if production {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Reads a cookie value from the request's `Cookie` headers
///
/// Returns `None` when the cookie is missing or empty.
pub fn read_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == cookie_name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
