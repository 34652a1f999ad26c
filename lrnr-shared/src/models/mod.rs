/// Credential records and principals
///
/// # Models
///
/// - `principal`: The user a credential resolves to
/// - `session`: Browser sessions keyed by the hash of the cookie token
/// - `api_key`: Long-lived bearer keys, soft-revoked via `is_active`
///
/// Rows are read and written through [`crate::store::CredentialStore`]; the
/// models themselves carry no database handles.

pub mod api_key;
pub mod principal;
pub mod session;

pub use api_key::{ApiKey, CreateApiKey, NewApiKey};
pub use principal::Principal;
pub use session::Session;
