/// Session and API key authentication
///
/// # Modules
///
/// - [`token`]: random token generation and SHA-256 hashing
/// - [`session`]: session lifecycle with sliding renewal
/// - [`api_key`]: API key issuance, validation and revocation
/// - [`resolver`]: ordered credential strategies producing an [`AuthenticationOutcome`]
/// - [`cookie`]: `Set-Cookie` rendering and `Cookie` parsing
/// - [`middleware`]: Axum middleware and extractors
/// - [`authenticator`]: wiring plus sign-in/sign-out helpers
///
/// # Security Features
///
/// - **No stored secrets**: only SHA-256 digests of tokens and keys reach the store
/// - **Single session per user**: creating a session replaces the previous one
/// - **Fail closed**: a store outage is an error, never an anonymous request

pub mod api_key;
pub mod authenticator;
pub mod config;
pub mod cookie;
pub mod error;
pub mod middleware;
pub mod resolver;
pub mod session;
pub mod token;

pub use api_key::ApiKeyManager;
pub use authenticator::{Authenticator, SignedIn};
pub use config::AuthConfig;
pub use cookie::CookieDirective;
pub use error::{AuthError, AuthResult};
pub use middleware::{authenticate, Authenticated};
pub use resolver::{
    AuthMethod, AuthenticationOutcome, AuthenticationResolver, BearerApiKeyStrategy,
    CredentialStrategy, RequestCredentials, Resolution, SessionCookieStrategy, StrategyResult,
};
pub use session::{SessionManager, ValidatedSession};
