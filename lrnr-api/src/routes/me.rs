/// Identity of the caller
///
/// # Endpoint
///
/// ```text
/// GET /me
/// ```
///
/// # Response
///
/// ```json
/// {
///   "id": "7f0c...",
///   "name": "Ada",
///   "email": "ada@example.com",
///   "method": "session"
/// }
/// ```
///
/// Anonymous requests get 401.

use axum::Json;
use lrnr_shared::auth::{AuthError, AuthMethod, Authenticated};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub method: AuthMethod,
}

pub async fn me(auth: Result<Authenticated, AuthError>) -> ApiResult<Json<MeResponse>> {
    let auth = auth?;

    Ok(Json(MeResponse {
        id: auth.principal.id,
        name: auth.principal.name,
        email: auth.principal.email,
        method: auth.method,
    }))
}
