/// API route handlers
///
/// - `health`: liveness and credential store connectivity
/// - `me`: the authenticated principal behind the request

pub mod health;
pub mod me;

use axum::{routing::get, Router};

use crate::app::AppState;

/// Routes the server itself serves behind authentication
pub fn server_routes() -> Router<AppState> {
    Router::new().route("/me", get(me::me))
}
