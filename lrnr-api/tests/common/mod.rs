//! Common test utilities for the API integration tests
//!
//! - In-memory credential store seeded with one principal
//! - Manual clock
//! - The production router plus sign-in/sign-out handlers the way an
//!   application would write them on top of `Authenticator`

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{TimeZone, Utc};
use lrnr_api::app::{build_router, AppState};
use lrnr_api::config::Config;
use lrnr_api::error::ApiResult;
use lrnr_api::routes::server_routes;
use lrnr_shared::auth::AuthenticationOutcome;
use lrnr_shared::clock::ManualClock;
use lrnr_shared::models::Principal;
use lrnr_shared::store::MemoryCredentialStore;
use serde::Deserialize;
use tower::ServiceExt;
use uuid::Uuid;

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: Arc<MemoryCredentialStore>,
    pub clock: Arc<ManualClock>,
    pub state: AppState,
    pub app: Router,
    pub user: Principal,
}

#[derive(Deserialize)]
struct SignInRequest {
    user_id: Uuid,
}

async fn sign_in(State(state): State<AppState>, Json(body): Json<SignInRequest>) -> ApiResult<Response> {
    let signed_in = state.auth.sign_in(body.user_id).await?;
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, signed_in.set_cookie)]).into_response())
}

async fn sign_out(State(state): State<AppState>, outcome: AuthenticationOutcome) -> ApiResult<Response> {
    let cleared = state.auth.sign_out(&outcome).await?;
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cleared)]).into_response())
}

impl TestContext {
    pub async fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()));
        let store = Arc::new(MemoryCredentialStore::new().with_clock(clock.clone()));
        let user = store
            .insert_principal(Principal::new("Test User", "test@example.com", "test_hash"))
            .await;

        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgresql://unused/lrnr_test".to_string()),
            _ => None,
        })
        .expect("test config");

        let state = AppState::new(store.clone(), clock.clone(), config);
        let routes = server_routes()
            .route("/auth/sign-in", post(sign_in))
            .route("/auth/sign-out", post(sign_out));
        let app = build_router(state.clone(), routes);

        Self {
            store,
            clock,
            state,
            app,
            user,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Signs the test user in and returns the raw session token
    pub async fn sign_in(&self) -> String {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/sign-in")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(r#"{{"user_id":"{}"}}"#, self.user.id)))
            .unwrap();

        let response = self.send(request).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let set_cookie = set_cookie(response.headers()).expect("sign-in sets the session cookie");
        cookie_value(&set_cookie).to_string()
    }
}

/// GET request with an optional `Cookie` and `Authorization` header
pub fn get(uri: &str, cookie: Option<&str>, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
    }
    builder.body(Body::empty()).unwrap()
}

/// The single `Set-Cookie` value of a response, if any
pub fn set_cookie(headers: &HeaderMap) -> Option<String> {
    let mut values = headers.get_all(header::SET_COOKIE).iter();
    let value = values.next()?.to_str().unwrap().to_string();
    assert!(values.next().is_none(), "expected at most one Set-Cookie header");
    Some(value)
}

/// Value part of `name=value; attrs...`
pub fn cookie_value(set_cookie: &str) -> &str {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap_or_default()
}

/// `Expires` attribute parsed back into a timestamp
pub fn cookie_expires(set_cookie: &str) -> chrono::DateTime<Utc> {
    let raw = set_cookie
        .split(';')
        .find_map(|attr| attr.trim().strip_prefix("Expires="))
        .expect("cookie has Expires");
    chrono::DateTime::parse_from_rfc2822(raw)
        .expect("RFC 1123 date")
        .with_timezone(&Utc)
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
