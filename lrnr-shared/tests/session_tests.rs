/// Session lifecycle tests
///
/// Covers creation, single-session replacement, the renewal threshold on
/// both sides, lazy expiry and bulk invalidation.

mod common;

use chrono::Duration;
use common::TestContext;
use lrnr_shared::auth::token::hash_token;
use lrnr_shared::auth::AuthError;
use lrnr_shared::store::CredentialStore;

#[tokio::test]
async fn test_second_create_invalidates_first() {
    let ctx = TestContext::new().await;

    let (first, _) = ctx.sessions().create(ctx.user.id).await.unwrap();
    let (second, _) = ctx.sessions().create(ctx.user.id).await.unwrap();

    assert!(ctx.sessions().validate(&first).await.unwrap().is_none());
    let validated = ctx.sessions().validate(&second).await.unwrap().unwrap();
    assert_eq!(validated.principal.id, ctx.user.id);
    assert_eq!(ctx.store.session_count_for_user(ctx.user.id).await, 1);
}

#[tokio::test]
async fn test_create_removes_expired_sessions_too() {
    let ctx = TestContext::new().await;

    let (_, old) = ctx.sessions().create(ctx.user.id).await.unwrap();
    ctx.clock.set(old.expires_at + Duration::days(1));
    ctx.sessions().create(ctx.user.id).await.unwrap();

    assert!(ctx.store.find_session(&old.id).await.unwrap().is_none());
    assert_eq!(ctx.store.session_count_for_user(ctx.user.id).await, 1);
}

#[tokio::test]
async fn test_not_renewed_just_outside_refresh_window() {
    let ctx = TestContext::new().await;
    let (token, session) = ctx.sessions().create(ctx.user.id).await.unwrap();

    let threshold = session.expires_at - ctx.sessions().refresh_window();
    ctx.clock.set(threshold - Duration::seconds(1));

    let validated = ctx.sessions().validate(&token).await.unwrap().unwrap();

    assert!(!validated.renewed);
    assert_eq!(validated.session.expires_at, session.expires_at);
}

#[tokio::test]
async fn test_renewed_just_inside_refresh_window() {
    let ctx = TestContext::new().await;
    let (token, session) = ctx.sessions().create(ctx.user.id).await.unwrap();

    let threshold = session.expires_at - ctx.sessions().refresh_window();
    let now = threshold + Duration::seconds(1);
    ctx.clock.set(now);

    let validated = ctx.sessions().validate(&token).await.unwrap().unwrap();

    assert!(validated.renewed);
    assert_eq!(validated.session.expires_at, now + Duration::days(30));

    // Persisted, not just returned
    let stored = ctx.store.find_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.expires_at, now + Duration::days(30));
}

#[tokio::test]
async fn test_expired_session_is_deleted() {
    let ctx = TestContext::new().await;
    let (token, session) = ctx.sessions().create(ctx.user.id).await.unwrap();

    ctx.clock.set(session.expires_at);

    assert!(ctx.sessions().validate(&token).await.unwrap().is_none());
    assert!(ctx.store.find_session(&session.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_alive_one_second_before_expiry() {
    let ctx = TestContext::new().await;
    let (token, session) = ctx.sessions().create(ctx.user.id).await.unwrap();

    ctx.clock.set(session.expires_at - Duration::seconds(1));

    let validated = ctx.sessions().validate(&token).await.unwrap().unwrap();
    assert!(validated.renewed);
}

#[tokio::test]
async fn test_continuous_use_never_expires() {
    let ctx = TestContext::new().await;
    let (token, _) = ctx.sessions().create(ctx.user.id).await.unwrap();

    // A request every 20 days for 200 days
    for _ in 0..10 {
        ctx.clock.advance(Duration::days(20));
        assert!(ctx.sessions().validate(&token).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_idle_user_logged_out_after_max_duration() {
    let ctx = TestContext::new().await;
    let (token, _) = ctx.sessions().create(ctx.user.id).await.unwrap();

    ctx.clock.advance(Duration::days(30));

    assert!(ctx.sessions().validate(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalidate_all_for_user() {
    let ctx = TestContext::new().await;
    let (token, _) = ctx.sessions().create(ctx.user.id).await.unwrap();

    let removed = ctx.sessions().invalidate_all_for_user(ctx.user.id).await.unwrap();

    assert_eq!(removed, 1);
    assert!(ctx.sessions().validate(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalidate_by_hashed_id() {
    let ctx = TestContext::new().await;
    let (token, _) = ctx.sessions().create(ctx.user.id).await.unwrap();

    ctx.sessions().invalidate(&hash_token(&token)).await.unwrap();

    assert!(ctx.sessions().validate(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_store_outage_is_an_error_not_anonymous() {
    let ctx = TestContext::new().await;
    let (token, _) = ctx.sessions().create(ctx.user.id).await.unwrap();

    ctx.store.set_unavailable(true);

    let err = ctx.sessions().validate(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::StoreUnavailable(_)));

    let err = ctx.sessions().create(ctx.user.id).await.unwrap_err();
    assert!(matches!(err, AuthError::StoreUnavailable(_)));
}
