use std::sync::Arc;

use axum::http::StatusCode;

use crate::flow::{ALREADY_EXISTS_MESSAGE, CONFIRM_EMAIL_NOTICE};
use crate::provider::test_helpers::{MockProvider, sample_session};
use crate::provider::{AuthError, INVALID_CREDENTIALS_MESSAGE};
use crate::routes::app;
use crate::routes::test_helpers::{assert_redirect, body_text, get, post_form};
use crate::rows::test_helpers::MemoryRows;
use crate::state::test_helpers::test_app_state;

const ADA: &str = "email=ada%40example.com&password=hunter2";

async fn signed_out() -> (Arc<MockProvider>, axum::Router) {
    let provider = Arc::new(MockProvider::new());
    let state = test_app_state(Arc::clone(&provider), Arc::new(MemoryRows::new())).await;
    (provider, app(state))
}

async fn signed_in() -> (Arc<MockProvider>, axum::Router) {
    let provider = Arc::new(MockProvider::signed_in(sample_session("ada@example.com")));
    let state = test_app_state(Arc::clone(&provider), Arc::new(MemoryRows::new())).await;
    (provider, app(state))
}

// =============================================================================
// SIGN-UP
// =============================================================================

#[tokio::test]
async fn sign_up_page_renders_for_guests() {
    let (_, app) = signed_out().await;
    let response = get(app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Create your account"));
    assert!(html.contains(">Sign up</button>"));
}

#[tokio::test]
async fn sign_up_page_sends_signed_in_viewer_to_crud() {
    let (_, app) = signed_in().await;
    assert_redirect(&get(app, "/").await, "/crud");
}

#[tokio::test]
async fn sign_up_page_ignores_stale_redirect_block() {
    let provider = Arc::new(MockProvider::signed_in(sample_session("ada@example.com")));
    let state = test_app_state(provider, Arc::new(MemoryRows::new())).await;
    state.sign_up_form.lock().await.block_redirect = true;

    assert_redirect(&get(app(state.clone()), "/").await, "/crud");
    assert!(!state.sign_up_form.lock().await.block_redirect);
}

#[tokio::test]
async fn sign_up_new_account_shows_confirmation_notice() {
    let (provider, app) = signed_out().await;

    let response = post_form(app, "/", ADA).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(CONFIRM_EMAIL_NOTICE));
    assert!(html.contains(r#"value="ada@example.com""#));
    assert_eq!(provider.calls(), vec!["current_session", "sign_in", "sign_up"]);
}

#[tokio::test]
async fn sign_up_existing_account_shows_error_without_redirect() {
    let (provider, app) = signed_out().await;
    provider.push_sign_in(Ok(sample_session("ada@example.com")));

    let response = post_form(app, "/", ADA).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(ALREADY_EXISTS_MESSAGE));
    assert_eq!(provider.count("sign_out"), 1);
    assert_eq!(provider.count("sign_up"), 0);
    assert!(!provider.holds_session());
}

#[tokio::test]
async fn sign_up_provider_error_is_shown_verbatim() {
    let (provider, app) = signed_out().await;
    provider.push_sign_up(Err(AuthError::Provider { status: 422, message: "Password should be at least 6 characters".into() }));

    let html = body_text(post_form(app, "/", ADA).await).await;

    assert!(html.contains("Password should be at least 6 characters"));
}

#[tokio::test]
async fn sign_up_missing_fields_is_rejected() {
    let (provider, app) = signed_out().await;
    let response = post_form(app, "/", "email=ada%40example.com").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(provider.count("sign_in"), 0);
}

// =============================================================================
// SIGN-IN
// =============================================================================

#[tokio::test]
async fn sign_in_page_renders_for_guests() {
    let (_, app) = signed_out().await;
    let html = body_text(get(app, "/signin").await).await;
    assert!(html.contains("Welcome back"));
    assert!(html.contains(">Sign in</button>"));
}

#[tokio::test]
async fn sign_in_page_sends_signed_in_viewer_to_crud() {
    let (_, app) = signed_in().await;
    assert_redirect(&get(app, "/signin").await, "/crud");
}

#[tokio::test]
async fn sign_in_wrong_password_shows_alert() {
    let (_, app) = signed_out().await;

    let response = post_form(app, "/signin", ADA).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(&format!(r#"<p class="error" role="alert">{INVALID_CREDENTIALS_MESSAGE}</p>"#)));
}

#[tokio::test]
async fn sign_in_success_redirects_to_crud() {
    let (provider, app) = signed_out().await;
    provider.push_sign_in(Ok(sample_session("ada@example.com")));

    let response = post_form(app.clone(), "/signin", ADA).await;

    assert_redirect(&response, "/crud");
    let page = get(app, "/crud").await;
    assert_eq!(page.status(), StatusCode::OK);
}

#[tokio::test]
async fn sign_in_error_clears_on_reload() {
    let (_, app) = signed_out().await;
    post_form(app.clone(), "/signin", ADA).await;

    let html = body_text(get(app, "/signin").await).await;

    assert!(!html.contains("role=\"alert\""));
}

// =============================================================================
// SIGN-OUT
// =============================================================================

#[tokio::test]
async fn sign_out_redirects_to_sign_in() {
    let (provider, app) = signed_in().await;

    let response = post_form(app.clone(), "/signout", "").await;

    assert_redirect(&response, "/signin");
    assert_eq!(provider.count("sign_out"), 1);
    assert_redirect(&get(app, "/crud").await, "/signin");
}

#[tokio::test]
async fn sign_out_failure_still_signs_out_locally() {
    let (provider, app) = signed_in().await;
    provider.fail_sign_out(AuthError::Network("connection reset".into()));

    let response = post_form(app.clone(), "/signout", "").await;

    assert_redirect(&response, "/signin");
    assert_redirect(&get(app, "/crud").await, "/signin");
}
