//! Auth routes: sign-up, sign-in, sign-out.

use std::sync::Arc;

use axum::Form;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};
use tracing::warn;

use crate::flow::{self, SignInOutcome};
use crate::gate::{Route, guest_redirect};
use crate::provider::Credentials;
use crate::render;
use crate::state::AppState;

// =============================================================================
// SIGN-UP
// =============================================================================

/// `GET /`: sign-up form, or the CRUD view for a signed-in viewer.
pub async fn sign_up_page(State(state): State<AppState>) -> Response {
    let auth = state.store.current();
    let mut form = state.sign_up_form.lock().await;
    form.remount();
    if let Some(route) = guest_redirect(&auth, false) {
        return Redirect::to(route.path()).into_response();
    }
    Html(render::sign_up_page(&form, "")).into_response()
}

/// `POST /`: run the sign-up flow and re-render with its result.
pub async fn sign_up_submit(State(state): State<AppState>, Form(credentials): Form<Credentials>) -> Response {
    let blocked = state.sign_up_form.lock().await.block_redirect;
    if let Some(route) = guest_redirect(&state.store.current(), blocked) {
        return Redirect::to(route.path()).into_response();
    }

    flow::sign_up(Arc::clone(&state.provider), Arc::clone(&state.sign_up_form), credentials.clone()).await;

    let form = state.sign_up_form.lock().await.clone();
    if let Some(route) = guest_redirect(&state.store.current(), form.block_redirect) {
        return Redirect::to(route.path()).into_response();
    }
    Html(render::sign_up_page(&form, &credentials.email)).into_response()
}

// =============================================================================
// SIGN-IN
// =============================================================================

/// `GET /signin`
pub async fn sign_in_page(State(state): State<AppState>) -> Response {
    let auth = state.store.current();
    let mut form = state.sign_in_form.lock().await;
    form.remount();
    if let Some(route) = guest_redirect(&auth, false) {
        return Redirect::to(route.path()).into_response();
    }
    Html(render::sign_in_page(&form, "")).into_response()
}

/// `POST /signin`: on success go to the CRUD view, otherwise show the error.
pub async fn sign_in_submit(State(state): State<AppState>, Form(credentials): Form<Credentials>) -> Response {
    match flow::sign_in(Arc::clone(&state.provider), Arc::clone(&state.sign_in_form), credentials.clone()).await {
        SignInOutcome::SignedIn => {
            super::await_session(&state, true).await;
            Redirect::to(Route::Crud.path()).into_response()
        }
        SignInOutcome::Failed(_) | SignInOutcome::Busy => {
            let form = state.sign_in_form.lock().await.clone();
            Html(render::sign_in_page(&form, &credentials.email)).into_response()
        }
    }
}

// =============================================================================
// SIGN-OUT
// =============================================================================

/// `POST /signout`: the local session is dropped even if the provider call
/// fails.
pub async fn sign_out(State(state): State<AppState>) -> Redirect {
    if let Err(e) = state.provider.sign_out().await {
        warn!(error = %e, "sign-out reported an error");
    }
    super::await_session(&state, false).await;
    Redirect::to(Route::SignIn.path())
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
