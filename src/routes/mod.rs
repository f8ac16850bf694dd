//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Three server-rendered pages: sign-up at `/`, sign-in at `/signin`, and the
//! protected CRUD view at `/crud`. Every page submits plain HTML forms back to
//! the same router; there is no JSON API.

pub mod auth;
pub mod crud;

#[cfg(test)]
pub mod test_helpers;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio::time::timeout;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(auth::sign_up_page).post(auth::sign_up_submit))
        .route("/signin", get(auth::sign_in_page).post(auth::sign_in_submit))
        .route("/signout", post(auth::sign_out))
        .route("/crud", get(crud::crud_page).post(crud::save_row))
        .route("/crud/edit", post(crud::edit_row))
        .route("/crud/cancel", post(crud::cancel_edit))
        .route("/crud/{id}/delete", post(crud::delete_row))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wait for the session store to catch up with a sign-in or sign-out the
/// handler just performed, so the page it redirects to sees the new state.
pub(crate) async fn await_session(state: &AppState, authenticated: bool) {
    let mut rx = state.store.subscribe();
    let caught_up = timeout(state.gate_settle, rx.wait_for(|auth| auth.is_authenticated() == authenticated)).await;
    if !matches!(caught_up, Ok(Ok(_))) {
        debug!(authenticated, "session store did not catch up before redirect");
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
