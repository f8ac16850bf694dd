//! CRUD routes. Every handler is guarded by an [`AuthGate`] that sends
//! signed-out viewers to the sign-in page.

use std::sync::Arc;

use axum::Form;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::warn;

use crate::crud::{self, CrudInput};
use crate::gate::{AuthGate, GateState, Route};
use crate::provider::Session;
use crate::render;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct EditForm {
    id: i64,
}

/// Run the gate for one request. A session that is still resolving is
/// answered by `pending`: pages show the placeholder, form posts bounce back
/// to the page instead of rendering at a POST-only path.
async fn admit(state: &AppState, pending: fn() -> Response) -> Result<Session, Response> {
    let mut gate = AuthGate::new(Route::SignIn);
    let mut auth = state.store.subscribe();
    let outcome = gate.settle(&mut auth, state.gate_settle).await;
    let session = auth.borrow().session().cloned();
    match (outcome, session) {
        (GateState::Rendering, Some(session)) => Ok(session),
        (GateState::Rendering, None) => Err(Redirect::to(Route::SignIn.path()).into_response()),
        (GateState::Redirecting(route), _) => Err(Redirect::to(route.path()).into_response()),
        (GateState::Pending, _) => Err(pending()),
    }
}

fn loading() -> Response {
    Html(render::loading_page()).into_response()
}

fn back_to_page() -> Response {
    Redirect::to(Route::Crud.path()).into_response()
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /crud`: refetch the list and render it.
pub async fn crud_page(State(state): State<AppState>) -> Response {
    let session = match admit(&state, loading).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    crud::refresh(state.rows.as_ref(), &state.crud, &session.access_token).await;
    let page = state.crud.lock().await;
    Html(render::crud_page(&page, &session.user)).into_response()
}

/// `POST /crud`: add a row, or update the one being edited.
pub async fn save_row(State(state): State<AppState>, Form(input): Form<CrudInput>) -> Response {
    let session = match admit(&state, back_to_page).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    crud::save(Arc::clone(&state.rows), Arc::clone(&state.crud), session.access_token, input).await;
    back_to_page()
}

/// `POST /crud/edit`
pub async fn edit_row(State(state): State<AppState>, Form(edit): Form<EditForm>) -> Response {
    if let Err(response) = admit(&state, back_to_page).await {
        return response;
    }
    if !crud::start_edit(&state.crud, edit.id).await {
        warn!(id = edit.id, "edit requested for unknown row");
    }
    back_to_page()
}

/// `POST /crud/cancel`
pub async fn cancel_edit(State(state): State<AppState>) -> Response {
    if let Err(response) = admit(&state, back_to_page).await {
        return response;
    }
    crud::cancel_edit(&state.crud).await;
    back_to_page()
}

/// `POST /crud/{id}/delete`: the browser has already asked for confirmation.
pub async fn delete_row(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let session = match admit(&state, back_to_page).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    if !crud::delete(Arc::clone(&state.rows), Arc::clone(&state.crud), session.access_token, id).await {
        warn!(id, "delete skipped: another change is in flight");
    }
    back_to_page()
}

#[cfg(test)]
#[path = "crud_test.rs"]
mod tests;
