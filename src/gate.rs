//! Route guarding.
//!
//! SYSTEM CONTEXT
//! ==============
//! Protected pages mount an [`AuthGate`]; guest pages (sign-up, sign-in) apply
//! [`guest_redirect`]. Both decide from the session store's [`AuthState`]
//! through an explicit transition table instead of render ordering.

use std::time::Duration;

use tokio::sync::watch;

use crate::session::AuthState;

/// Navigable pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignUp,
    SignIn,
    Crud,
}

impl Route {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::SignUp => "/",
            Self::SignIn => "/signin",
            Self::Crud => "/crud",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Session still resolving; show a neutral placeholder.
    Pending,
    /// Terminal for this mount.
    Redirecting(Route),
    Rendering,
}

/// Next gate state for an observed auth state.
#[must_use]
pub fn transition(gate: GateState, auth: &AuthState, redirect_to: Route) -> GateState {
    match (gate, auth) {
        (GateState::Redirecting(route), _) => GateState::Redirecting(route),
        (GateState::Pending, AuthState::Loading) => GateState::Pending,
        (GateState::Rendering, AuthState::Loading) => GateState::Rendering,
        (_, AuthState::Authenticated(_)) => GateState::Rendering,
        (_, AuthState::Unauthenticated) => GateState::Redirecting(redirect_to),
    }
}

/// Guard for one mount of a protected view.
#[derive(Debug)]
pub struct AuthGate {
    state: GateState,
    redirect_to: Route,
}

impl AuthGate {
    #[must_use]
    pub fn new(redirect_to: Route) -> Self {
        Self { state: GateState::Pending, redirect_to }
    }

    #[must_use]
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Re-evaluate against a new auth state.
    pub fn observe(&mut self, auth: &AuthState) -> GateState {
        self.state = transition(self.state, auth, self.redirect_to);
        self.state
    }

    /// Follow `auth` until the gate leaves `Pending` or `wait` elapses.
    pub async fn settle(&mut self, auth: &mut watch::Receiver<AuthState>, wait: Duration) -> GateState {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let current = auth.borrow_and_update().clone();
            if self.observe(&current) != GateState::Pending {
                return self.state;
            }
            match tokio::time::timeout_at(deadline, auth.changed()).await {
                Ok(Ok(())) => {}
                // Deadline hit or the store is gone; stay pending.
                Ok(Err(_)) | Err(_) => return self.state,
            }
        }
    }
}

/// Guest pages send signed-in viewers to the protected view, unless the
/// sign-up flow is showing a duplicate-account error.
#[must_use]
pub fn guest_redirect(auth: &AuthState, block_redirect: bool) -> Option<Route> {
    (auth.is_authenticated() && !block_redirect).then_some(Route::Crud)
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
