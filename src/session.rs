//! Session store: the single source of truth for authentication state.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route guards and the sign-up/sign-in pages read from here. Nothing but the
//! store's listener task writes to it.
//!
//! DESIGN
//! ======
//! The listener subscribes to the provider's push channel first, then
//! resolves the initial session, then applies queued and future events in
//! arrival order. State is republished on a `tokio::sync::watch`, so readers
//! get a synchronous `current()` and an async change feed.
//!
//! `Loading` is left exactly once, by the initial resolution. A provider fault
//! during that resolution counts as signed out.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::provider::{IdentityProvider, Session, SessionEvent, User};

/// Tri-state view of the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Loading,
    Authenticated(Session),
    Unauthenticated,
}

impl AuthState {
    #[must_use]
    pub fn from_session(session: Option<Session>) -> Self {
        match session {
            Some(session) => Self::Authenticated(session),
            None => Self::Unauthenticated,
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            Self::Loading | Self::Unauthenticated => None,
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.session().map(|s| &s.user)
    }
}

/// Process-wide session store. Dropping it tears down the provider
/// subscription.
pub struct SessionStore {
    state: watch::Receiver<AuthState>,
    listener: JoinHandle<()>,
}

impl SessionStore {
    /// Start the store: subscribe to `provider` and resolve the initial
    /// session in the background.
    pub fn spawn(provider: Arc<dyn IdentityProvider>) -> Self {
        let (tx, rx) = watch::channel(AuthState::Loading);
        let events = provider.on_session_change();
        let listener = tokio::spawn(run_listener(provider, events, tx));
        Self { state: rx, listener }
    }

    /// Current state. Never blocks.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receive every subsequent state change. Drop the receiver to stop.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    /// Wait until the initial resolution has finished.
    pub async fn wait_resolved(&self) -> AuthState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            // The listener is gone; nothing will ever resolve it.
            Err(_) => AuthState::Unauthenticated,
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Resolve the provider's current session once.
pub async fn initialize(provider: &dyn IdentityProvider) -> AuthState {
    match provider.current_session().await {
        Ok(session) => AuthState::from_session(session),
        Err(e) => {
            warn!(error = %e, "initial session lookup failed; treating as signed out");
            AuthState::Unauthenticated
        }
    }
}

/// State implied by a pushed session event.
#[must_use]
pub fn apply_event(event: &SessionEvent) -> AuthState {
    AuthState::from_session(event.session().cloned())
}

async fn run_listener(
    provider: Arc<dyn IdentityProvider>,
    mut events: broadcast::Receiver<SessionEvent>,
    state: watch::Sender<AuthState>,
) {
    let resolved = initialize(provider.as_ref()).await;
    info!(authenticated = resolved.is_authenticated(), "session resolved");
    publish(&state, resolved);

    loop {
        match events.recv().await {
            Ok(event) => {
                debug!(event = event.name(), "session change");
                publish(&state, apply_event(&event));
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "session events lagged; resyncing");
                publish(&state, initialize(provider.as_ref()).await);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("session event channel closed");
                break;
            }
        }
    }
}

fn publish(state: &watch::Sender<AuthState>, next: AuthState) {
    state.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
