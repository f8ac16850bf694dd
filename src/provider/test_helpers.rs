//! Scripted in-process identity provider for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use super::{AuthError, Credentials, IdentityProvider, INVALID_CREDENTIALS_MESSAGE, Session, SessionEvent};

/// Build a session that is valid for an hour.
#[must_use]
pub fn sample_session(email: &str) -> Session {
    Session {
        access_token: format!("access-{email}"),
        refresh_token: format!("refresh-{email}"),
        token_type: "bearer".into(),
        expires_at: super::unix_now() + 3600,
        user: super::User { id: Uuid::new_v4(), email: Some(email.to_owned()) },
    }
}

#[must_use]
pub fn invalid_credentials() -> AuthError {
    AuthError::InvalidCredentials(INVALID_CREDENTIALS_MESSAGE.into())
}

/// Provider whose answers are queued up front.
///
/// Unscripted sign-ins fail with invalid credentials; unscripted sign-ups
/// succeed. Successful sign-ins and all sign-outs emit events, like the
/// real adapter.
pub struct MockProvider {
    sign_in_results: Mutex<VecDeque<Result<Session, AuthError>>>,
    sign_up_results: Mutex<VecDeque<Result<(), AuthError>>>,
    sign_out_result: Mutex<Option<AuthError>>,
    current: Mutex<Option<Session>>,
    current_error: Mutex<Option<AuthError>>,
    hold_current: Mutex<Option<Arc<Notify>>>,
    hold_sign_in: Mutex<Option<Arc<Notify>>>,
    hold_sign_out: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<&'static str>>,
    events: broadcast::Sender<SessionEvent>,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            sign_in_results: Mutex::new(VecDeque::new()),
            sign_up_results: Mutex::new(VecDeque::new()),
            sign_out_result: Mutex::new(None),
            current: Mutex::new(None),
            current_error: Mutex::new(None),
            hold_current: Mutex::new(None),
            hold_sign_in: Mutex::new(None),
            hold_sign_out: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Provider that already holds `session`.
    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        let provider = Self::new();
        *provider.current.lock().unwrap() = Some(session);
        provider
    }

    pub fn push_sign_in(&self, result: Result<Session, AuthError>) {
        self.sign_in_results.lock().unwrap().push_back(result);
    }

    pub fn push_sign_up(&self, result: Result<(), AuthError>) {
        self.sign_up_results.lock().unwrap().push_back(result);
    }

    pub fn fail_sign_out(&self, error: AuthError) {
        *self.sign_out_result.lock().unwrap() = Some(error);
    }

    pub fn fail_current_session(&self, error: AuthError) {
        *self.current_error.lock().unwrap() = Some(error);
    }

    /// Make `current_session` wait until the returned handle is notified.
    pub fn hold_current_session(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold_current.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    /// Make the next `sign_in_with_password` wait until notified.
    pub fn hold_sign_in(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold_sign_in.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    /// Make the next `sign_out` wait until notified.
    pub fn hold_sign_out(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold_sign_out.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    /// Push an event as if the provider changed its session on its own.
    pub fn emit(&self, event: SessionEvent) {
        *self.current.lock().unwrap() = event.session().cloned();
        let _ = self.events.send(event);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    #[must_use]
    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    #[must_use]
    pub fn holds_session(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(slot: &Mutex<Option<Arc<Notify>>>) {
        let hold = slot.lock().unwrap().take();
        if let Some(notify) = hold {
            notify.notified().await;
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockProvider {
    async fn sign_in_with_password(&self, _credentials: &Credentials) -> Result<Session, AuthError> {
        self.record("sign_in");
        Self::pause(&self.hold_sign_in).await;
        let result = self
            .sign_in_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(invalid_credentials()));
        if let Ok(session) = &result {
            self.emit(SessionEvent::SignedIn(session.clone()));
        }
        result
    }

    async fn sign_up(&self, _credentials: &Credentials) -> Result<(), AuthError> {
        self.record("sign_up");
        self.sign_up_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.record("sign_out");
        Self::pause(&self.hold_sign_out).await;
        self.emit(SessionEvent::SignedOut);
        match self.sign_out_result.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        self.record("current_session");
        Self::pause(&self.hold_current).await;
        if let Some(e) = self.current_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.current.lock().unwrap().clone())
    }

    fn on_session_change(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
