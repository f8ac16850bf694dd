//! Sign-up and sign-in flows.
//!
//! SYSTEM CONTEXT
//! ==============
//! Form handlers call into here with the shared form state for their page.
//! The flows talk to the identity provider and fold its answers into that
//! state; session changes reach the session store through the provider's
//! push channel, never from here.
//!
//! DESIGN
//! ======
//! The form lock is never held across a provider call. The loading flag is
//! set under the lock before the first call and cleared under the lock after
//! the last one, on every path. A submission that finds the flag set is
//! rejected as busy.
//!
//! Each submission runs on its own task. The handler waits for it, but a
//! dropped request only detaches the task, so the loading flag is always
//! cleared and a probe session is always signed out.
//!
//! The provider has no "does this account exist" query, so sign-up first
//! probes with a sign-in. A successful probe means the account exists; the
//! probe session is signed out before the error is recorded.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::provider::{AuthError, Credentials, IdentityProvider};

pub const ALREADY_EXISTS_MESSAGE: &str = "User already exists. Please sign in instead.";
pub const CONFIRM_EMAIL_NOTICE: &str = "Check your email to confirm (if confirmation is enabled).";
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Per-page form bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub loading: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
    /// Set while a duplicate-account error is on screen.
    pub block_redirect: bool,
}

impl FormState {
    /// Fresh state for a new page load. An in-flight submission keeps its
    /// loading flag.
    pub fn remount(&mut self) {
        self.error = None;
        self.notice = None;
        self.block_redirect = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// Account created; the user must confirm by email.
    ConfirmationSent,
    /// The probe sign-in succeeded.
    AlreadyExists,
    Failed(String),
    /// Another submission is in flight.
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    SignedIn,
    Failed(String),
    Busy,
}

/// Text shown for a provider error.
#[must_use]
pub fn user_message(err: &AuthError) -> String {
    let text = err.to_string();
    if text.trim().is_empty() { GENERIC_FAILURE_MESSAGE.to_owned() } else { text }
}

/// Mark the form as submitting. Returns `false` if it already was.
async fn begin(form: &Mutex<FormState>) -> bool {
    let mut state = form.lock().await;
    if state.loading {
        return false;
    }
    state.loading = true;
    state.remount();
    true
}

/// Run `flow` on its own task and wait for it. Dropping the caller detaches
/// the task instead of cancelling it. `None` means the task panicked; the
/// form is released with the generic error.
async fn detached<T>(form: &Mutex<FormState>, flow: impl Future<Output = T> + Send + 'static) -> Option<T>
where
    T: Send + 'static,
{
    match tokio::spawn(flow).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!(error = %e, "form submission task failed");
            let mut state = form.lock().await;
            state.loading = false;
            state.error = Some(GENERIC_FAILURE_MESSAGE.to_owned());
            None
        }
    }
}

/// Run the sign-up flow for `credentials`.
pub async fn sign_up(provider: Arc<dyn IdentityProvider>, form: Arc<Mutex<FormState>>, credentials: Credentials) -> SignUpOutcome {
    let flow = {
        let form = Arc::clone(&form);
        async move { run_sign_up(provider.as_ref(), &form, &credentials).await }
    };
    detached(&form, flow)
        .await
        .unwrap_or_else(|| SignUpOutcome::Failed(GENERIC_FAILURE_MESSAGE.to_owned()))
}

async fn run_sign_up(provider: &dyn IdentityProvider, form: &Mutex<FormState>, credentials: &Credentials) -> SignUpOutcome {
    if !begin(form).await {
        return SignUpOutcome::Busy;
    }

    let outcome = probe_then_sign_up(provider, credentials).await;

    let mut state = form.lock().await;
    state.loading = false;
    match &outcome {
        SignUpOutcome::ConfirmationSent => state.notice = Some(CONFIRM_EMAIL_NOTICE.to_owned()),
        SignUpOutcome::AlreadyExists => {
            state.error = Some(ALREADY_EXISTS_MESSAGE.to_owned());
            state.block_redirect = true;
        }
        SignUpOutcome::Failed(message) => state.error = Some(message.clone()),
        SignUpOutcome::Busy => {}
    }
    outcome
}

async fn probe_then_sign_up(provider: &dyn IdentityProvider, credentials: &Credentials) -> SignUpOutcome {
    match provider.sign_in_with_password(credentials).await {
        Ok(_probe) => {
            // Never leave the probe's session behind.
            if let Err(e) = provider.sign_out().await {
                warn!(error = %e, "probe sign-out reported an error");
            }
            info!(email = %credentials.email, "sign-up rejected: account exists");
            return SignUpOutcome::AlreadyExists;
        }
        Err(e) if e.is_invalid_credentials() => {}
        Err(e) => {
            warn!(error = %e, "sign-up probe failed");
            return SignUpOutcome::Failed(user_message(&e));
        }
    }

    match provider.sign_up(credentials).await {
        Ok(()) => {
            info!(email = %credentials.email, "sign-up requested");
            SignUpOutcome::ConfirmationSent
        }
        Err(e) => {
            warn!(error = %e, "sign-up failed");
            SignUpOutcome::Failed(user_message(&e))
        }
    }
}

/// Run the sign-in flow for `credentials`.
pub async fn sign_in(provider: Arc<dyn IdentityProvider>, form: Arc<Mutex<FormState>>, credentials: Credentials) -> SignInOutcome {
    let flow = {
        let form = Arc::clone(&form);
        async move { run_sign_in(provider.as_ref(), &form, &credentials).await }
    };
    detached(&form, flow)
        .await
        .unwrap_or_else(|| SignInOutcome::Failed(GENERIC_FAILURE_MESSAGE.to_owned()))
}

async fn run_sign_in(provider: &dyn IdentityProvider, form: &Mutex<FormState>, credentials: &Credentials) -> SignInOutcome {
    if !begin(form).await {
        return SignInOutcome::Busy;
    }

    let result = provider.sign_in_with_password(credentials).await;

    let mut state = form.lock().await;
    state.loading = false;
    match result {
        Ok(session) => {
            info!(user_id = %session.user.id, "sign-in succeeded");
            SignInOutcome::SignedIn
        }
        Err(e) => {
            warn!(error = %e, "sign-in failed");
            let message = user_message(&e);
            state.error = Some(message.clone());
            SignInOutcome::Failed(message)
        }
    }
}

#[cfg(test)]
#[path = "flow_test.rs"]
mod tests;
