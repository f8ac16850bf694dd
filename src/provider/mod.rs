//! Identity provider contract.
//!
//! SYSTEM CONTEXT
//! ==============
//! Authentication is delegated to a hosted identity service. This module owns
//! the provider-neutral session model, the error taxonomy, and the trait the
//! session store and sign-up/sign-in flows are written against. The concrete
//! HTTP adapter lives in [`supabase`].
//!
//! DESIGN
//! ======
//! Session changes are pushed over a `tokio::sync::broadcast` channel. The
//! receiver returned by [`IdentityProvider::on_session_change`] is the
//! subscription handle: dropping it unsubscribes.

pub mod storage;
pub mod supabase;

#[cfg(test)]
pub mod test_helpers;

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Error message the hosted auth service uses for a wrong email/password pair.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid login credentials";

// =============================================================================
// SESSION MODEL
// =============================================================================

/// Identity derived from a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    /// Human-readable label for page headers.
    #[must_use]
    pub fn label(&self) -> String {
        self.email.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// Cached copy of a provider-owned session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expiry as unix seconds.
    pub expires_at: i64,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// True when the session expires within `margin_secs` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at - now <= margin_secs
    }
}

/// Current wall-clock time as unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Push notification emitted by the provider whenever its session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

impl SessionEvent {
    /// Session carried by the event, `None` for sign-out.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) | Self::TokenRefreshed(session) => Some(session),
            Self::SignedOut => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "signed_in",
            Self::TokenRefreshed(_) => "token_refreshed",
            Self::SignedOut => "signed_out",
        }
    }
}

/// Email/password pair submitted by a form.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by identity provider operations.
///
/// `Display` is the text shown to the user, so provider messages are
/// rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The provider rejected the email/password pair.
    #[error("{0}")]
    InvalidCredentials(String),

    /// The provider answered with any other error status.
    #[error("{message}")]
    Provider { status: u16, message: String },

    /// The request never produced a response.
    #[error("{0}")]
    Network(String),

    /// The response body could not be understood.
    #[error("unexpected auth response: {0}")]
    Parse(String),

    /// The local session file could not be written or removed.
    #[error("session storage failed: {0}")]
    Storage(String),
}

impl AuthError {
    #[must_use]
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, Self::InvalidCredentials(_))
    }
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// Operations consumed from the hosted identity service.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange credentials for a session. Emits [`SessionEvent::SignedIn`].
    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// Register a new account. No session exists until the email is confirmed,
    /// unless the provider auto-confirms.
    async fn sign_up(&self, credentials: &Credentials) -> Result<(), AuthError>;

    /// Drop the current session. Emits [`SessionEvent::SignedOut`].
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Resolve the current session, if any.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Subscribe to session changes. Dropping the receiver unsubscribes.
    fn on_session_change(&self) -> broadcast::Receiver<SessionEvent>;
}
