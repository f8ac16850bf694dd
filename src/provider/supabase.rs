//! Supabase auth (GoTrue) adapter.
//!
//! Thin HTTP wrapper over `/auth/v1`. Pure parsing lives in
//! `parse_session_response` / `parse_error_response` for testability.
//!
//! DESIGN
//! ======
//! The adapter caches the current session, mirrors it to an optional
//! [`SessionFile`], and announces every change on a broadcast channel. A
//! background task keeps the access token fresh.
//!
//! Every change to the cached session happens under its write lock, file
//! write and event included. A refresh result is only installed if the
//! session it was refreshed from is still current, so a sign-out that lands
//! while a refresh is in flight stays signed out.
//!
//! ERROR HANDLING
//! ==============
//! Sign-out always clears the local session, even when the remote revoke
//! fails; the remote error is still returned. Persistence failures are logged
//! and never fail an auth call.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::storage::SessionFile;
use super::{AuthError, Credentials, INVALID_CREDENTIALS_MESSAGE, IdentityProvider, Session, SessionEvent, User, unix_now};
use crate::config::SupabaseConfig;

const EVENT_CHANNEL_CAPACITY: usize = 32;

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseAuth {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
    storage: Option<SessionFile>,
    events: broadcast::Sender<SessionEvent>,
}

impl SupabaseAuth {
    pub fn new(config: &SupabaseConfig, storage: Option<SessionFile>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| AuthError::Network(e.to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            base_url: config.url.clone(),
            anon_key: config.anon_key.clone(),
            session: RwLock::new(None),
            storage,
            events,
        })
    }

    /// Load a persisted session into the cache. Emits nothing; the session
    /// store picks it up through `current_session`.
    pub async fn restore(&self) {
        let Some(storage) = &self.storage else { return };
        if let Some(session) = storage.load().await {
            info!(user_id = %session.user.id, "restored persisted session");
            *self.session.write().await = Some(session);
        }
    }

    /// Refresh the cached session if it expires within `margin_secs`.
    ///
    /// Returns `true` when a refresh happened. A rejected refresh token ends
    /// the session; network failures leave it for the next attempt.
    pub async fn refresh_if_expiring(&self, margin_secs: i64) -> bool {
        let Some(session) = self.session.read().await.clone() else { return false };
        if !session.expires_within(unix_now(), margin_secs) {
            return false;
        }
        match self.refresh_grant(&session.refresh_token).await {
            Ok(fresh) => {
                let expires_at = fresh.expires_at;
                let kept = self.replace_refreshed(&session.refresh_token, fresh).await;
                if kept {
                    debug!(user_id = %session.user.id, expires_at, "session refreshed");
                }
                kept
            }
            Err(AuthError::Network(e)) => {
                warn!(error = %e, "session refresh failed; will try again");
                false
            }
            Err(e) => {
                warn!(error = %e, "refresh token rejected; signing out");
                self.clear_if_current(&session.refresh_token).await;
                false
            }
        }
    }

    /// Spawn the background refresh task. Returns a handle for shutdown.
    pub fn spawn_auto_refresh(self: Arc<Self>, every: Duration, margin_secs: i64) -> JoinHandle<()> {
        info!(every_secs = every.as_secs(), margin_secs, "session auto-refresh configured");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.refresh_if_expiring(margin_secs).await;
            }
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value, bearer: Option<&str>) -> Result<String, AuthError> {
        let mut request = self
            .http
            .post(self.endpoint(path))
            .header("apikey", &self.anon_key)
            .json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(parse_error_response(status, &text));
        }
        Ok(text)
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let text = self.post_json("token?grant_type=refresh_token", &body, None).await?;
        parse_session_response(&text, unix_now())
    }

    async fn store(&self, session: Session, event: SessionEvent) {
        let mut current = self.session.write().await;
        self.persist(&session).await;
        *current = Some(session);
        self.announce(event);
    }

    /// Install a refreshed session unless the one it was refreshed from has
    /// been signed out or replaced meanwhile. Returns whether it was kept.
    async fn replace_refreshed(&self, refreshed_from: &str, fresh: Session) -> bool {
        let mut current = self.session.write().await;
        if !holds_refresh_token(current.as_ref(), refreshed_from) {
            debug!("session changed during refresh; discarding refreshed tokens");
            return false;
        }
        self.persist(&fresh).await;
        *current = Some(fresh.clone());
        self.announce(SessionEvent::TokenRefreshed(fresh));
        true
    }

    async fn clear(&self) {
        let mut current = self.session.write().await;
        self.forget().await;
        *current = None;
        self.announce(SessionEvent::SignedOut);
    }

    /// Like [`Self::clear`], but only while the session holding
    /// `refresh_token` is still the current one.
    async fn clear_if_current(&self, refresh_token: &str) {
        let mut current = self.session.write().await;
        if !holds_refresh_token(current.as_ref(), refresh_token) {
            return;
        }
        self.forget().await;
        *current = None;
        self.announce(SessionEvent::SignedOut);
    }

    async fn persist(&self, session: &Session) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save(session).await {
                warn!(error = %e, "failed to persist session");
            }
        }
    }

    async fn forget(&self) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.clear().await {
                warn!(error = %e, "failed to remove persisted session");
            }
        }
    }

    fn announce(&self, event: SessionEvent) {
        let name = event.name();
        // No subscribers is fine; the store may not be running yet.
        let receivers = self.events.send(event).unwrap_or(0);
        debug!(event = name, receivers, "session event");
    }
}

#[async_trait::async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let body = serde_json::json!({ "email": credentials.email, "password": credentials.password });
        let text = self.post_json("token?grant_type=password", &body, None).await?;
        let session = parse_session_response(&text, unix_now())?;
        info!(user_id = %session.user.id, "signed in");
        self.store(session.clone(), SessionEvent::SignedIn(session.clone())).await;
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let body = serde_json::json!({ "email": credentials.email, "password": credentials.password });
        let text = self.post_json("signup", &body, None).await?;
        if let Some(session) = parse_sign_up_response(&text, unix_now())? {
            info!(user_id = %session.user.id, "sign-up auto-confirmed");
            self.store(session.clone(), SessionEvent::SignedIn(session)).await;
        }
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let current = self.session.read().await.clone();
        let remote = match &current {
            Some(session) => match self
                .post_json("logout", &serde_json::json!({}), Some(&session.access_token))
                .await
            {
                // Already revoked or unknown on the server side.
                Err(AuthError::Provider { status: 401 | 403 | 404, .. }) => Ok(()),
                other => other.map(|_| ()),
            },
            None => Ok(()),
        };
        self.clear().await;
        if let Err(e) = &remote {
            warn!(error = %e, "remote sign-out failed; local session cleared");
        }
        remote
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.session.read().await.clone() else { return Ok(None) };
        if !session.is_expired_at(unix_now()) {
            return Ok(Some(session));
        }
        match self.refresh_grant(&session.refresh_token).await {
            Ok(fresh) => {
                if self.replace_refreshed(&session.refresh_token, fresh.clone()).await {
                    return Ok(Some(fresh));
                }
                Ok(self.session.read().await.clone())
            }
            Err(AuthError::Network(e)) => Err(AuthError::Network(e)),
            Err(e) => {
                warn!(error = %e, "expired session could not be refreshed");
                self.clear_if_current(&session.refresh_token).await;
                Ok(self.session.read().await.clone())
            }
        }
    }

    fn on_session_change(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// PARSING
// =============================================================================

#[derive(Debug, Deserialize)]
struct SessionResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl SessionResponse {
    fn into_session(self, now: i64) -> Result<Session, AuthError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(secs)) => now + secs,
            (None, None) => return Err(AuthError::Parse("session without expiry".into())),
        };
        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".into()),
            expires_at,
            user: self.user,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn holds_refresh_token(current: Option<&Session>, refresh_token: &str) -> bool {
    current.is_some_and(|s| s.refresh_token == refresh_token)
}

/// Parse a token-endpoint body into a session.
pub(crate) fn parse_session_response(body: &str, now: i64) -> Result<Session, AuthError> {
    let parsed: SessionResponse = serde_json::from_str(body).map_err(|e| AuthError::Parse(e.to_string()))?;
    parsed.into_session(now)
}

/// Parse a sign-up body. Returns a session only when the provider
/// auto-confirmed the account.
pub(crate) fn parse_sign_up_response(body: &str, now: i64) -> Result<Option<Session>, AuthError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| AuthError::Parse(e.to_string()))?;
    if value.get("access_token").is_none() {
        return Ok(None);
    }
    let parsed: SessionResponse = serde_json::from_value(value).map_err(|e| AuthError::Parse(e.to_string()))?;
    parsed.into_session(now).map(Some)
}

/// Map a non-success response to an [`AuthError`], keeping the provider's
/// message text.
pub(crate) fn parse_error_response(status: u16, body: &str) -> AuthError {
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let message = [parsed.msg, parsed.error_description, parsed.message, parsed.error]
        .into_iter()
        .flatten()
        .find(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let raw = body.trim();
            if raw.is_empty() { format!("auth request failed: {status}") } else { raw.to_owned() }
        });

    if parsed.error_code.as_deref() == Some("invalid_credentials") || message == INVALID_CREDENTIALS_MESSAGE {
        AuthError::InvalidCredentials(message)
    } else {
        AuthError::Provider { status, message }
    }
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
