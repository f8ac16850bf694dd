//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the identity provider, the row store, the process-wide session
//! store, and per-page form state. The server acts for a single operator, so
//! there is one session and one copy of each form.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::crud::CrudPage;
use crate::flow::FormState;
use crate::provider::IdentityProvider;
use crate::rows::RowStore;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn IdentityProvider>,
    pub rows: Arc<dyn RowStore>,
    pub store: Arc<SessionStore>,
    pub sign_up_form: Arc<Mutex<FormState>>,
    pub sign_in_form: Arc<Mutex<FormState>>,
    pub crud: Arc<Mutex<CrudPage>>,
    /// How long a protected page waits for the session to resolve.
    pub gate_settle: Duration,
}

impl AppState {
    /// Build state and start the session store for `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, rows: Arc<dyn RowStore>, gate_settle: Duration) -> Self {
        let store = Arc::new(SessionStore::spawn(Arc::clone(&provider)));
        Self {
            provider,
            rows,
            store,
            sign_up_form: Arc::new(Mutex::new(FormState::default())),
            sign_in_form: Arc::new(Mutex::new(FormState::default())),
            crud: Arc::new(Mutex::new(CrudPage::default())),
            gate_settle,
        }
    }
}
