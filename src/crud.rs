//! CRUD page state: cached rows, the add/edit form, and the row operations
//! behind its buttons.
//!
//! ERROR HANDLING
//! ==============
//! Database failures are logged and otherwise ignored: the cached list just
//! keeps its previous contents. Incomplete form input is dropped silently.
//!
//! Saves and deletes run on their own task, so a dropped request cannot leave
//! the page stuck in `loading`.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::rows::{ORDER_COLUMN, Row, RowFields, RowStore};

/// Add/edit form contents, kept as typed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrudForm {
    /// Row being edited; `None` means the form adds a new row.
    pub editing: Option<i64>,
    pub name: String,
    pub comments: String,
    pub cgpa: String,
}

/// Submitted form fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrudInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub cgpa: String,
}

impl CrudForm {
    pub fn start_edit(&mut self, row: &Row) {
        self.editing = Some(row.id);
        self.name.clone_from(&row.name);
        self.comments.clone_from(&row.comments);
        self.cgpa = row.cgpa.to_string();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn fill(&mut self, input: &CrudInput) {
        self.name.clone_from(&input.name);
        self.comments.clone_from(&input.comments);
        self.cgpa = input.cgpa.trim().to_owned();
    }

    /// Writable fields, or `None` if anything is missing. A zero or
    /// unparseable CGPA counts as missing.
    #[must_use]
    pub fn fields(&self) -> Option<RowFields> {
        if self.name.is_empty() || self.comments.is_empty() {
            return None;
        }
        let cgpa = self.cgpa.parse::<f64>().ok().filter(|v| v.is_finite() && *v != 0.0)?;
        Some(RowFields { name: self.name.clone(), comments: self.comments.clone(), cgpa })
    }
}

#[derive(Debug, Default)]
pub struct CrudPage {
    pub rows: Vec<Row>,
    pub form: CrudForm,
    /// A save or delete is in flight.
    pub loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated(i64),
    Incomplete,
    Busy,
    /// The write task died before reporting back.
    Aborted,
}

/// Refetch the list. On failure the cached rows stay as they were.
pub async fn refresh(store: &dyn RowStore, page: &Mutex<CrudPage>, access_token: &str) {
    match store.list_rows(access_token, ORDER_COLUMN).await {
        Ok(rows) => page.lock().await.rows = rows,
        Err(e) => error!(error = %e, "row list fetch failed"),
    }
}

/// Run a page write on its own task and wait for it. If the task dies the
/// loading flag is cleared here instead.
async fn detached<T>(page: &Mutex<CrudPage>, write: impl Future<Output = T> + Send + 'static) -> Option<T>
where
    T: Send + 'static,
{
    match tokio::spawn(write).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!(error = %e, "row write task failed");
            page.lock().await.loading = false;
            None
        }
    }
}

/// Insert, or update the row being edited, then reset the form and refetch.
pub async fn save(store: Arc<dyn RowStore>, page: Arc<Mutex<CrudPage>>, access_token: String, input: CrudInput) -> SaveOutcome {
    let write = {
        let page = Arc::clone(&page);
        async move { run_save(store.as_ref(), &page, &access_token, &input).await }
    };
    detached(&page, write).await.unwrap_or(SaveOutcome::Aborted)
}

async fn run_save(store: &dyn RowStore, page: &Mutex<CrudPage>, access_token: &str, input: &CrudInput) -> SaveOutcome {
    let (editing, fields) = {
        let mut state = page.lock().await;
        if state.loading {
            return SaveOutcome::Busy;
        }
        state.form.fill(input);
        let Some(fields) = state.form.fields() else { return SaveOutcome::Incomplete };
        state.loading = true;
        (state.form.editing, fields)
    };

    let outcome = match editing {
        Some(id) => {
            match store.update_row(access_token, id, &fields).await {
                Ok(()) => info!(id, "row updated"),
                Err(e) => error!(error = %e, id, "row update failed"),
            }
            SaveOutcome::Updated(id)
        }
        None => {
            match store.insert_row(access_token, &fields).await {
                Ok(()) => info!("row inserted"),
                Err(e) => error!(error = %e, "row insert failed"),
            }
            SaveOutcome::Inserted
        }
    };

    {
        let mut state = page.lock().await;
        state.loading = false;
        state.form.reset();
    }
    refresh(store, page, access_token).await;
    outcome
}

/// Delete a row and refetch. Returns `false` if another change is in flight.
pub async fn delete(store: Arc<dyn RowStore>, page: Arc<Mutex<CrudPage>>, access_token: String, id: i64) -> bool {
    let write = {
        let page = Arc::clone(&page);
        async move { run_delete(store.as_ref(), &page, &access_token, id).await }
    };
    detached(&page, write).await.unwrap_or(false)
}

async fn run_delete(store: &dyn RowStore, page: &Mutex<CrudPage>, access_token: &str, id: i64) -> bool {
    {
        let mut state = page.lock().await;
        if state.loading {
            return false;
        }
        state.loading = true;
    }

    match store.delete_row(access_token, id).await {
        Ok(()) => info!(id, "row deleted"),
        Err(e) => error!(error = %e, id, "row delete failed"),
    }

    page.lock().await.loading = false;
    refresh(store, page, access_token).await;
    true
}

/// Load a cached row into the form. Returns `false` if the row is unknown.
pub async fn start_edit(page: &Mutex<CrudPage>, id: i64) -> bool {
    let mut state = page.lock().await;
    let Some(row) = state.rows.iter().find(|r| r.id == id).cloned() else { return false };
    state.form.start_edit(&row);
    true
}

pub async fn cancel_edit(page: &Mutex<CrudPage>) {
    page.lock().await.form.reset();
}

#[cfg(test)]
#[path = "crud_test.rs"]
mod tests;
