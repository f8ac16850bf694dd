//! In-memory row store for tests.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::{Row, RowFields, RowStore, RowsError};

#[derive(Default)]
pub struct MemoryRows {
    rows: Mutex<Vec<Row>>,
    next_id: Mutex<i64>,
    fail: Mutex<bool>,
    tokens: Mutex<Vec<String>>,
    hold_write: Mutex<Option<Arc<Notify>>>,
}

impl MemoryRows {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rows(rows: Vec<Row>) -> Self {
        let next = rows.iter().map(|r| r.id).max().unwrap_or(0);
        let store = Self::new();
        *store.rows.lock().unwrap() = rows;
        *store.next_id.lock().unwrap() = next;
        store
    }

    /// Make every following call fail.
    pub fn fail_all(&self) {
        *self.fail.lock().unwrap() = true;
    }

    #[must_use]
    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().unwrap().clone()
    }

    /// Access tokens seen so far, in call order.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    /// Make the next insert, update or delete wait until notified.
    pub fn hold_next_write(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold_write.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    async fn pause_write(&self) {
        let hold = self.hold_write.lock().unwrap().take();
        if let Some(notify) = hold {
            notify.notified().await;
        }
    }

    fn enter(&self, token: &str) -> Result<(), RowsError> {
        self.tokens.lock().unwrap().push(token.to_owned());
        if *self.fail.lock().unwrap() {
            return Err(RowsError::Response { status: 500, body: "boom".into() });
        }
        Ok(())
    }
}

#[must_use]
pub fn sample_row(id: i64, name: &str) -> Row {
    Row { id, created_at: "2026-01-01T00:00:00Z".into(), name: name.into(), comments: format!("about {name}"), cgpa: 3.5 }
}

#[async_trait::async_trait]
impl RowStore for MemoryRows {
    async fn list_rows(&self, access_token: &str, _order_by: &str) -> Result<Vec<Row>, RowsError> {
        self.enter(access_token)?;
        let mut rows = self.rows();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn insert_row(&self, access_token: &str, fields: &RowFields) -> Result<(), RowsError> {
        self.pause_write().await;
        self.enter(access_token)?;
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        self.rows.lock().unwrap().push(Row {
            id: *next,
            created_at: String::new(),
            name: fields.name.clone(),
            comments: fields.comments.clone(),
            cgpa: fields.cgpa,
        });
        Ok(())
    }

    async fn update_row(&self, access_token: &str, id: i64, fields: &RowFields) -> Result<(), RowsError> {
        self.pause_write().await;
        self.enter(access_token)?;
        if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|r| r.id == id) {
            row.name.clone_from(&fields.name);
            row.comments.clone_from(&fields.comments);
            row.cgpa = fields.cgpa;
        }
        Ok(())
    }

    async fn delete_row(&self, access_token: &str, id: i64) -> Result<(), RowsError> {
        self.pause_write().await;
        self.enter(access_token)?;
        self.rows.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }
}
