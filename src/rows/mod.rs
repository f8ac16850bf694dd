//! Table rows stored in the hosted database.
//!
//! SYSTEM CONTEXT
//! ==============
//! The CRUD page reads and writes one table through [`RowStore`]. Every call
//! carries the signed-in user's access token so row-level security applies.

pub mod supabase;

#[cfg(test)]
pub mod test_helpers;

use serde::{Deserialize, Serialize};

/// Column the list is ordered by.
pub const ORDER_COLUMN: &str = "id";

/// One row of the CRUD table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: i64,
    #[serde(default)]
    pub created_at: String,
    pub name: String,
    pub comments: String,
    pub cgpa: f64,
}

/// Writable columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFields {
    pub name: String,
    pub comments: String,
    pub cgpa: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum RowsError {
    #[error("rows request failed: {0}")]
    Request(String),
    #[error("rows response error: status {status}: {body}")]
    Response { status: u16, body: String },
    #[error("rows response parse failed: {0}")]
    Parse(String),
}

#[async_trait::async_trait]
pub trait RowStore: Send + Sync {
    async fn list_rows(&self, access_token: &str, order_by: &str) -> Result<Vec<Row>, RowsError>;

    async fn insert_row(&self, access_token: &str, fields: &RowFields) -> Result<(), RowsError>;

    async fn update_row(&self, access_token: &str, id: i64, fields: &RowFields) -> Result<(), RowsError>;

    async fn delete_row(&self, access_token: &str, id: i64) -> Result<(), RowsError>;
}
