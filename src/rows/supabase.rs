//! PostgREST adapter for [`RowStore`].

use std::time::Duration;

use super::{Row, RowFields, RowStore, RowsError};
use crate::config::SupabaseConfig;

pub struct SupabaseRows {
    http: reqwest::Client,
    table_url: String,
    anon_key: String,
}

impl SupabaseRows {
    pub fn new(config: &SupabaseConfig, table: &str) -> Result<Self, RowsError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| RowsError::Request(e.to_string()))?;
        Ok(Self { http, table_url: format!("{}/rest/v1/{table}", config.url), anon_key: config.anon_key.clone() })
    }

    fn request(&self, method: reqwest::Method, access_token: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, &self.table_url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }
}

async fn check(response: reqwest::Response) -> Result<String, RowsError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| RowsError::Request(e.to_string()))?;
    if !(200..300).contains(&status) {
        return Err(RowsError::Response { status, body });
    }
    Ok(body)
}

fn id_filter(id: i64) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

#[async_trait::async_trait]
impl RowStore for SupabaseRows {
    async fn list_rows(&self, access_token: &str, order_by: &str) -> Result<Vec<Row>, RowsError> {
        let response = self
            .request(reqwest::Method::GET, access_token)
            .query(&[("select", "*".to_owned()), ("order", format!("{order_by}.asc"))])
            .send()
            .await
            .map_err(|e| RowsError::Request(e.to_string()))?;
        let body = check(response).await?;
        serde_json::from_str(&body).map_err(|e| RowsError::Parse(e.to_string()))
    }

    async fn insert_row(&self, access_token: &str, fields: &RowFields) -> Result<(), RowsError> {
        let response = self
            .request(reqwest::Method::POST, access_token)
            .header("Prefer", "return=minimal")
            .json(&[fields])
            .send()
            .await
            .map_err(|e| RowsError::Request(e.to_string()))?;
        check(response).await.map(|_| ())
    }

    async fn update_row(&self, access_token: &str, id: i64, fields: &RowFields) -> Result<(), RowsError> {
        let response = self
            .request(reqwest::Method::PATCH, access_token)
            .query(&id_filter(id))
            .header("Prefer", "return=minimal")
            .json(fields)
            .send()
            .await
            .map_err(|e| RowsError::Request(e.to_string()))?;
        check(response).await.map(|_| ())
    }

    async fn delete_row(&self, access_token: &str, id: i64) -> Result<(), RowsError> {
        let response = self
            .request(reqwest::Method::DELETE, access_token)
            .query(&id_filter(id))
            .send()
            .await
            .map_err(|e| RowsError::Request(e.to_string()))?;
        check(response).await.map(|_| ())
    }
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
