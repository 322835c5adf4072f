//! Generic REST/query client for the hosted platform (PostgREST
//! semantics). The client knows tables and filters, never CRM concepts;
//! the store layer in `store.rs` gives requests their meaning.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::PlatformError;

const REST_PATH: &str = "/rest/v1";

#[derive(Debug)]
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
}

impl PlatformClient {
    /// Build a client for the platform at `base_url` (without the
    /// `/rest/v1` suffix). The service key travels on every request as
    /// both `apikey` and bearer token.
    pub fn new(
        base_url: &str,
        service_key: &str,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(service_key)?;
        api_key.set_sensitive(true);
        headers.insert("apikey", api_key);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", service_key))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Start a request against one table.
    pub fn table(&self, name: &str) -> TableRequest<'_> {
        TableRequest {
            client: self,
            table: name.to_string(),
            params: Vec::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}{}/{}", self.base_url, REST_PATH, table)
    }
}

/// Builder for a single table request. Filters accumulate in call order as
/// PostgREST query params (`column=op.value`).
pub struct TableRequest<'a> {
    client: &'a PlatformClient,
    table: String,
    params: Vec<(String, String)>,
}

impl TableRequest<'_> {
    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn filter(mut self, column: &str, op: &str, value: impl ToString) -> Self {
        self.params
            .push((column.to_string(), format!("{}.{}", op, value.to_string())));
        self
    }

    pub fn order(mut self, expr: &str) -> Self {
        self.params.push(("order".to_string(), expr.to_string()));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.params.push(("limit".to_string(), n.to_string()));
        self
    }

    /// GET matching rows.
    pub async fn select<T: DeserializeOwned>(self) -> Result<Vec<T>, PlatformError> {
        let table = self.table.clone();
        let body = send(self.select_builder(), &table).await?;
        decode(&table, &body)
    }

    /// POST one row, returning the stored representation.
    pub async fn insert<T: DeserializeOwned>(
        self,
        row: &impl Serialize,
    ) -> Result<T, PlatformError> {
        let table = self.table.clone();
        let body = send(self.insert_builder(row), &table).await?;
        first_row(&table, &body)
    }

    /// POST one row with merge-duplicates resolution on `on_conflict`
    /// columns, returning the stored representation.
    pub async fn upsert<T: DeserializeOwned>(
        self,
        row: &impl Serialize,
        on_conflict: &str,
    ) -> Result<T, PlatformError> {
        let table = self.table.clone();
        let body = send(self.upsert_builder(row, on_conflict), &table).await?;
        first_row(&table, &body)
    }

    /// PATCH rows matching the accumulated filters, returning the updated
    /// representations.
    pub async fn update<T: DeserializeOwned>(
        self,
        patch: &impl Serialize,
    ) -> Result<Vec<T>, PlatformError> {
        let table = self.table.clone();
        let body = send(self.update_builder(patch), &table).await?;
        decode(&table, &body)
    }

    fn select_builder(self) -> reqwest::RequestBuilder {
        self.client
            .http
            .get(self.client.table_url(&self.table))
            .query(&self.params)
    }

    fn insert_builder(self, row: &impl Serialize) -> reqwest::RequestBuilder {
        self.client
            .http
            .post(self.client.table_url(&self.table))
            .query(&self.params)
            .header("Prefer", "return=representation")
            .json(row)
    }

    fn upsert_builder(mut self, row: &impl Serialize, on_conflict: &str) -> reqwest::RequestBuilder {
        self.params
            .push(("on_conflict".to_string(), on_conflict.to_string()));
        self.client
            .http
            .post(self.client.table_url(&self.table))
            .query(&self.params)
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .json(row)
    }

    fn update_builder(self, patch: &impl Serialize) -> reqwest::RequestBuilder {
        self.client
            .http
            .patch(self.client.table_url(&self.table))
            .query(&self.params)
            .header("Prefer", "return=representation")
            .json(patch)
    }
}

async fn send(builder: reqwest::RequestBuilder, table: &str) -> Result<String, PlatformError> {
    let resp = builder.send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(PlatformError::Api {
            table: table.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn decode<T: DeserializeOwned>(table: &str, body: &str) -> Result<Vec<T>, PlatformError> {
    serde_json::from_str(body).map_err(|source| PlatformError::Decode {
        table: table.to_string(),
        source,
    })
}

fn first_row<T: DeserializeOwned>(table: &str, body: &str) -> Result<T, PlatformError> {
    let mut rows: Vec<T> = decode(table, body)?;
    if rows.is_empty() {
        return Err(PlatformError::EmptyRepresentation {
            table: table.to_string(),
        });
    }
    Ok(rows.remove(0))
}
