// PocketBase store backend
// API Documentation: https://pocketbase.io/docs/api-records/

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::{MediaStore, StoreError};
use crate::models::{Collection, Record};

const SUPERUSERS_COLLECTION: &str = "_superusers";
const DEFAULT_PAGE_SIZE: usize = 500;

/// Superuser login used by the scanner
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// PocketBase REST client
pub struct PocketBaseClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    token: RwLock<Option<String>>,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    items: Vec<Record>,
}

impl PocketBaseClient {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            token: RwLock::new(None),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[cfg(test)]
    fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Authenticate as a superuser and keep the token for later requests
    pub async fn authenticate(&self) -> Result<(), StoreError> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            StoreError::Unauthorized("no superuser credentials configured".to_string())
        })?;

        let url = format!(
            "{}/api/collections/{}/auth-with-password",
            self.base_url, SUPERUSERS_COLLECTION
        );

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "identity": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Unauthorized(format!(
                "superuser login failed ({}): {}",
                status, body
            )));
        }

        let auth: AuthResponse = response.json().await?;
        *self.token.write().await = Some(auth.token);
        Ok(())
    }

    fn records_url(&self, collection: Collection) -> String {
        format!(
            "{}/api/collections/{}/records",
            self.base_url,
            collection.name()
        )
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, token),
            None => request,
        }
    }

    /// Send a request, logging in again once if the token was rejected
    async fn send<F>(&self, build: F) -> Result<Response, StoreError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.authorized(build(&self.client)).await.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.credentials.is_some() {
            tracing::info!("PocketBase token expired or rejected. Re-authenticating...");
            self.authenticate().await?;
            let retried = self.authorized(build(&self.client)).await.send().await?;
            return check_status(retried).await;
        }

        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Err(StoreError::NotFound),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::Unauthorized(body)),
        _ => Err(StoreError::Status {
            status: status.as_u16(),
            body,
        }),
    }
}

/// Build an exact-match filter expression, escaping the string literal
fn exact_match_filter(field: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{}=\"{}\"", field, escaped)
}

fn fields_param(fields: &[&str]) -> Option<String> {
    if fields.is_empty() {
        return None;
    }
    let mut all = vec!["id"];
    all.extend(fields.iter().copied().filter(|f| *f != "id"));
    Some(all.join(","))
}

#[async_trait]
impl MediaStore for PocketBaseClient {
    async fn list_all(
        &self,
        collection: Collection,
        fields: &[&str],
    ) -> Result<Vec<Record>, StoreError> {
        let fields = fields_param(fields);
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let mut url = format!(
                "{}?page={}&perPage={}&skipTotal=1",
                self.records_url(collection),
                page,
                self.page_size
            );
            if let Some(ref fields) = fields {
                url.push_str(&format!("&fields={}", urlencoding::encode(fields)));
            }

            let list: ListResponse = self.send(|c| c.get(&url)).await?.json().await?;
            let count = list.items.len();
            records.extend(list.items);

            if count < self.page_size {
                break;
            }
            page += 1;
        }

        Ok(records)
    }

    async fn find_first(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, StoreError> {
        let url = format!(
            "{}?page=1&perPage=1&skipTotal=1&filter={}",
            self.records_url(collection),
            urlencoding::encode(&exact_match_filter(field, value))
        );

        let list: ListResponse = self.send(|c| c.get(&url)).await?.json().await?;
        Ok(list.items.into_iter().next())
    }

    async fn create(&self, collection: Collection, payload: Value) -> Result<Record, StoreError> {
        let url = self.records_url(collection);
        let record = self
            .send(|c| c.post(&url).json(&payload))
            .await?
            .json()
            .await?;
        Ok(record)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        payload: Value,
    ) -> Result<Record, StoreError> {
        let url = format!(
            "{}/{}",
            self.records_url(collection),
            urlencoding::encode(id)
        );
        let record = self
            .send(|c| c.patch(&url).json(&payload))
            .await?
            .json()
            .await?;
        Ok(record)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let url = format!(
            "{}/{}",
            self.records_url(collection),
            urlencoding::encode(id)
        );
        self.send(|c| c.delete(&url)).await?;
        Ok(())
    }
}
