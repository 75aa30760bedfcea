use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::api::{ActionReceipt, ApiError, Credentials, FindingsApi, Result};
use crate::core::{FindingDetail, FindingSummary};

const API_KEY_HEADER: &str = "x-api-key";
const MAX_ERROR_MESSAGE_CHARS: usize = 512;

pub fn user_agent() -> String {
    format!("soarcery/{}", env!("CARGO_PKG_VERSION"))
}

pub struct HttpFindingsApiBuilder {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpFindingsApiBuilder {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Base URL of the findings API, e.g. `https://abc.execute-api.us-east-1.amazonaws.com/prod`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpFindingsApi> {
        let endpoint = self
            .endpoint
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ApiError::Config("API endpoint is not set".to_string()))?;
        let api_key = self
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ApiError::Config("API key is not set".to_string()))?;

        let http = Client::builder()
            .user_agent(user_agent())
            .timeout(self.timeout)
            .build()?;

        info!(endpoint = %endpoint, timeout_secs = self.timeout.as_secs(), "findings API client initialized");

        Ok(HttpFindingsApi {
            inner: Arc::new(Inner {
                endpoint,
                api_key,
                http,
            }),
        })
    }
}

impl Default for HttpFindingsApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Inner {
    endpoint: String,
    api_key: String,
    http: Client,
}

/// `reqwest`-backed [`FindingsApi`]. Cheap to clone.
#[derive(Clone)]
pub struct HttpFindingsApi {
    inner: Arc<Inner>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

impl HttpFindingsApi {
    pub fn builder() -> HttpFindingsApiBuilder {
        HttpFindingsApiBuilder::new()
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    // Keys are object paths; they are appended as-is so their slashes survive.
    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            self.inner.endpoint.clone()
        } else {
            format!("{}/{}", self.inner.endpoint, path)
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        debug!(url = %url, "calling findings API");
        let response = request
            .header(API_KEY_HEADER, &self.inner.api_key)
            .send()
            .await
            .inspect_err(|err| warn!(url = %url, error = %err, "findings API request failed"))?;
        check_status(response, url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self.send(self.inner.http.get(&url), &url).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode {
            endpoint: url,
            source,
        })
    }

    async fn get_receipt(&self, path: &str) -> Result<ActionReceipt> {
        let url = self.url(path);
        let response = self.send(self.inner.http.get(&url), &url).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body).unwrap_or_default())
    }
}

async fn check_status(response: Response, url: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    warn!(url = %url, status, message = %message, "findings API returned an error status");
    Err(ApiError::Status { status, message })
}

fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|k| v.get(k).and_then(|m| m.as_str()).map(str::to_string))
        });
    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    if message.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        let cut: String = message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        format!("{cut}...")
    } else {
        message
    }
}

#[async_trait]
impl FindingsApi for HttpFindingsApi {
    async fn list_findings(&self) -> Result<Vec<FindingSummary>> {
        self.get_json("").await
    }

    async fn finding_detail(&self, key: &str) -> Result<FindingDetail> {
        self.get_json(&format!("findings/{key}")).await
    }

    async fn raw_finding(&self, key: &str) -> Result<serde_json::Value> {
        self.get_json(&format!("findings/{key}")).await
    }

    async fn approve(&self, key: &str) -> Result<ActionReceipt> {
        self.get_receipt(&format!("approve/{key}")).await
    }

    async fn reject(&self, key: &str) -> Result<ActionReceipt> {
        self.get_receipt(&format!("reject/{key}")).await
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<bool> {
        let url = self.url("auth");
        debug!(url = %url, username = %credentials.username, role = %credentials.role, "authenticating");
        let response = self
            .inner
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.inner.api_key)
            .json(credentials)
            .send()
            .await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            _ => check_status(response, &url).await.map(|_| true),
        }
    }

    async fn generate_report(&self, account_id: &str) -> Result<()> {
        let url = self.url(&format!("generate/{account_id}"));
        self.send(self.inner.http.get(&url), &url).await?;
        Ok(())
    }

    async fn reset_password(
        &self,
        account_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let url = self.url(&format!("reset/{account_id}"));
        let body = PasswordChange {
            current_password,
            new_password,
        };
        self.send(self.inner.http.post(&url).json(&body), &url)
            .await?;
        Ok(())
    }
}
