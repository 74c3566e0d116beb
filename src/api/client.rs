//! HTTP client for the sandbox API
//!
//! Every request carries `Authorization: Bearer <token>`. No request timeout
//! is set: a turn can stream for several minutes.

use crate::core::config::ClientConfig;
use crate::core::error::{Result, SandboxError};
use crate::core::types::{StateId, UserId};
use crate::snapshot::document::Snapshot;
use crate::snapshot::nation::Nation;
use crate::turn::client::{ChunkSource, TurnTransport};
use crate::turn::request::TurnRequest;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// The signed-in account
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credits: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Async client for the sandbox endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| SandboxError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &ClientConfig, token: Option<String>) -> Result<Self> {
        Self::new(config.api_url.clone(), token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| SandboxError::Auth("not signed in".into()))?;
        Ok(builder.bearer_auth(token))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(builder)?
            .send()
            .await
            .map_err(|e| SandboxError::Transport(e.to_string()))?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        tracing::debug!("GET {}", path);
        let response = self.send(self.client.get(self.url(path)).query(query)).await?;
        response
            .json()
            .await
            .map_err(|e| SandboxError::Transport(e.to_string()))
    }

    pub async fn current_user(&self) -> Result<User> {
        self.get_json("/api/auth/me", &[]).await
    }

    /// The caller's own nations
    pub async fn nations(&self) -> Result<Vec<Nation>> {
        self.get_json("/api/states", &[]).await
    }

    pub async fn nation(&self, id: StateId) -> Result<Nation> {
        self.get_json(&format!("/api/states/{}", id), &[]).await
    }

    /// Full history of one nation, newest first
    pub async fn snapshots(&self, id: StateId) -> Result<Vec<Snapshot>> {
        self.get_json(&format!("/api/states/{}/snapshots", id), &[]).await
    }

    /// Every nation with its latest snapshot, reduced to `value_keys` when given
    pub async fn latest_snapshots(&self, value_keys: &[&str]) -> Result<Vec<Nation>> {
        let query: Vec<(&str, &str)> = value_keys.iter().map(|key| ("value_keys", *key)).collect();
        self.get_json("/api/states/latest-snapshots", &query).await
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = error_message(status, &text);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(SandboxError::Auth(message))
    } else {
        Err(SandboxError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// `detail` from a JSON error body, else the status reason
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.detail)
        .unwrap_or_else(|_| format!("API error: {}", status.canonical_reason().unwrap_or("unknown status")))
}

/// Streamed response body
#[derive(Debug)]
pub struct HttpChunks {
    response: Response,
}

impl ChunkSource for HttpChunks {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        self.response
            .chunk()
            .await
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .map_err(|e| SandboxError::Transport(e.to_string()))
    }
}

impl TurnTransport for ApiClient {
    type Stream = HttpChunks;

    async fn open(&self, request: &TurnRequest) -> Result<HttpChunks> {
        let builder = self
            .client
            .post(self.url(&request.path()))
            .header("Accept", "application/x-ndjson")
            .json(&request.body());
        let response = self.send(builder).await?;
        Ok(HttpChunks { response })
    }
}
