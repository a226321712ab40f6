//! HTTP client for the tutor backend

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::requests::{AnalyzeImageRequest, AnalyzeRequest, ChatRequest};
use crate::config::{endpoints, TutorConfig};
use crate::error::ApiError;
use crate::stream::ByteStream;

/// Response of the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Client that opens analysis streams against the backend
#[derive(Debug, Clone)]
pub struct TutorClient {
    http: reqwest::Client,
    config: TutorConfig,
}

impl TutorClient {
    pub fn new(config: TutorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .read_timeout(config.read_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TutorConfig {
        &self.config
    }

    /// Stream the analysis of a text passage
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<ByteStream> {
        info!(
            "Analyzing {} chars at level {}",
            request.text.chars().count(),
            request.level.get()
        );
        self.open_stream(endpoints::ANALYZE, request).await
    }

    /// Stream the analysis of the text found in an image
    pub async fn analyze_image(&self, request: &AnalyzeImageRequest) -> Result<ByteStream> {
        info!(
            "Analyzing {} image at level {}",
            request.mime_type,
            request.level.get()
        );
        self.open_stream(endpoints::ANALYZE_IMAGE, request).await
    }

    /// Stream the answer to a follow-up question within a session
    pub async fn chat(&self, request: &ChatRequest) -> Result<ByteStream> {
        info!("Chat question for session {}", request.session_id);
        self.open_stream(endpoints::CHAT, request).await
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.config.endpoint(endpoints::HEALTH);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;
        let response = handle_error_response(response).await?;
        Ok(response.json().await?)
    }

    async fn open_stream<T: Serialize>(&self, path: &str, body: &T) -> Result<ByteStream> {
        let url = self.config.endpoint(path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;
        let response = handle_error_response(response).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(anyhow::Error::from))
            .boxed())
    }
}

/// Turn a non-success response into `ApiError::Status`
async fn handle_error_response(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let (message, code) = parse_error_body(&body);
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
        code,
    })
}

/// Message and code from an error body
///
/// Accepts `{"message"}`, FastAPI's `{"detail"}` (string or validation list)
/// and `{"error"}`; anything else becomes "Unknown error".
fn parse_error_body(body: &str) -> (String, Option<String>) {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return ("Unknown error".to_string(), None);
    };

    let message = ["message", "detail", "error"]
        .iter()
        .find_map(|key| match json.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => items
                .first()
                .and_then(|item| item.get("msg"))
                .and_then(|m| m.as_str())
                .map(str::to_string),
            _ => None,
        })
        .unwrap_or_else(|| "Unknown error".to_string());
    let code = json
        .get("code")
        .and_then(|c| c.as_str())
        .map(str::to_string);

    (message, code)
}
