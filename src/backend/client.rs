use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

use super::{BackendError, SearchMode};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Incrementally delivered response body - boxed for storability
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BackendError>> + Send>>;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    session_id: String,
    search_mode: SearchMode,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the local sidecar HTTP API.
///
/// Cheap to clone; the inner `reqwest::Client` is an Arc.
#[derive(Debug, Clone)]
pub struct SidecarClient {
    base_url: String,
    http: Client,
}

impl SidecarClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Client for a sidecar on a local port (the port is discovered at
    /// runtime by whatever spawned the sidecar).
    pub fn for_port(port: u16) -> Self {
        Self::new(format!("http://127.0.0.1:{port}"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe `GET /health`. Errors if the backend is unreachable or reports
    /// itself as anything other than healthy.
    pub async fn health(&self) -> Result<(), BackendError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let health: HealthResponse = response.json().await?;
        if health.status == "healthy" {
            Ok(())
        } else {
            Err(BackendError::Unhealthy(
                health.error.unwrap_or(health.status),
            ))
        }
    }

    /// `POST /chat/stream`: returns the response body as a byte stream once
    /// the status line has been checked. Chunk boundaries are arbitrary.
    pub async fn stream_chat(
        &self,
        message: &str,
        session_id: SessionId,
        search_mode: SearchMode,
    ) -> Result<ByteStream, BackendError> {
        let body = ChatRequest {
            message,
            session_id: session_id.to_string(),
            search_mode,
        };

        let response = self
            .http
            .post(format!("{}/chat/stream", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::pin(
            response.bytes_stream().map(|r| r.map_err(BackendError::from)),
        ))
    }

    /// `POST /chat`: one-shot completion without streaming.
    pub async fn complete(
        &self,
        message: &str,
        session_id: SessionId,
        search_mode: SearchMode,
    ) -> Result<String, BackendError> {
        let body = ChatRequest {
            message,
            session_id: session_id.to_string(),
            search_mode,
        };

        let response = self
            .http
            .post(format!("{}/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        Ok(chat.response)
    }

    /// `POST /chat/clear?session_id=<id>`: drop server-side conversation
    /// memory for one session. Callers treat failures as best-effort.
    pub async fn clear(&self, session_id: SessionId) -> Result<(), BackendError> {
        let response = self
            .http
            .post(format!("{}/chat/clear", self.base_url))
            .query(&[("session_id", session_id.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
