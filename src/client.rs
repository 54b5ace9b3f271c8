//! HTTP client for the assistant backend's chat endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::briefing::{BriefingRequest, BriefingScript, BriefingSource};
use crate::config::{ChatConfig, LiebeConfig, ServerConfig};
use crate::error::{LiebeError, Result};
use crate::session::{ChatMessage, Exchange};
use crate::stream::{StreamEventStream, decode_byte_stream};

/// Body of `POST /api/chat`.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    history: &'a [ChatMessage],
    search_enabled: bool,
    deep_thinking_enabled: bool,
}

/// Chat API client.
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    search_enabled: bool,
    deep_thinking_enabled: bool,
}

impl ChatClient {
    /// Create a client for `server` using the chat flags in `chat`.
    pub fn new(server: &ServerConfig, chat: &ChatConfig) -> Self {
        Self {
            base_url: server.base_url.trim_end_matches('/').to_owned(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(server.request_timeout_secs),
            search_enabled: chat.search_enabled,
            deep_thinking_enabled: chat.deep_thinking_enabled,
        }
    }

    /// Create a client from the full configuration.
    pub fn from_config(config: &LiebeConfig) -> Self {
        Self::new(&config.server, &config.chat)
    }

    /// Toggle web-search grounding for later requests.
    pub fn set_search_enabled(&mut self, enabled: bool) {
        self.search_enabled = enabled;
    }

    /// Toggle deep thinking for later requests.
    pub fn set_deep_thinking_enabled(&mut self, enabled: bool) {
        self.deep_thinking_enabled = enabled;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request whose whole response is bounded by the timeout.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.timeout(self.timeout).send().await?;
        Self::check_status(response).await
    }

    /// Send a request whose body may stream for as long as it likes. Only
    /// the wait for the response headers is bounded.
    async fn send_streaming(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| {
                LiebeError::Transport(format!("no response within {}s", self.timeout.as_secs()))
            })??;
        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(status, &body));
        }
        Ok(response)
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LiebeError {
        let detail = body.trim();
        if detail.is_empty() {
            LiebeError::Transport(format!("HTTP {}", status.as_u16()))
        } else {
            LiebeError::Transport(format!("HTTP {}: {detail}", status.as_u16()))
        }
    }

    /// Post an exchange and return its decoded event stream.
    ///
    /// The request carries the history as it stood before the user's
    /// message. The response headers must arrive within the configured
    /// timeout; the body itself is not time-limited. Once the response
    /// starts, every failure arrives as a terminal `Error` event on the
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns [`LiebeError::Transport`] if the request cannot be sent or
    /// the backend rejects it.
    pub async fn send_exchange(&self, exchange: &Exchange) -> Result<StreamEventStream> {
        let body = ChatRequest {
            message: &exchange.message,
            history: &exchange.prior_history,
            search_enabled: self.search_enabled,
            deep_thinking_enabled: self.deep_thinking_enabled,
        };
        debug!(exchange = %exchange.id, history = body.history.len(), "posting chat request");

        let response = self
            .send_streaming(self.client.post(self.url("/api/chat")).json(&body))
            .await?;
        Ok(Box::pin(decode_byte_stream(response.bytes_stream())))
    }

    /// Fetch the backend's stored conversation.
    ///
    /// # Errors
    ///
    /// Returns [`LiebeError::Transport`] on request failure or an
    /// unreadable body.
    pub async fn fetch_history(&self) -> Result<Vec<ChatMessage>> {
        self.send(self.client.get(self.url("/api/chat/history")))
            .await?
            .json::<Vec<ChatMessage>>()
            .await
            .map_err(|e| LiebeError::Transport(format!("invalid history body: {e}")))
    }

    /// Delete the backend's stored conversation.
    ///
    /// # Errors
    ///
    /// Returns [`LiebeError::Transport`] on request failure.
    pub async fn clear_history(&self) -> Result<()> {
        self.send(self.client.delete(self.url("/api/chat/history")))
            .await
            .map(|_| ())
    }

    /// Ask the backend to compose a morning briefing.
    ///
    /// # Errors
    ///
    /// Returns [`LiebeError::Transport`] on request failure or an
    /// unreadable body.
    pub async fn fetch_briefing(&self, request: &BriefingRequest) -> Result<BriefingScript> {
        self.send(
            self.client
                .post(self.url("/api/morning_briefing"))
                .json(request),
        )
        .await?
        .json::<BriefingScript>()
        .await
        .map_err(|e| LiebeError::Transport(format!("invalid briefing body: {e}")))
    }
}

#[async_trait]
impl BriefingSource for ChatClient {
    async fn fetch(&self, request: &BriefingRequest) -> Result<BriefingScript> {
        self.fetch_briefing(request).await
    }
}
