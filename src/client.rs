use std::time::Duration;

use futures::Stream;
use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::api::{ChatRequest, ChatResponse, GenerateRequest, GenerateResponse, Message, TagsResponse};
use crate::error::TransportError;
use crate::stream::decode_fragments;

pub const OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434";

const TAGS_TIMEOUT: Duration = Duration::from_secs(15);
const GENERATION_TIMEOUT: Duration = Duration::from_secs(300); // Long timeout for generation

/// Thin client over the Ollama HTTP API.
#[derive(Clone, Debug)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(OLLAMA_BASE_URL)
    }
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Names of the installed models.
    ///
    /// Never fails: an unreachable server, an error status or an unexpected
    /// body all come back as an empty list.
    pub async fn list_models(&self) -> Vec<String> {
        match self.fetch_tags().await {
            Ok(models) => {
                debug!(count = models.len(), "fetched model list");
                models
            }
            Err(err) => {
                warn!(error = %err, "listing models failed");
                Vec::new()
            }
        }
    }

    async fn fetch_tags(&self) -> Result<Vec<String>, TransportError> {
        let response = self
            .http
            .get(self.url("tags"))
            .timeout(TAGS_TIMEOUT)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let tags: TagsResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Sends the whole conversation and waits for the complete reply.
    pub async fn chat(&self, messages: &[Message], model: &str) -> Result<String, TransportError> {
        let request = ChatRequest {
            model,
            messages,
            stream: false,
        };
        let response = self.post("chat", &request).await?;
        let body: ChatResponse = serde_json::from_slice(&response.bytes().await?)?;
        body.into_content()
            .ok_or(TransportError::MissingField("message.content"))
    }

    /// Sends the whole conversation and yields the reply as it is generated.
    ///
    /// Connection and status failures are reported before any fragment.
    /// Lines of the body that fail to parse are skipped.
    pub async fn stream_chat(
        &self,
        messages: &[Message],
        model: &str,
    ) -> Result<impl Stream<Item = Result<String, TransportError>>, TransportError> {
        let request = ChatRequest {
            model,
            messages,
            stream: true,
        };
        let response = self.post("chat", &request).await?;
        Ok(decode_fragments(response.bytes_stream()))
    }

    /// Single-shot completion of a bare prompt through `/api/generate`.
    pub async fn generate(&self, prompt: &str, model: &str) -> Result<String, TransportError> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let response = self.post("generate", &request).await?;
        let body: GenerateResponse = serde_json::from_slice(&response.bytes().await?)?;
        body.response.ok_or(TransportError::MissingField("response"))
    }

    async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<Response, TransportError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .timeout(GENERATION_TIMEOUT)
            .send()
            .await?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    Err(TransportError::Status { status, body })
}
