//! Chat completion client
//!
//! Minimal async client for OpenAI-compatible servers, used by
//! `proxai chat` to send one request through the proxy and print the reply.

use crate::models::openai::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Error types that can occur during chat completion calls
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Response contained no message content")]
    EmptyChoices,
}

/// Pull the human-readable message out of an error body
///
/// OpenAI errors look like `{"error": {"message": "..."}}`; anything else is
/// returned as-is.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Chat completion client
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ChatClient {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `base_url` - API base URL, e.g. `http://localhost:8080/v1`
    /// * `api_key` - Optional bearer token
    /// * `timeout` - Request timeout in seconds
    pub fn new(base_url: &str, api_key: Option<String>, timeout: u64) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a chat completion request
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` for non-success statuses and
    /// `ClientError::Decode` when the body is not a chat completion.
    pub async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("POST {} model={}", url, request.model);

        let mut req_builder = self.client.post(&url).json(request);
        if let Some(ref key) = self.api_key {
            req_builder = req_builder.bearer_auth(key);
        }

        let response = req_builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Send a single user message and return the first choice's content
    pub async fn complete(&self, prompt: &str, model: &str) -> Result<String, ClientError> {
        let request = ChatCompletionRequest::new(model, vec![ChatMessage::user(prompt)]);
        let response = self.create_chat_completion(&request).await?;
        response
            .first_content()
            .map(str::to_string)
            .ok_or(ClientError::EmptyChoices)
    }
}
