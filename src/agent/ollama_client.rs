//! Ollama HTTP client - chat requests through `ollama-rs` with a pinned temperature

use crate::agent::{ModelClientConfig, ModelError, ModelInvoker};
use async_trait::async_trait;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::models::ModelOptions;
use ollama_rs::Ollama;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Model invoker backed by a running Ollama server
#[derive(Clone)]
pub struct OllamaClient {
    ollama: Ollama,
    temperature: f32,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a client for the server at `host:port`
    pub fn new(host: String, port: u16, temperature: f32, timeout_secs: u64) -> Self {
        Self {
            ollama: Ollama::new(host, port),
            temperature,
            timeout_secs,
        }
    }

    pub fn from_config(config: ModelClientConfig) -> Self {
        Self::new(
            config.host,
            config.port,
            config.temperature,
            config.timeout_secs,
        )
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Single-turn chat request carrying the client's sampling options
    pub fn chat_request(&self, model: &str, prompt: &str) -> ChatMessageRequest {
        ChatMessageRequest::new(model.to_owned(), vec![ChatMessage::user(prompt.to_owned())])
            .options(ModelOptions::default().temperature(self.temperature))
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ModelInvoker for OllamaClient {
    /// Send the prompt as one user message and return the trimmed reply
    ///
    /// # Errors
    /// Returns `ModelError` if the request fails or times out
    async fn invoke(&self, model: &str, prompt: &str) -> Result<String, ModelError> {
        debug!(
            "Requesting chat from {} with prompt length: {}",
            model,
            prompt.len()
        );

        let request = self.chat_request(model, prompt);
        let response = timeout(
            Duration::from_secs(self.timeout_secs),
            self.ollama.send_chat_messages(request),
        )
        .await
        .map_err(|_| ModelError::Timeout(self.timeout_secs))?
        .map_err(|e| {
            warn!("Ollama request for {} failed: {}", model, e);
            ModelError::Api(format!("Ollama request failed: {}", e))
        })?;

        Ok(response.message.content.trim().to_string())
    }
}
