//! Model invocation: the invoker seam, its failure policy, and the Ollama clients

pub mod client;
pub mod ollama_client;
pub mod response;
pub mod subprocess_client;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub use client::ModelClientConfig;
pub use ollama_client::OllamaClient;
pub use response::ModelError;
pub use subprocess_client::OllamaCliClient;

/// Text stored in place of a model response when invocation fails under
/// [`ModelFailurePolicy::Degrade`]
pub const MODEL_FAILURE_SENTINEL: &str = "Error: Could not get response from LLM.";

/// Trait for model invocation - allows for different implementations
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Send a prompt to the named model and return its text response
    async fn invoke(&self, model: &str, prompt: &str) -> Result<String, ModelError>;
}

/// What to do when a model invocation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelFailurePolicy {
    /// Substitute [`MODEL_FAILURE_SENTINEL`] and keep running
    #[default]
    Degrade,
    /// Abort the run with a model error
    Abort,
}

/// Model invoker wrapped with a failure policy
#[derive(Clone)]
pub struct ModelGateway {
    invoker: Arc<dyn ModelInvoker>,
    policy: ModelFailurePolicy,
}

impl ModelGateway {
    pub fn new(invoker: Arc<dyn ModelInvoker>, policy: ModelFailurePolicy) -> Self {
        Self { invoker, policy }
    }

    pub fn policy(&self) -> ModelFailurePolicy {
        self.policy
    }

    /// Invoke the model, applying the failure policy
    ///
    /// Under `Degrade` this never fails; the sentinel text is returned instead.
    pub async fn complete(&self, model: &str, prompt: &str) -> Result<String, ModelError> {
        match self.invoker.invoke(model, prompt).await {
            Ok(text) => Ok(text),
            Err(e) => match self.policy {
                ModelFailurePolicy::Abort => Err(e),
                ModelFailurePolicy::Degrade => {
                    warn!("Model {} failed, continuing with sentinel: {}", model, e);
                    Ok(MODEL_FAILURE_SENTINEL.to_string())
                }
            },
        }
    }
}

impl std::fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGateway")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
