//! Ollama CLI subprocess client - runs `ollama run <model>` with the prompt on stdin

use crate::agent::{ModelClientConfig, ModelError, ModelInvoker};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Model invoker backed by the `ollama` command-line runner
#[derive(Debug, Clone)]
pub struct OllamaCliClient {
    /// Path to the ollama executable
    program: String,

    /// Timeout for a single invocation in seconds
    timeout_secs: u64,
}

impl OllamaCliClient {
    /// Create a new subprocess client
    ///
    /// # Arguments
    /// * `program` - Path to the ollama executable (e.g., "ollama", "/usr/local/bin/ollama")
    /// * `timeout_secs` - Timeout for a single invocation in seconds
    pub fn new(program: String, timeout_secs: u64) -> Self {
        Self {
            program,
            timeout_secs,
        }
    }

    /// Create a client from configuration, defaulting to `ollama` on PATH
    pub fn from_config(config: ModelClientConfig) -> Self {
        let program = config.program.unwrap_or_else(|| "ollama".to_string());
        Self::new(program, config.timeout_secs)
    }

    /// Get the executable path
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, model: &str, prompt: &str) -> Result<String, ModelError> {
        let mut child = Command::new(&self.program)
            .args(["run", model])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ModelError::Internal(format!("Failed to spawn {}: {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| ModelError::Internal(format!("Failed to write prompt: {}", e)))?;
            // Dropping stdin closes the pipe so the runner sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ModelError::Internal(format!("Failed to wait for {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(
                "{} exited with code {}: {}",
                self.program,
                exit_code,
                stderr.trim()
            );
            return Err(ModelError::Api(format!(
                "{} exited with code {}: {}",
                self.program,
                exit_code,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| ModelError::Internal(format!("Failed to decode model output: {}", e)))
    }
}

#[async_trait]
impl ModelInvoker for OllamaCliClient {
    /// Run the prompt through `ollama run <model>` and return trimmed stdout
    ///
    /// # Errors
    /// Returns `ModelError` if:
    /// - The executable cannot be spawned
    /// - It exits with a non-zero status
    /// - The output is not valid UTF-8
    /// - The invocation times out
    async fn invoke(&self, model: &str, prompt: &str) -> Result<String, ModelError> {
        debug!(
            "Invoking model {} with prompt length: {}",
            model,
            prompt.len()
        );

        let content = timeout(
            Duration::from_secs(self.timeout_secs),
            self.run(model, prompt),
        )
        .await
        .map_err(|_| ModelError::Timeout(self.timeout_secs))??;

        debug!("Model {} returned {} bytes of output", model, content.len());

        Ok(content.trim().to_string())
    }
}
