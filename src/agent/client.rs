//! Model client configuration

/// Configuration for the model client
#[derive(Debug, Clone)]
pub struct ModelClientConfig {
    /// Path to the model runner executable
    ///
    /// If not provided, defaults to "ollama" (assumes it's on PATH).
    pub program: Option<String>,

    /// Timeout for a single invocation in seconds
    pub timeout_secs: u64,

    /// Ollama server host for the HTTP client
    pub host: String,

    /// Ollama server port for the HTTP client
    pub port: u16,

    /// Sampling temperature sent with every HTTP request
    pub temperature: f32,
}

impl Default for ModelClientConfig {
    fn default() -> Self {
        Self {
            program: None,
            timeout_secs: 600,
            host: "http://localhost".to_string(),
            port: 11434,
            temperature: 0.0,
        }
    }
}

impl ModelClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}
