//! CLI command definitions

use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline definition (JSON or YAML)
    #[arg(short, long)]
    pub file: String,

    /// Fail on unresolved inputs instead of prompting for them
    #[arg(long)]
    pub strict: bool,

    /// Initial input overrides (key=value), merged into an object initial input
    #[arg(long, value_parser = parse_key_value)]
    pub input: Vec<(String, String)>,

    /// Abort after this many executed agents
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Per-agent timeout in seconds
    #[arg(long)]
    pub step_timeout: Option<u64>,

    /// Abort the run when a model call fails instead of continuing with an error text
    #[arg(long)]
    pub abort_on_model_error: bool,

    /// Run models through this ollama executable instead of the HTTP API
    #[arg(long)]
    pub model_program: Option<String>,

    /// Ollama server host
    #[arg(long, default_value = "http://localhost")]
    pub ollama_host: String,

    /// Ollama server port
    #[arg(long, default_value_t = 11434)]
    pub ollama_port: u16,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline definition (JSON or YAML)
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
