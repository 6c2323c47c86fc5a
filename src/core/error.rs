//! Runtime error taxonomy

use crate::agent::ModelError;
use std::time::Duration;
use thiserror::Error;

/// Fatal errors that abort a pipeline run
///
/// Every variant raised while an agent is executing carries that agent's id so
/// callers can report where the run stopped.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Agent '{agent_id}' is not defined (referenced by {referenced_by})")]
    UnknownAgent {
        agent_id: String,
        referenced_by: String,
    },

    #[error("Agent '{agent_id}': unknown tool '{tool_name}'. Available tools: {available:?}")]
    UnknownTool {
        agent_id: String,
        tool_name: String,
        available: Vec<String>,
    },

    #[error("Agent '{agent_id}': unsupported agent type '{kind}'")]
    UnsupportedAgentType { agent_id: String, kind: String },

    #[error("Agent '{agent_id}': input '{input}' could not be resolved from '{source_path}'")]
    MissingInput {
        agent_id: String,
        input: String,
        source_path: String,
    },

    #[error("Agent '{agent_id}': loop configuration error: {message}")]
    LoopConfig { agent_id: String, message: String },

    #[error("Agent '{agent_id}': prompt template error: {message}")]
    PromptFormat { agent_id: String, message: String },

    #[error("Agent '{agent_id}': model invocation failed: {source}")]
    Model {
        agent_id: String,
        #[source]
        source: ModelError,
    },

    #[error("Agent '{agent_id}': tool failed: {message}")]
    Tool { agent_id: String, message: String },

    #[error("Agent '{agent_id}': invalid state: {message}")]
    InvalidState { agent_id: String, message: String },

    #[error("Agent '{agent_id}' timed out after {timeout:?}")]
    StepTimeout { agent_id: String, timeout: Duration },

    #[error("Step limit of {max_steps} exceeded before agent '{agent_id}'")]
    StepLimitExceeded { agent_id: String, max_steps: usize },

    #[error("Run cancelled before agent '{agent_id}'")]
    Cancelled { agent_id: String },

    #[error("Invalid pipeline definition: {0}")]
    InvalidDefinition(String),
}

impl EngineError {
    /// The agent that was executing (or about to execute) when the error occurred
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            EngineError::UnknownAgent { referenced_by, .. } => Some(referenced_by),
            EngineError::UnknownTool { agent_id, .. }
            | EngineError::UnsupportedAgentType { agent_id, .. }
            | EngineError::MissingInput { agent_id, .. }
            | EngineError::LoopConfig { agent_id, .. }
            | EngineError::PromptFormat { agent_id, .. }
            | EngineError::Model { agent_id, .. }
            | EngineError::Tool { agent_id, .. }
            | EngineError::InvalidState { agent_id, .. }
            | EngineError::StepTimeout { agent_id, .. }
            | EngineError::StepLimitExceeded { agent_id, .. }
            | EngineError::Cancelled { agent_id } => Some(agent_id),
            EngineError::InvalidDefinition(_) => None,
        }
    }

    /// Stable name of the error kind, for reporting
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::UnknownAgent { .. } => "UnknownAgentError",
            EngineError::UnknownTool { .. } => "UnknownToolError",
            EngineError::UnsupportedAgentType { .. } => "UnsupportedAgentTypeError",
            EngineError::MissingInput { .. } => "MissingInputError",
            EngineError::LoopConfig { .. } => "LoopConfigError",
            EngineError::PromptFormat { .. } => "PromptFormatError",
            EngineError::Model { .. } => "ModelError",
            EngineError::Tool { .. } => "ToolError",
            EngineError::InvalidState { .. } => "InvalidStateError",
            EngineError::StepTimeout { .. } => "StepTimeoutError",
            EngineError::StepLimitExceeded { .. } => "StepLimitExceededError",
            EngineError::Cancelled { .. } => "CancelledError",
            EngineError::InvalidDefinition(_) => "InvalidDefinitionError",
        }
    }
}
