//! Tools: the pluggable capability invoked by tool agents
//!
//! A tool receives the agent's resolved inputs and its `tool_config` blob and
//! returns a [`ToolOutput`]: ordinary outputs plus optional control directives
//! (a next-step override, a state patch, and a list of agents to clear).

pub mod aggregator;
pub mod code_executor;
pub mod regex_parser;
pub mod registry;
pub mod router;
pub mod structured_parser;

use crate::agent::{ModelError, ModelGateway};
use crate::core::{EngineError, EngineSettings, StateStore, ValueMap};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use aggregator::DataAggregatorTool;
pub use code_executor::CodeExecutionTool;
pub use regex_parser::RegexParserTool;
pub use registry::ToolRegistry;
pub use router::ConditionalRouterTool;
pub use structured_parser::StructuredDataParserTool;

/// Errors a tool may raise
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Execution(String),

    #[error("{0}")]
    LoopConfig(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl ToolError {
    /// Attach the executing agent's id
    pub fn into_engine_error(self, agent_id: &str) -> EngineError {
        let agent_id = agent_id.to_string();
        match self {
            ToolError::LoopConfig(message) => EngineError::LoopConfig { agent_id, message },
            ToolError::Model(source) => EngineError::Model { agent_id, source },
            ToolError::InvalidInput(message) => EngineError::Tool {
                agent_id,
                message: format!("invalid input: {}", message),
            },
            ToolError::Execution(message) => EngineError::Tool { agent_id, message },
        }
    }
}

/// Result of a tool call: ordinary outputs plus control directives
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// Stored as `<agent>.<name>`
    pub outputs: ValueMap,

    /// Overrides the routing table when set
    pub next_step: Option<String>,

    /// Keys without a dot are namespaced under the emitting agent
    pub state_patch: Option<ValueMap>,

    /// Agents whose recorded outputs are purged before the next step
    pub clear_agents: Option<Vec<String>>,
}

impl ToolOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output map with no directives
    pub fn from_outputs(outputs: ValueMap) -> Self {
        Self {
            outputs,
            ..Self::default()
        }
    }

    pub fn with_output(mut self, name: impl Into<String>, value: Value) -> Self {
        self.outputs.insert(name.into(), value);
        self
    }

    pub fn with_next_step(mut self, next: impl Into<String>) -> Self {
        self.next_step = Some(next.into());
        self
    }

    pub fn with_state_patch(mut self, patch: ValueMap) -> Self {
        self.state_patch = Some(patch);
        self
    }

    pub fn with_clear_agents(mut self, agents: Vec<String>) -> Self {
        self.clear_agents = Some(agents);
        self
    }
}

/// What a tool can see of the running pipeline
pub struct ToolContext<'a> {
    /// The agent invoking the tool
    pub agent_id: &'a str,

    /// Output names the agent declares
    pub output_fields: &'a [String],

    /// Read-only view of the state store
    pub state: &'a StateStore,

    /// Model access with the run's failure policy applied
    pub models: &'a ModelGateway,

    pub settings: &'a EngineSettings,
}

/// A pluggable tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry name, e.g. `RegexParserTool`
    fn name(&self) -> &str;

    /// Input names that may be absent for this configuration
    fn optional_inputs(&self, _config: &ValueMap) -> Vec<String> {
        Vec::new()
    }

    /// Reject a configuration before the pipeline starts; `input_names` are
    /// the agent's declared input names
    fn validate_config(&self, _config: &ValueMap, _input_names: &[&str]) -> Result<(), ToolError> {
        Ok(())
    }

    async fn execute(
        &self,
        inputs: &ValueMap,
        config: &ValueMap,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError>;
}

/// Read a string field from a config blob
pub(crate) fn config_str<'a>(config: &'a ValueMap, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}
