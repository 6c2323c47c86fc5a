//! agent-pipeline - a declarative agent pipeline engine with routing and bounded loops

pub mod agent;
pub mod cli;
pub mod core;
pub mod execution;
pub mod tools;

// Re-export commonly used types
pub use agent::{
    ModelError, ModelFailurePolicy, ModelGateway, ModelInvoker, OllamaCliClient, OllamaClient,
};
pub use core::{
    EngineError, EngineSettings, InputPrompter, InputRequest, InputResolutionPolicy,
    PipelineConfig, PipelineDefinition, RunReport, StateKey, StateStore,
};
pub use execution::{ExecutionEvent, PipelineRunner};
pub use tools::{Tool, ToolContext, ToolError, ToolOutput, ToolRegistry};
