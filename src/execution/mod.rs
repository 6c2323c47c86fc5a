//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{collect_final_outputs, EventHandler, ExecutionEvent, PipelineRunner};
pub use executor::AgentDispatcher;
