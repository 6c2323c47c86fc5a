//! Core domain models for the pipeline engine
//!
//! This module defines pipeline definitions, the state store and its path
//! resolver, prompt rendering, engine settings, errors, and run reports.

pub mod definition;
pub mod error;
pub mod prompt;
pub mod report;
pub mod resolver;
pub mod settings;
pub mod state;

pub use definition::*;
pub use error::EngineError;
pub use report::*;
pub use resolver::*;
pub use settings::*;
pub use state::*;
