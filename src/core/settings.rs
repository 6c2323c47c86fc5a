//! Engine-wide settings

use crate::agent::ModelFailurePolicy;
use std::time::Duration;

/// Model used when an agent does not name one
pub const DEFAULT_MODEL: &str = "phi4:latest";

/// Settings shared by every run of a [`PipelineRunner`](crate::execution::PipelineRunner)
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Model for model agents that omit `model` or set it to `"default"`
    pub default_model: String,

    /// Model for the structured data parser when its config names none
    pub default_structured_model: String,

    /// What a failed model call does to the run
    pub model_failure_policy: ModelFailurePolicy,

    /// Upper bound on a single agent's execution
    pub step_timeout: Option<Duration>,

    /// Upper bound on the number of executed agents per run
    pub max_steps: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            default_structured_model: DEFAULT_MODEL.to_string(),
            model_failure_policy: ModelFailurePolicy::default(),
            step_timeout: None,
            max_steps: None,
        }
    }
}

impl EngineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `DEFAULT_LLM_MODEL` and `DEFAULT_STRUCTURED_DATA_MODEL`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(model) = lookup("DEFAULT_LLM_MODEL").filter(|m| !m.trim().is_empty()) {
            settings.default_model = model;
        }
        if let Some(model) =
            lookup("DEFAULT_STRUCTURED_DATA_MODEL").filter(|m| !m.trim().is_empty())
        {
            settings.default_structured_model = model;
        }
        settings
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_default_structured_model(mut self, model: impl Into<String>) -> Self {
        self.default_structured_model = model.into();
        self
    }

    pub fn with_model_failure_policy(mut self, policy: ModelFailurePolicy) -> Self {
        self.model_failure_policy = policy;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }
}
