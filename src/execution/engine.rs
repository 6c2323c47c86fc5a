//! Pipeline runner - drives a pipeline from its start agent to termination
//!
//! Each step resolves the agent's inputs, dispatches it, merges its outputs
//! into the state store as `<agent>.<name>`, applies any state patch and
//! clear directive, and then selects the next agent.

use crate::{
    agent::{ModelGateway, ModelInvoker},
    core::{
        resolve_inputs, resolve_path, AgentSpec, EngineError, EngineSettings,
        InputResolutionPolicy, PipelineDefinition, RunReport, StateKey, StateStore, StepRecord,
        ValueMap,
    },
    execution::{executor::AgentDispatcher, scheduler},
    tools::{ToolOutput, ToolRegistry},
};
use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Events emitted while a pipeline runs
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
    },
    AgentStarted {
        agent_id: String,
        /// 1-based position in the run
        step: usize,
    },
    /// An operator supplied a value for an unresolved input
    InputSubstituted {
        agent_id: String,
        source_path: String,
    },
    AgentCompleted {
        agent_id: String,
        output_keys: Vec<String>,
        next_agent: Option<String>,
    },
    OutputsCleared {
        cleared_by: String,
        agent_id: String,
        keys: Vec<String>,
    },
    PipelineCompleted {
        execution_id: Uuid,
        steps: usize,
    },
    PipelineFailed {
        execution_id: Uuid,
        agent_id: Option<String>,
        kind: &'static str,
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Message stored for a final output whose path does not resolve
pub fn missing_output_message(path: &str) -> String {
    format!("Error: Output '{}' not found in final state", path)
}

/// Sequential pipeline engine
pub struct PipelineRunner {
    dispatcher: AgentDispatcher,
    input_policy: InputResolutionPolicy,
    event_handlers: Vec<EventHandler>,
    cancel: Option<Arc<AtomicBool>>,
}

impl PipelineRunner {
    /// Runner with the built-in tools and strict input resolution
    pub fn new(invoker: Arc<dyn ModelInvoker>, settings: EngineSettings) -> Self {
        Self::with_tools(invoker, settings, ToolRegistry::with_builtin_tools())
    }

    /// Runner with a caller-supplied tool registry
    pub fn with_tools(
        invoker: Arc<dyn ModelInvoker>,
        settings: EngineSettings,
        tools: ToolRegistry,
    ) -> Self {
        let models = ModelGateway::new(invoker, settings.model_failure_policy);
        Self {
            dispatcher: AgentDispatcher::new(tools, models, settings),
            input_policy: InputResolutionPolicy::Strict,
            event_handlers: Vec::new(),
            cancel: None,
        }
    }

    pub fn with_input_policy(mut self, policy: InputResolutionPolicy) -> Self {
        self.input_policy = policy;
        self
    }

    /// Abort between steps once `flag` is set
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Add an event handler; handlers run synchronously in registration order
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    pub fn settings(&self) -> &EngineSettings {
        self.dispatcher.settings()
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.tools()
    }

    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Execute the pipeline to termination
    ///
    /// On failure no partial report is produced; the error names the agent
    /// that was executing.
    pub async fn run(&self, definition: &PipelineDefinition) -> Result<RunReport, EngineError> {
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(
            "Starting pipeline execution: {} ({})",
            definition.name, execution_id
        );
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: definition.name.clone(),
        });

        let mut state = StateStore::new(definition.initial_input.clone());
        let mut steps = Vec::new();

        if let Err(e) = self.drive(definition, &mut state, &mut steps).await {
            error!("Pipeline {} failed: {}", definition.name, e);
            self.emit_event(ExecutionEvent::PipelineFailed {
                execution_id,
                agent_id: e.agent_id().map(str::to_string),
                kind: e.kind(),
                error: e.to_string(),
            });
            return Err(e);
        }

        let final_outputs = collect_final_outputs(definition, &state);

        info!(
            "Pipeline execution finished: {} after {} steps",
            definition.name,
            steps.len()
        );
        self.emit_event(ExecutionEvent::PipelineCompleted {
            execution_id,
            steps: steps.len(),
        });

        Ok(RunReport {
            execution_id,
            pipeline_name: definition.name.clone(),
            state,
            final_outputs,
            steps,
            started_at,
            completed_at: Utc::now(),
        })
    }

    async fn drive(
        &self,
        definition: &PipelineDefinition,
        state: &mut StateStore,
        steps: &mut Vec<StepRecord>,
    ) -> Result<(), EngineError> {
        let mut current = Some(definition.start_agent.clone());
        let mut referenced_by = "start_agent".to_string();

        while let Some(agent_id) = current {
            if self
                .cancel
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::SeqCst))
            {
                return Err(EngineError::Cancelled { agent_id });
            }
            if let Some(max_steps) = self.settings().max_steps {
                if steps.len() >= max_steps {
                    return Err(EngineError::StepLimitExceeded {
                        agent_id,
                        max_steps,
                    });
                }
            }

            let agent = definition
                .agent(&agent_id)
                .ok_or_else(|| EngineError::UnknownAgent {
                    agent_id: agent_id.clone(),
                    referenced_by: referenced_by.clone(),
                })?;

            info!("Executing agent: {}", agent_id);
            self.emit_event(ExecutionEvent::AgentStarted {
                agent_id: agent_id.clone(),
                step: steps.len() + 1,
            });
            let started_at = Utc::now();

            let optional = self.dispatcher.optional_inputs(agent);
            let resolved = resolve_inputs(agent, &optional, state, &self.input_policy)?;
            for source_path in resolved.substituted {
                self.emit_event(ExecutionEvent::InputSubstituted {
                    agent_id: agent_id.clone(),
                    source_path,
                });
            }
            debug!("Resolved inputs for {}: {:?}", agent_id, resolved.values);

            let output = self.dispatch(agent, &resolved.values, state).await?;
            let next_agent = scheduler::next_agent(
                &agent_id,
                output.next_step.as_deref(),
                &definition.routing,
            );
            let output_keys = self.apply(&agent_id, output, state);

            info!(
                "Agent {} produced outputs {:?}, next: {}",
                agent_id,
                output_keys,
                next_agent.as_deref().unwrap_or("<end>")
            );
            self.emit_event(ExecutionEvent::AgentCompleted {
                agent_id: agent_id.clone(),
                output_keys,
                next_agent: next_agent.clone(),
            });

            steps.push(StepRecord {
                agent_id: agent_id.clone(),
                started_at,
                completed_at: Utc::now(),
                next_agent: next_agent.clone(),
            });

            referenced_by = agent_id;
            current = next_agent;
        }

        Ok(())
    }

    async fn dispatch(
        &self,
        agent: &AgentSpec,
        inputs: &ValueMap,
        state: &StateStore,
    ) -> Result<ToolOutput, EngineError> {
        match self.settings().step_timeout {
            Some(limit) => tokio::time::timeout(limit, self.dispatcher.dispatch(agent, inputs, state))
                .await
                .map_err(|_| EngineError::StepTimeout {
                    agent_id: agent.id.clone(),
                    timeout: limit,
                })?,
            None => self.dispatcher.dispatch(agent, inputs, state).await,
        }
    }

    /// Merge outputs, then the state patch, then clear; returns written output keys
    fn apply(&self, agent_id: &str, output: ToolOutput, state: &mut StateStore) -> Vec<String> {
        let mut output_keys = Vec::with_capacity(output.outputs.len());
        for (name, value) in output.outputs {
            output_keys.push(name.clone());
            state.set(StateKey::output(agent_id, &name), value);
        }

        if let Some(patch) = output.state_patch {
            for (key, value) in patch {
                let key = StateKey::for_patch(agent_id, &key);
                debug!("Agent {} patched {}", agent_id, key);
                state.set(key, value);
            }
        }

        for cleared in output.clear_agents.unwrap_or_default() {
            let keys = state.clear_agent(&cleared);
            if !keys.is_empty() {
                info!("Cleared outputs of {}: {:?}", cleared, keys);
            }
            self.emit_event(ExecutionEvent::OutputsCleared {
                cleared_by: agent_id.to_string(),
                agent_id: cleared,
                keys,
            });
        }

        output_keys
    }
}

/// Resolve every final-output path, substituting a message for missing ones
pub fn collect_final_outputs(definition: &PipelineDefinition, state: &StateStore) -> ValueMap {
    definition
        .final_outputs
        .iter()
        .map(|(label, path)| {
            let value = resolve_path(path, state)
                .cloned()
                .unwrap_or_else(|| Value::String(missing_output_message(path)));
            (label.clone(), value)
        })
        .collect()
}
