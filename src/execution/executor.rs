//! Agent dispatcher - runs one agent against its resolved inputs

use crate::{
    agent::ModelGateway,
    core::{
        prompt::{parse_list, render_prompt},
        AgentKind, AgentSpec, EngineError, EngineSettings, ModelAgent, OutputFormat, StateStore,
        ToolAgent, ValueMap,
    },
    tools::{Tool, ToolContext, ToolOutput, ToolRegistry},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Executes single agents: the model path or the tool path
pub struct AgentDispatcher {
    tools: ToolRegistry,
    models: ModelGateway,
    settings: EngineSettings,
}

impl AgentDispatcher {
    pub fn new(tools: ToolRegistry, models: ModelGateway, settings: EngineSettings) -> Self {
        Self {
            tools,
            models,
            settings,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Inputs of `agent` that may resolve to nothing without failing
    ///
    /// The agent's own `optional_inputs` plus whatever its tool declares for
    /// the agent's configuration.
    pub fn optional_inputs(&self, agent: &AgentSpec) -> Vec<String> {
        let mut optional = agent.optional_inputs.clone();
        if let AgentKind::Tool(tool) | AgentKind::Named(tool) = &agent.kind {
            if let Some(implementation) = self.tools.get(&tool.tool_name) {
                optional.extend(implementation.optional_inputs(&tool.tool_config));
            }
        }
        optional
    }

    /// Run `agent` and normalize its result
    pub async fn dispatch(
        &self,
        agent: &AgentSpec,
        inputs: &ValueMap,
        state: &StateStore,
    ) -> Result<ToolOutput, EngineError> {
        match &agent.kind {
            AgentKind::Model(model) => self.run_model(agent, model, inputs).await,
            AgentKind::Tool(tool) => {
                let implementation = self.tool_for(agent, tool)?;
                self.run_tool(agent, tool, implementation, inputs, state).await
            }
            AgentKind::Named(tool) => match self.tools.get(&tool.tool_name) {
                Some(implementation) => {
                    self.run_tool(agent, tool, implementation, inputs, state)
                        .await
                }
                None => Err(EngineError::UnsupportedAgentType {
                    agent_id: agent.id.clone(),
                    kind: tool.tool_name.clone(),
                }),
            },
        }
    }

    fn tool_for(&self, agent: &AgentSpec, tool: &ToolAgent) -> Result<Arc<dyn Tool>, EngineError> {
        self.tools
            .get(&tool.tool_name)
            .ok_or_else(|| EngineError::UnknownTool {
                agent_id: agent.id.clone(),
                tool_name: tool.tool_name.clone(),
                available: self.tools.names(),
            })
    }

    async fn run_model(
        &self,
        agent: &AgentSpec,
        model: &ModelAgent,
        inputs: &ValueMap,
    ) -> Result<ToolOutput, EngineError> {
        let output_name = agent
            .outputs
            .first()
            .ok_or_else(|| EngineError::InvalidState {
                agent_id: agent.id.clone(),
                message: "model agent declares no output".to_string(),
            })?;

        let prompt = render_prompt(&model.prompt_template, inputs).map_err(|message| {
            EngineError::PromptFormat {
                agent_id: agent.id.clone(),
                message,
            }
        })?;
        let model_id = model
            .model
            .as_deref()
            .unwrap_or(self.settings.default_model.as_str());

        debug!("Prompt for agent {} ({}): {}", agent.id, model_id, prompt);
        let response = self
            .models
            .complete(model_id, &prompt)
            .await
            .map_err(|source| EngineError::Model {
                agent_id: agent.id.clone(),
                source,
            })?;
        debug!("Response for agent {}: {}", agent.id, response);

        let value = match model.output_format {
            OutputFormat::Text => Value::String(response),
            OutputFormat::List => Value::from(parse_list(&response)),
        };

        Ok(ToolOutput::new().with_output(output_name.clone(), value))
    }

    async fn run_tool(
        &self,
        agent: &AgentSpec,
        tool: &ToolAgent,
        implementation: Arc<dyn Tool>,
        inputs: &ValueMap,
        state: &StateStore,
    ) -> Result<ToolOutput, EngineError> {
        info!("Agent {} invoking tool {}", agent.id, tool.tool_name);
        let ctx = ToolContext {
            agent_id: &agent.id,
            output_fields: &agent.outputs,
            state,
            models: &self.models,
            settings: &self.settings,
        };
        implementation
            .execute(inputs, &tool.tool_config, &ctx)
            .await
            .map_err(|e| e.into_engine_error(&agent.id))
    }
}
