//! Pipeline definitions: the wire format and the validated domain model

use crate::core::{error::EngineError, state::ValueMap};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Top-level pipeline definition as authored in JSON or YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub pipeline_name: String,

    /// Seed value for `pipeline.initial_input`
    #[serde(default)]
    pub initial_input: Value,

    /// Id of the first agent to run
    pub start_agent: String,

    /// Agent definitions
    pub agents: Vec<AgentConfig>,

    /// Static routing: agent id -> next agent
    #[serde(default)]
    pub routing: BTreeMap<String, RouteConfig>,

    /// Human labels -> state paths exposed after the run
    #[serde(default)]
    pub final_outputs: BTreeMap<String, String>,
}

/// One agent as authored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique agent identifier
    pub id: String,

    /// Kind tag: `llm_agent`, `tool_agent`, or a tool name
    #[serde(rename = "type")]
    pub agent_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Model id for model agents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Prompt template for model agents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,

    /// Output-format hint for model agents (`list` enables list parsing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,

    /// Tool name for tool agents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Tool configuration blob
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub tool_config: ValueMap,

    /// Local name -> source path (string) or literal (anything else)
    #[serde(default)]
    pub inputs: ValueMap,

    /// Declared output names
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Inputs that may be absent without failing resolution
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_inputs: Vec<String>,
}

/// Static routing entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub next: Option<String>,
}

impl PipelineConfig {
    /// Load a definition from a JSON or YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            Some("json") => Self::from_json(&content),
            _ => Self::from_json(&content).or_else(|_| Self::from_yaml(&content)),
        }
    }

    /// Parse a definition from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PipelineConfig =
            serde_json::from_str(json).context("Pipeline definition is not valid JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a definition from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig =
            serde_yaml::from_str(yaml).context("Pipeline definition is not valid YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Check the structural invariants of the definition
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut seen_ids = HashSet::new();
        for agent in &self.agents {
            if !seen_ids.insert(agent.id.as_str()) {
                return Err(EngineError::InvalidDefinition(format!(
                    "Duplicate agent id: {}",
                    agent.id
                )));
            }
        }

        if !seen_ids.contains(self.start_agent.as_str()) {
            return Err(EngineError::UnknownAgent {
                agent_id: self.start_agent.clone(),
                referenced_by: "start_agent".to_string(),
            });
        }

        for source in self.routing.keys() {
            if !seen_ids.contains(source.as_str()) {
                return Err(EngineError::UnknownAgent {
                    agent_id: source.clone(),
                    referenced_by: "routing".to_string(),
                });
            }
        }

        for agent in &self.agents {
            match agent.agent_type.as_str() {
                "llm_agent" | "model_agent" => {
                    if agent.prompt_template.is_none() {
                        return Err(EngineError::InvalidDefinition(format!(
                            "Model agent '{}' has no prompt_template",
                            agent.id
                        )));
                    }
                    if agent.outputs.is_empty() {
                        return Err(EngineError::InvalidDefinition(format!(
                            "Model agent '{}' declares no output",
                            agent.id
                        )));
                    }
                }
                "tool_agent" => {
                    if agent.tool_name.is_none() {
                        return Err(EngineError::InvalidDefinition(format!(
                            "Tool agent '{}' has no tool_name",
                            agent.id
                        )));
                    }
                }
                _ => {}
            }
        }

        self.validate_tool_configs()
    }

    /// Let built-in tools reject their configuration before anything runs
    fn validate_tool_configs(&self) -> Result<(), EngineError> {
        let tools = ToolRegistry::with_builtin_tools();
        for agent in &self.agents {
            let tool_name = match agent.agent_type.as_str() {
                "llm_agent" | "model_agent" => continue,
                "tool_agent" => agent.tool_name.as_deref().unwrap_or_default(),
                other => other,
            };
            let Some(tool) = tools.get(tool_name) else {
                continue;
            };
            let input_names: Vec<&str> = agent.inputs.keys().map(String::as_str).collect();
            tool.validate_config(&agent.tool_config, &input_names)
                .map_err(|e| e.into_engine_error(&agent.id))?;
        }
        Ok(())
    }

    /// Convert into the immutable domain model
    pub fn to_definition(&self) -> Result<PipelineDefinition, EngineError> {
        PipelineDefinition::from_config(self)
    }
}

/// Where an agent input comes from
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    /// A dotted state path
    Path(String),
    /// A literal value used as-is
    Literal(Value),
}

impl From<&Value> for InputSource {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(path) => InputSource::Path(path.clone()),
            other => InputSource::Literal(other.clone()),
        }
    }
}

/// How a model agent's raw response is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Store the response text verbatim
    #[default]
    Text,
    /// Split the response into a list of items
    List,
}

impl OutputFormat {
    fn from_hint(hint: Option<&str>) -> Self {
        match hint {
            Some(hint) if hint.eq_ignore_ascii_case("list") => OutputFormat::List,
            _ => OutputFormat::Text,
        }
    }
}

/// Configuration of an agent that calls a model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAgent {
    /// Model id; `None` selects the engine default
    pub model: Option<String>,
    pub prompt_template: String,
    pub output_format: OutputFormat,
}

/// Configuration of an agent that invokes a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolAgent {
    pub tool_name: String,
    pub tool_config: ValueMap,
}

/// The kind of work an agent performs
#[derive(Debug, Clone, PartialEq)]
pub enum AgentKind {
    Model(ModelAgent),
    Tool(ToolAgent),
    /// The kind tag itself names a tool; resolved against the registry at dispatch
    Named(ToolAgent),
}

/// One validated pipeline step
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub id: String,
    pub description: Option<String>,
    pub kind: AgentKind,
    pub inputs: BTreeMap<String, InputSource>,
    pub outputs: Vec<String>,
    pub optional_inputs: Vec<String>,
}

impl AgentSpec {
    /// Build an agent from its authored form
    pub fn from_config(config: &AgentConfig) -> Result<Self, EngineError> {
        let kind = match config.agent_type.as_str() {
            "llm_agent" | "model_agent" => AgentKind::Model(ModelAgent {
                model: config
                    .model
                    .clone()
                    .filter(|model| !model.is_empty() && model != "default"),
                prompt_template: config.prompt_template.clone().ok_or_else(|| {
                    EngineError::InvalidDefinition(format!(
                        "Model agent '{}' has no prompt_template",
                        config.id
                    ))
                })?,
                output_format: OutputFormat::from_hint(config.output_format.as_deref()),
            }),
            "tool_agent" => AgentKind::Tool(ToolAgent {
                tool_name: config.tool_name.clone().ok_or_else(|| {
                    EngineError::InvalidDefinition(format!(
                        "Tool agent '{}' has no tool_name",
                        config.id
                    ))
                })?,
                tool_config: config.tool_config.clone(),
            }),
            other => AgentKind::Named(ToolAgent {
                tool_name: other.to_string(),
                tool_config: config.tool_config.clone(),
            }),
        };

        Ok(AgentSpec {
            id: config.id.clone(),
            description: config.description.clone(),
            kind,
            inputs: config
                .inputs
                .iter()
                .map(|(name, source)| (name.clone(), InputSource::from(source)))
                .collect(),
            outputs: config.outputs.clone(),
            optional_inputs: config.optional_inputs.clone(),
        })
    }
}

/// Static next-agent mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingTable {
    routes: HashMap<String, Option<String>>,
}

impl RoutingTable {
    /// The statically-next agent after `agent_id`, if any
    pub fn next(&self, agent_id: &str) -> Option<&str> {
        self.routes.get(agent_id).and_then(|next| next.as_deref())
    }

    /// Add or replace a route
    pub fn insert(&mut self, from: impl Into<String>, next: Option<String>) {
        self.routes.insert(from.into(), next);
    }
}

/// A validated, immutable pipeline
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    pub name: String,
    pub initial_input: Value,
    pub start_agent: String,
    pub routing: RoutingTable,
    pub final_outputs: BTreeMap<String, String>,
    agents: Vec<AgentSpec>,
    index: HashMap<String, usize>,
}

impl PipelineDefinition {
    /// Build a definition from its authored form
    pub fn from_config(config: &PipelineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let agents = config
            .agents
            .iter()
            .map(AgentSpec::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        let index = agents
            .iter()
            .enumerate()
            .map(|(i, agent)| (agent.id.clone(), i))
            .collect();

        let mut routing = RoutingTable::default();
        for (from, route) in &config.routing {
            routing.insert(from.clone(), route.next.clone());
        }

        Ok(PipelineDefinition {
            name: config.pipeline_name.clone(),
            initial_input: config.initial_input.clone(),
            start_agent: config.start_agent.clone(),
            routing,
            final_outputs: config.final_outputs.clone(),
            agents,
            index,
        })
    }

    /// Look up an agent by id
    pub fn agent(&self, id: &str) -> Option<&AgentSpec> {
        self.index.get(id).map(|&i| &self.agents[i])
    }

    /// Agents in declaration order
    pub fn agents(&self) -> &[AgentSpec] {
        &self.agents
    }
}
