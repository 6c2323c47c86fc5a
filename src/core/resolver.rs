//! Input resolution against the state store

use crate::core::{
    definition::{AgentSpec, InputSource},
    error::EngineError,
    state::{StateKey, StateStore, ValueMap, INITIAL_INPUT_KEY},
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolve a dotted source path against the state
///
/// Paths under `pipeline.initial_input.` descend into the nested initial
/// input object field by field. Every other path is a flat key lookup.
/// A stored `null` counts as not found.
pub fn resolve_path<'a>(path: &str, state: &'a StateStore) -> Option<&'a Value> {
    let value = match initial_input_subpath(path) {
        Some(subpath) => lookup_nested(state.initial_input()?, subpath)?,
        None => state.get_raw(path)?,
    };
    (!value.is_null()).then_some(value)
}

/// Descend into `value` along a dot-separated path
pub fn lookup_nested<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

fn initial_input_subpath(path: &str) -> Option<&str> {
    path.strip_prefix(INITIAL_INPUT_KEY)?.strip_prefix('.')
}

/// A request for an operator-supplied value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRequest<'a> {
    pub agent_id: &'a str,
    pub input: &'a str,
    pub source_path: &'a str,
}

/// Supplies substitute values for inputs that could not be resolved
pub trait InputPrompter: Send + Sync {
    /// Return a value for the request, or `None` to decline
    fn provide(&self, request: &InputRequest<'_>) -> Option<String>;
}

/// What to do when a required input resolves to nothing
#[derive(Clone, Default)]
pub enum InputResolutionPolicy {
    /// Fail fast with a missing-input error
    #[default]
    Strict,
    /// Ask the prompter and write the answer back into state
    Interactive(Arc<dyn InputPrompter>),
}

impl fmt::Debug for InputResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputResolutionPolicy::Strict => f.write_str("Strict"),
            InputResolutionPolicy::Interactive(_) => f.write_str("Interactive"),
        }
    }
}

/// Inputs materialized for one agent execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedInputs {
    pub values: ValueMap,
    /// Source paths that were filled in by an operator
    pub substituted: Vec<String>,
}

/// Materialize an agent's inputs from the state
///
/// Inputs named in `optional` are omitted when they resolve to nothing.
pub fn resolve_inputs(
    agent: &AgentSpec,
    optional: &[String],
    state: &mut StateStore,
    policy: &InputResolutionPolicy,
) -> Result<ResolvedInputs, EngineError> {
    let mut resolved = ResolvedInputs::default();

    for (local_name, source) in &agent.inputs {
        let source_path = match source {
            InputSource::Literal(value) => {
                resolved.values.insert(local_name.clone(), value.clone());
                continue;
            }
            InputSource::Path(path) => path,
        };

        if let Some(value) = resolve_path(source_path, state) {
            resolved.values.insert(local_name.clone(), value.clone());
            continue;
        }

        if optional.iter().any(|name| name == local_name) {
            debug!(
                "Optional input '{}' of agent {} is absent ({})",
                local_name, agent.id, source_path
            );
            continue;
        }

        let prompter = match policy {
            InputResolutionPolicy::Strict => {
                return Err(missing_input(agent, local_name, source_path));
            }
            InputResolutionPolicy::Interactive(prompter) => prompter,
        };

        let request = InputRequest {
            agent_id: &agent.id,
            input: local_name,
            source_path,
        };
        let Some(answer) = prompter.provide(&request) else {
            return Err(missing_input(agent, local_name, source_path));
        };

        let value = Value::String(answer);
        write_substitute(state, source_path, value.clone());
        resolved.values.insert(local_name.clone(), value);
        resolved.substituted.push(source_path.clone());
    }

    Ok(resolved)
}

fn missing_input(agent: &AgentSpec, input: &str, source_path: &str) -> EngineError {
    EngineError::MissingInput {
        agent_id: agent.id.clone(),
        input: input.to_string(),
        source_path: source_path.to_string(),
    }
}

/// Store an operator-supplied value where later lookups of `source_path` find it
fn write_substitute(state: &mut StateStore, source_path: &str, value: Value) {
    if let Some(subpath) = initial_input_subpath(source_path) {
        if !insert_nested(state.initial_input_mut(), subpath, value) {
            warn!(
                "Initial input is not an object; substitute for '{}' is not persisted",
                source_path
            );
        }
        return;
    }

    match StateKey::parse(source_path) {
        Some(key) => {
            state.set(key, value);
        }
        None => warn!(
            "'{}' is not a valid state key; substitute is not persisted",
            source_path
        ),
    }
}

fn insert_nested(target: &mut Value, path: &str, value: Value) -> bool {
    let mut current = target;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if current.is_null() {
            *current = Value::Object(ValueMap::new());
        }
        let Some(object) = current.as_object_mut() else {
            return false;
        };
        if segments.peek().is_none() {
            object.insert(segment.to_string(), value);
            return true;
        }
        current = object.entry(segment.to_string()).or_insert(Value::Null);
    }
    false
}
