//! Pipeline state store
//!
//! A single flat map from string key to JSON value. Keys are either the
//! initial input key or `<agent_id>.<output_name>`. Agent outputs are never
//! addressed by further path traversal; only the initial input is nested.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Key under which the pipeline's initial input is stored
pub const INITIAL_INPUT_KEY: &str = "pipeline.initial_input";

/// A JSON object, used for inputs, outputs, configs and patches
pub type ValueMap = serde_json::Map<String, Value>;

/// A validated state key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// `pipeline.initial_input`
    InitialInput,
    /// `<agent_id>.<name>`; `name` may itself contain dots
    Output { agent_id: String, name: String },
}

impl StateKey {
    /// Key for an output owned by `agent_id`
    pub fn output(agent_id: &str, name: &str) -> Self {
        StateKey::Output {
            agent_id: agent_id.to_string(),
            name: name.to_string(),
        }
    }

    /// Parse a fully-qualified key, rejecting keys without an agent prefix
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == INITIAL_INPUT_KEY {
            return Some(StateKey::InitialInput);
        }
        let (agent_id, name) = raw.split_once('.')?;
        if agent_id.is_empty() || name.is_empty() {
            return None;
        }
        Some(StateKey::output(agent_id, name))
    }

    /// Key for a state-patch entry emitted by `agent_id`
    ///
    /// A key without a dot is namespaced under the emitting agent; a key that
    /// already contains a dot is taken as fully qualified.
    pub fn for_patch(agent_id: &str, key: &str) -> Self {
        if key.contains('.') {
            if let Some(parsed) = StateKey::parse(key) {
                return parsed;
            }
        }
        StateKey::output(agent_id, key)
    }

    /// The agent owning this key, if any
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            StateKey::InitialInput => None,
            StateKey::Output { agent_id, .. } => Some(agent_id),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKey::InitialInput => f.write_str(INITIAL_INPUT_KEY),
            StateKey::Output { agent_id, name } => write!(f, "{}.{}", agent_id, name),
        }
    }
}

/// The flat key/value record of everything produced during a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateStore {
    values: HashMap<String, Value>,
}

impl StateStore {
    /// Create a store seeded with the initial input
    pub fn new(initial_input: Value) -> Self {
        let mut values = HashMap::new();
        values.insert(INITIAL_INPUT_KEY.to_string(), initial_input);
        Self { values }
    }

    /// Read a value by typed key
    pub fn get(&self, key: &StateKey) -> Option<&Value> {
        self.values.get(&key.to_string())
    }

    /// Read a value by its flat key string
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Read an output owned by `agent_id`
    pub fn get_output(&self, agent_id: &str, name: &str) -> Option<&Value> {
        self.values.get(&format!("{}.{}", agent_id, name))
    }

    /// The initial input value
    pub fn initial_input(&self) -> Option<&Value> {
        self.values.get(INITIAL_INPUT_KEY)
    }

    /// Write a value, returning the previous one
    pub fn set(&mut self, key: StateKey, value: Value) -> Option<Value> {
        self.values.insert(key.to_string(), value)
    }

    /// Mutable access to the initial input, for operator substitutions
    pub(crate) fn initial_input_mut(&mut self) -> &mut Value {
        self.values
            .entry(INITIAL_INPUT_KEY.to_string())
            .or_insert(Value::Null)
    }

    /// Delete every key owned by `agent_id`, returning the removed keys
    pub fn clear_agent(&mut self, agent_id: &str) -> Vec<String> {
        let prefix = format!("{}.", agent_id);
        let mut removed: Vec<String> = self
            .values
            .keys()
            .filter(|key| key.starts_with(&prefix) && key.as_str() != INITIAL_INPUT_KEY)
            .cloned()
            .collect();
        for key in &removed {
            self.values.remove(key);
        }
        removed.sort();
        removed
    }

    /// Whether any key owned by `agent_id` is present
    pub fn has_outputs_for(&self, agent_id: &str) -> bool {
        let prefix = format!("{}.", agent_id);
        self.values
            .keys()
            .any(|key| key.starts_with(&prefix) && key.as_str() != INITIAL_INPUT_KEY)
    }

    /// Number of keys in the store
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Snapshot as a JSON object (sorted keys)
    pub fn to_value_map(&self) -> ValueMap {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
