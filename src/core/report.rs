//! Run report - what a completed run exposes to its caller

use crate::core::state::{StateStore, ValueMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One executed agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// The agent that ran
    pub agent_id: String,

    /// When the agent started
    pub started_at: DateTime<Utc>,

    /// When the agent finished
    pub completed_at: DateTime<Utc>,

    /// The agent selected to run next, or `None` at termination
    pub next_agent: Option<String>,
}

/// Outcome of a completed pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub execution_id: Uuid,
    pub pipeline_name: String,

    /// Final state store
    pub state: StateStore,

    /// Final outputs by label; unresolvable paths hold a sentinel message
    pub final_outputs: ValueMap,

    /// Executed agents in order
    pub steps: Vec<StepRecord>,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    /// Number of agents executed
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Agent ids in execution order
    pub fn executed_agents(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.agent_id.as_str()).collect()
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}
