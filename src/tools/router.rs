//! Conditional router - branching and bounded loops
//!
//! Without `loop_config` the router evaluates `condition_groups` in order and
//! overrides the next step with the first match (or `else_execute_step`).
//!
//! With `loop_config` it is a loop controller. Each call reads its counter
//! from `<agent>.<counter_name>` (0 when absent), appends any non-empty
//! accumulator inputs to the lists stored under `<agent>.<accumulator>`, and
//! then either continues (`count < total`) or terminates:
//!
//! - continue: next step is `loop_body_start_id`, the state patch carries
//!   `count + 1` and every accumulator list, and `loop_body_agents` are cleared
//! - terminate: next step is `else_execute_step` and every accumulator list is
//!   returned as an ordinary output; no patch and no clear
//!
//! Accumulation happens before the decision, so the value supplied on the call
//! that crosses the threshold is still captured. The router never writes state
//! itself; identical inputs and state always yield identical directives.

use super::{config_str, Tool, ToolContext, ToolError, ToolOutput};
use crate::core::ValueMap;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Routes by condition, or drives a bounded loop when `loop_config` is set
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalRouterTool;

#[derive(Debug, Clone, Deserialize)]
struct LoopConfig {
    #[serde(default)]
    total_iterations_from: Option<Value>,
    #[serde(default)]
    loop_body_start_id: Option<String>,
    #[serde(default)]
    counter_name: Option<String>,
    /// accumulator name -> input name feeding it
    #[serde(default)]
    accumulators: BTreeMap<String, String>,
    #[serde(default)]
    loop_body_agents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ConditionGroup {
    #[serde(rename = "if")]
    condition: Condition,
    then_execute_step: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Condition {
    variable: String,
    operator: Operator,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    Gt,
    Lt,
}

impl LoopConfig {
    fn body_start(&self) -> Result<&str, ToolError> {
        self.loop_body_start_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ToolError::LoopConfig("loop_body_start_id is missing".to_string()))
    }

    fn counter_name(&self) -> Result<&str, ToolError> {
        self.counter_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ToolError::LoopConfig("counter_name is missing".to_string()))
    }

    /// Everything that can be checked without running the pipeline
    fn check(&self, input_names: &[&str]) -> Result<(), ToolError> {
        self.body_start()?;
        self.counter_name()?;
        match &self.total_iterations_from {
            None | Some(Value::Null) => Err(ToolError::LoopConfig(
                "total_iterations_from is missing".to_string(),
            )),
            Some(Value::String(input_name)) if !input_names.contains(&input_name.as_str()) => {
                Err(ToolError::LoopConfig(format!(
                    "total iterations input '{}' is not one of the agent's inputs {:?}",
                    input_name, input_names
                )))
            }
            Some(Value::String(_)) => Ok(()),
            Some(literal) => total_iterations(Some(literal), &ValueMap::new()).map(|_| ()),
        }
    }
}

impl ConditionalRouterTool {
    fn loop_config(config: &ValueMap) -> Result<Option<LoopConfig>, ToolError> {
        match config.get("loop_config") {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|e| ToolError::LoopConfig(format!("malformed loop_config: {}", e))),
        }
    }

    fn route(&self, inputs: &ValueMap, config: &ValueMap) -> Result<ToolOutput, ToolError> {
        let groups: Vec<ConditionGroup> = match config.get("condition_groups") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| ToolError::Execution(format!("malformed condition_groups: {}", e)))?,
        };

        for group in &groups {
            let subject = inputs
                .get(&group.condition.variable)
                .unwrap_or(&Value::Null);
            if group.condition.operator.evaluate(subject, &group.condition.value) {
                debug!(
                    "Condition on '{}' matched, routing to {}",
                    group.condition.variable, group.then_execute_step
                );
                return Ok(ToolOutput::new().with_next_step(group.then_execute_step.clone()));
            }
        }

        Ok(match config_str(config, "else_execute_step") {
            Some(step) => ToolOutput::new().with_next_step(step),
            None => ToolOutput::new(),
        })
    }

    fn run_loop(
        &self,
        loop_config: &LoopConfig,
        inputs: &ValueMap,
        config: &ValueMap,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let total = total_iterations(loop_config.total_iterations_from.as_ref(), inputs)?;
        let body_start = loop_config.body_start()?;
        let counter_name = loop_config.counter_name()?;

        let count = match ctx.state.get_output(ctx.agent_id, counter_name) {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_u64().ok_or_else(|| {
                ToolError::LoopConfig(format!(
                    "counter '{}.{}' holds {} instead of a non-negative integer",
                    ctx.agent_id, counter_name, value
                ))
            })?,
        };

        let mut lists = ValueMap::new();
        for (accumulator, source) in &loop_config.accumulators {
            let mut items = match ctx.state.get_output(ctx.agent_id, accumulator) {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items.clone(),
                Some(other) => {
                    return Err(ToolError::LoopConfig(format!(
                        "accumulator '{}.{}' holds {} instead of a list",
                        ctx.agent_id, accumulator, other
                    )))
                }
            };
            if let Some(value) = inputs.get(source).filter(|v| is_accumulable(v)) {
                items.push(value.clone());
            }
            lists.insert(accumulator.clone(), Value::Array(items));
        }

        if count < total {
            info!(
                "Loop '{}' iteration {}/{}, re-entering at {}",
                ctx.agent_id,
                count + 1,
                total,
                body_start
            );
            let mut patch = lists;
            patch.insert(counter_name.to_string(), Value::from(count + 1));

            let mut output = ToolOutput::new()
                .with_next_step(body_start)
                .with_state_patch(patch);
            if !loop_config.loop_body_agents.is_empty() {
                output = output.with_clear_agents(loop_config.loop_body_agents.clone());
            }
            Ok(output)
        } else {
            info!("Loop '{}' finished after {} iterations", ctx.agent_id, count);
            let mut output = ToolOutput::from_outputs(lists);
            if let Some(step) = config_str(config, "else_execute_step") {
                output = output.with_next_step(step);
            }
            Ok(output)
        }
    }
}

#[async_trait]
impl Tool for ConditionalRouterTool {
    fn name(&self) -> &str {
        "ConditionalRouterTool"
    }

    /// Accumulator sources are absent on the call that precedes the first body run
    fn optional_inputs(&self, config: &ValueMap) -> Vec<String> {
        match Self::loop_config(config) {
            Ok(Some(loop_config)) => loop_config.accumulators.into_values().collect(),
            _ => Vec::new(),
        }
    }

    fn validate_config(&self, config: &ValueMap, input_names: &[&str]) -> Result<(), ToolError> {
        match Self::loop_config(config)? {
            Some(loop_config) => loop_config.check(input_names),
            None => Ok(()),
        }
    }

    async fn execute(
        &self,
        inputs: &ValueMap,
        config: &ValueMap,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        match Self::loop_config(config)? {
            Some(loop_config) => self.run_loop(&loop_config, inputs, config, ctx),
            None => self.route(inputs, config),
        }
    }
}

fn is_accumulable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Resolve the iteration bound from a literal or from a named input
fn total_iterations(source: Option<&Value>, inputs: &ValueMap) -> Result<u64, ToolError> {
    match source {
        None | Some(Value::Null) => Err(ToolError::LoopConfig(
            "total_iterations_from is missing".to_string(),
        )),
        Some(Value::String(input_name)) => {
            let value = inputs.get(input_name).ok_or_else(|| {
                ToolError::LoopConfig(format!(
                    "total iterations input '{}' not found in inputs (available: {:?})",
                    input_name,
                    inputs.keys().collect::<Vec<_>>()
                ))
            })?;
            as_iteration_count(value).ok_or_else(|| {
                ToolError::LoopConfig(format!(
                    "total iterations input '{}' is {} instead of a non-negative integer",
                    input_name, value
                ))
            })
        }
        Some(literal) => as_iteration_count(literal).ok_or_else(|| {
            ToolError::LoopConfig(format!(
                "total_iterations_from is {} instead of a non-negative integer",
                literal
            ))
        }),
    }
}

fn as_iteration_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

impl Operator {
    /// Whether `subject <op> expected` holds; type mismatches never match
    fn evaluate(self, subject: &Value, expected: &Value) -> bool {
        match self {
            Operator::Equals => values_equal(subject, expected),
            Operator::NotEquals => !values_equal(subject, expected),
            Operator::Contains => contains(subject, expected).unwrap_or(false),
            Operator::NotContains => contains(subject, expected).map(|c| !c).unwrap_or(false),
            Operator::Gt => compare(subject, expected) == Some(Ordering::Greater),
            Operator::Lt => compare(subject, expected) == Some(Ordering::Less),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// `None` when the subject cannot contain anything
fn contains(subject: &Value, needle: &Value) -> Option<bool> {
    match subject {
        Value::String(haystack) => Some(needle.as_str().is_some_and(|n| haystack.contains(n))),
        Value::Array(items) => Some(items.iter().any(|item| values_equal(item, needle))),
        Value::Object(map) => Some(needle.as_str().is_some_and(|key| map.contains_key(key))),
        _ => None,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    let x = a.as_f64()?;
    let y = b.as_f64()?;
    x.partial_cmp(&y)
}
