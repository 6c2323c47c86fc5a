//! Code execution tool - runs a JavaScript snippet in an isolated Boa context
//!
//! The snippet sees its resolved inputs as a frozen `inputs` object and the
//! standard `JSON` global. It reports its result by assigning `output`. There is
//! no filesystem, network, module loader, `eval` or `Function` constructor.

use super::{Tool, ToolContext, ToolError, ToolOutput};
use crate::core::ValueMap;
use async_trait::async_trait;
use boa_engine::{Context, JsError, Source};
use serde_json::Value;
use std::time::Duration;
use tokio::task::spawn_blocking;
use tokio::time;
use tracing::{debug, warn};

/// Maximum execution time unless `timeout_secs` is configured
const MAX_EXECUTION_TIME: Duration = Duration::from_secs(30);

/// Stops runaway loops so a timed-out snippet does not hold its thread forever
const LOOP_ITERATION_LIMIT: u64 = 50_000_000;

/// Globals removed before the snippet runs
const PRELUDE: &str = "delete globalThis.eval;\ndelete globalThis.Function;\n";

/// Output key for a non-object result when the agent declares no outputs
const DEFAULT_OUTPUT_KEY: &str = "output";

/// Runs `tool_config.code` and returns what it assigned to `output`
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeExecutionTool;

impl CodeExecutionTool {
    fn code(config: &ValueMap) -> Result<&str, ToolError> {
        config
            .get("code")
            .and_then(Value::as_str)
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| {
                ToolError::InvalidInput(
                    "CodeExecutionTool requires 'code' in its tool_config.".to_string(),
                )
            })
    }

    fn timeout(config: &ValueMap) -> Duration {
        config
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(MAX_EXECUTION_TIME)
    }

    /// Wrap the snippet so the script's completion value is `output` as JSON text
    fn wrap_code(code: &str, inputs: &ValueMap) -> Result<String, ToolError> {
        let inputs = serde_json::to_string(inputs)
            .map_err(|e| ToolError::Execution(format!("inputs are not serializable: {}", e)))?;
        Ok(format!(
            "{PRELUDE}const inputs = Object.freeze({inputs});\n{code}\n;\nJSON.stringify(output);\n"
        ))
    }

    /// Evaluate in a fresh context; the error string is the script's own message
    fn execute_sync(script: &str) -> Result<Value, String> {
        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(LOOP_ITERATION_LIMIT);

        let result = context
            .eval(Source::from_bytes(script))
            .map_err(|err| describe(err, &mut context))?;

        if result.is_undefined() {
            return Ok(Value::Null);
        }

        let text = result
            .to_string(&mut context)
            .map_err(|err| describe(err, &mut context))?
            .to_std_string_escaped();
        serde_json::from_str(&text).map_err(|e| format!("output is not JSON: {}", e))
    }

    async fn run(script: String, timeout: Duration) -> Result<Value, String> {
        // Boa contexts are !Send, so the whole evaluation stays on one blocking thread
        time::timeout(timeout, spawn_blocking(move || Self::execute_sync(&script)))
            .await
            .map_err(|_| format!("execution timed out after {} seconds", timeout.as_secs()))?
            .map_err(|e| format!("execution task failed: {}", e))?
    }
}

fn describe(err: JsError, context: &mut Context) -> String {
    match err.try_native(context) {
        Ok(native) => native.to_string(),
        Err(_) => err.to_string(),
    }
}

/// An object result is the output map; anything else lands under one key
fn into_outputs(value: Value, output_fields: &[String]) -> ValueMap {
    match value {
        Value::Object(map) => map,
        other => {
            let key = output_fields
                .first()
                .map(String::as_str)
                .unwrap_or(DEFAULT_OUTPUT_KEY);
            let mut outputs = ValueMap::new();
            outputs.insert(key.to_string(), other);
            outputs
        }
    }
}

#[async_trait]
impl Tool for CodeExecutionTool {
    fn name(&self) -> &str {
        "CodeExecutionTool"
    }

    fn validate_config(&self, config: &ValueMap, _input_names: &[&str]) -> Result<(), ToolError> {
        Self::code(config).map(|_| ())
    }

    async fn execute(
        &self,
        inputs: &ValueMap,
        config: &ValueMap,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let script = Self::wrap_code(Self::code(config)?, inputs)?;
        debug!("{} running {} bytes of script", ctx.agent_id, script.len());

        match Self::run(script, Self::timeout(config)).await {
            Ok(value) => Ok(ToolOutput::from_outputs(into_outputs(
                value,
                ctx.output_fields,
            ))),
            Err(message) => {
                warn!("{} code execution failed: {}", ctx.agent_id, message);
                let mut outputs = ValueMap::new();
                outputs.insert(
                    "error".to_string(),
                    Value::String(format!("Error executing code: {}", message)),
                );
                Ok(ToolOutput::from_outputs(outputs))
            }
        }
    }
}
