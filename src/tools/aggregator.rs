//! Data aggregator - renames and collects inputs into one output map

use super::{Tool, ToolContext, ToolError, ToolOutput};
use crate::core::ValueMap;
use async_trait::async_trait;
use serde_json::Value;

/// Copies inputs to new keys as configured by `sources` (new key -> input name)
#[derive(Debug, Clone, Copy, Default)]
pub struct DataAggregatorTool;

#[async_trait]
impl Tool for DataAggregatorTool {
    fn name(&self) -> &str {
        "DataAggregatorTool"
    }

    async fn execute(
        &self,
        inputs: &ValueMap,
        config: &ValueMap,
        _ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let Some(sources) = config.get("sources").and_then(Value::as_object) else {
            return Ok(ToolOutput::new());
        };

        let mut outputs = ValueMap::new();
        for (new_key, source) in sources {
            let source = source.as_str().ok_or_else(|| {
                ToolError::Execution(format!("source for '{}' is not an input name", new_key))
            })?;
            let value = inputs.get(source).cloned().unwrap_or_else(|| {
                Value::String(format!("Source key '{}' not found in inputs.", source))
            });
            outputs.insert(new_key.clone(), value);
        }

        Ok(ToolOutput::from_outputs(outputs))
    }
}
