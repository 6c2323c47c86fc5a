//! Structured data parser - model-assisted field extraction

use super::{config_str, Tool, ToolContext, ToolError, ToolOutput};
use crate::core::ValueMap;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// Value stored for a field the model did not return
pub const FIELD_NOT_FOUND: &str = "Not found";

/// Value stored for every field when the model reply is not a JSON object
pub const PARSE_FAILURE: &str = "Error: Failed to parse";

const DEFAULT_INSTRUCTIONS: &str = "Extract the requested fields.";

/// Asks a model to turn `natural_language_request` into the agent's output fields
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredDataParserTool;

fn build_prompt(instructions: &str, fields: &[String], request: &str) -> String {
    format!(
        "You are an expert data extraction tool. Your sole purpose is to extract structured \
         data from a user's request and respond ONLY with a valid JSON object.\n\n\
         Extraction Instructions: {}\n\
         Desired JSON keys: {}\n\n\
         User Request: \"{}\"\n\n\
         JSON Output:",
        instructions,
        fields.join(", "),
        request
    )
}

/// The span from the first `{` to the last `}`, if any
fn json_span(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

#[async_trait]
impl Tool for StructuredDataParserTool {
    fn name(&self) -> &str {
        "StructuredDataParserTool"
    }

    async fn execute(
        &self,
        inputs: &ValueMap,
        config: &ValueMap,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let request = match inputs.get("natural_language_request") {
            Some(Value::String(text)) if !text.is_empty() => text.clone(),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(ToolError::InvalidInput(
                    "StructuredDataParserTool requires 'natural_language_request' in inputs"
                        .to_string(),
                ))
            }
            Some(other) => other.to_string(),
        };

        let model = config_str(config, "model")
            .filter(|m| !m.is_empty())
            .unwrap_or(ctx.settings.default_structured_model.as_str());
        let instructions = config_str(config, "instructions").unwrap_or(DEFAULT_INSTRUCTIONS);

        let prompt = build_prompt(instructions, ctx.output_fields, &request);
        debug!("Structured extraction prompt for {}: {}", ctx.agent_id, prompt);

        let reply = ctx.models.complete(model, &prompt).await?;

        let parsed = json_span(&reply)
            .and_then(|span| serde_json::from_str::<Value>(span).ok())
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            });

        let outputs = match parsed {
            Some(mut fields) => {
                for field in ctx.output_fields {
                    fields
                        .entry(field.clone())
                        .or_insert_with(|| Value::from(FIELD_NOT_FOUND));
                }
                fields
            }
            None => {
                warn!(
                    "Agent '{}' could not parse model reply as JSON: {}",
                    ctx.agent_id, reply
                );
                ctx.output_fields
                    .iter()
                    .map(|field| (field.clone(), Value::from(PARSE_FAILURE)))
                    .collect()
            }
        };

        Ok(ToolOutput::from_outputs(outputs))
    }
}
