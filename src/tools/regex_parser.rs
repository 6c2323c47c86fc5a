//! Regex parser - named extractions from free text

use super::{Tool, ToolContext, ToolError, ToolOutput};
use crate::core::ValueMap;
use async_trait::async_trait;
use regex::RegexBuilder;
use serde_json::Value;

/// Value stored for a pattern that does not match
pub const NOT_FOUND: &str = "Not found";

/// Extracts capture group 1 of each configured pattern from `text_to_parse`
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexParserTool;

fn compile(pattern: &str, flags: &[Value]) -> Result<regex::Regex, ToolError> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.iter().filter_map(Value::as_str) {
        match flag.to_ascii_uppercase().as_str() {
            "DOTALL" | "S" => builder.dot_matches_new_line(true),
            "IGNORECASE" | "I" => builder.case_insensitive(true),
            "MULTILINE" | "M" => builder.multi_line(true),
            _ => &mut builder,
        };
    }
    builder
        .build()
        .map_err(|e| ToolError::Execution(format!("invalid pattern '{}': {}", pattern, e)))
}

fn first_group(regex: &regex::Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

#[async_trait]
impl Tool for RegexParserTool {
    fn name(&self) -> &str {
        "RegexParserTool"
    }

    async fn execute(
        &self,
        inputs: &ValueMap,
        config: &ValueMap,
        _ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, ToolError> {
        let text = match inputs.get("text_to_parse") {
            Some(Value::String(text)) if !text.is_empty() => text.clone(),
            Some(Value::Null) | None => {
                return Err(ToolError::InvalidInput(
                    "RegexParserTool requires 'text_to_parse' in inputs".to_string(),
                ))
            }
            Some(Value::String(_)) => {
                return Err(ToolError::InvalidInput(
                    "RegexParserTool received an empty 'text_to_parse'".to_string(),
                ))
            }
            Some(other) => other.to_string(),
        };

        let mut output = ToolOutput::new();

        if let Some(patterns) = config.get("patterns").and_then(Value::as_object) {
            for (key, pattern) in patterns {
                let pattern = pattern.as_str().ok_or_else(|| {
                    ToolError::Execution(format!("pattern for '{}' is not a string", key))
                })?;
                let value = first_group(&compile(pattern, &[])?, &text)
                    .unwrap_or_else(|| NOT_FOUND.to_string());
                output = output.with_output(key.clone(), Value::String(value));
            }
        }

        if let Some(body) = config.get("body_pattern").and_then(Value::as_object) {
            if let Some(pattern) = body.get("pattern").and_then(Value::as_str) {
                let flags = body
                    .get("flags")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let value = first_group(&compile(pattern, flags)?, &text).unwrap_or_default();
                output = output.with_output("body", Value::String(value));
            }
        }

        Ok(output)
    }
}
