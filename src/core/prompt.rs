//! Prompt rendering and list-response parsing for model agents

use crate::core::state::ValueMap;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Render `{name}` placeholders from `inputs`
///
/// `{{` and `}}` produce literal braces. Strings are inserted verbatim, any
/// other value as compact JSON. Errors carry a human-readable message.
pub fn render_prompt(template: &str, inputs: &ValueMap) -> Result<String, String> {
    let mut rendered = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    rendered.push('{');
                    continue;
                }

                let start = pos + 1;
                let end = loop {
                    match chars.next() {
                        Some((i, '}')) => break i,
                        Some(_) => {}
                        None => {
                            return Err(format!("unterminated placeholder at offset {}", pos))
                        }
                    }
                };

                let name = template[start..end].trim();
                if name.is_empty() {
                    return Err(format!("empty placeholder at offset {}", pos));
                }

                match inputs.get(name) {
                    Some(Value::String(s)) => rendered.push_str(s),
                    Some(other) => rendered.push_str(&other.to_string()),
                    None => return Err(format!("no input named '{}' for placeholder", name)),
                }
            }
            '}' => {
                if !matches!(chars.peek(), Some((_, '}'))) {
                    return Err(format!("single '}}' encountered at offset {}", pos));
                }
                chars.next();
                rendered.push('}');
            }
            _ => rendered.push(c),
        }
    }

    Ok(rendered)
}

fn list_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"^(?:[-*]\s+|\d+[.)]\s+)").expect("valid list marker regex"))
}

/// Split a model response into list items
///
/// Each non-empty line becomes an item with any leading `- `, `* ` or `1. `
/// marker removed.
pub fn parse_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .map(|line| list_marker().replace(line, "").trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
