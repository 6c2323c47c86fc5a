//! Interactive substitution of unresolved inputs

use super::output::{style, AgentSpinner, WARN};
use crate::core::{InputPrompter, InputRequest};
use console::Term;

/// Asks the operator on the terminal for a value when an input is missing
pub struct ConsolePrompter {
    term: Term,
    spinner: AgentSpinner,
}

impl ConsolePrompter {
    pub fn new(spinner: AgentSpinner) -> Self {
        Self {
            term: Term::stderr(),
            spinner,
        }
    }

    fn ask(&self, request: &InputRequest<'_>) -> std::io::Result<String> {
        self.term.write_line(&format!(
            "{}Input '{}' for agent {} is missing (source: {})",
            WARN,
            style(request.input).yellow(),
            style(request.agent_id).cyan(),
            style(request.source_path).dim()
        ))?;
        self.term.write_str("Please provide a value: ")?;
        self.term.read_line()
    }
}

impl InputPrompter for ConsolePrompter {
    fn provide(&self, request: &InputRequest<'_>) -> Option<String> {
        if !self.term.is_term() {
            return None;
        }
        match self.spinner.suspend(|| self.ask(request)) {
            Ok(value) => Some(value.trim().to_string()),
            Err(e) => {
                tracing::warn!("Could not read input for {}: {}", request.input, e);
                None
            }
        }
    }
}
