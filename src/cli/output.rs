//! CLI output formatting

use crate::{core::ValueMap, execution::ExecutionEvent};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static ARROW: Emoji<'_, '_> = Emoji("➡️ ", "=> ");

const BANNER_WIDTH: usize = 50;

/// Spinner for the agent currently executing
///
/// Clones share the same bar so the input prompter can suspend it while it
/// reads from the terminal.
#[derive(Clone, Default)]
pub struct AgentSpinner {
    current: Arc<Mutex<Option<ProgressBar>>>,
}

impl AgentSpinner {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace any running spinner with a new one showing `message`
    pub fn start(&self, message: String) {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.set_message(message);
        progress.enable_steady_tick(Duration::from_millis(100));

        if let Some(previous) = self.slot().replace(progress) {
            previous.finish_and_clear();
        }
    }

    pub fn finish(&self) {
        if let Some(progress) = self.slot().take() {
            progress.finish_and_clear();
        }
    }

    /// Run `f` with the spinner hidden
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        let progress = self.slot().clone();
        match progress {
            Some(progress) => progress.suspend(f),
            None => f(),
        }
    }
}

/// Print an execution event, driving the spinner for running agents
pub fn report_event(spinner: &AgentSpinner, event: &ExecutionEvent) {
    match event {
        ExecutionEvent::AgentStarted { agent_id, step } => {
            spinner.start(format!("Step {}: {}", step, style(agent_id).cyan()));
        }
        ExecutionEvent::AgentCompleted { .. } | ExecutionEvent::PipelineFailed { .. } => {
            spinner.finish();
            println!("{}", format_execution_event(event));
        }
        _ => spinner.suspend(|| println!("{}", format_execution_event(event))),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
        } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::AgentStarted { agent_id, step } => {
            format!("{} [{}] {}", SPINNER, step, style(agent_id).cyan())
        }
        ExecutionEvent::InputSubstituted {
            agent_id,
            source_path,
        } => format!(
            "{} {} uses operator input for {}",
            INFO,
            style(agent_id).cyan(),
            style(source_path).yellow()
        ),
        ExecutionEvent::AgentCompleted {
            agent_id,
            output_keys,
            next_agent,
        } => {
            let outputs = if output_keys.is_empty() {
                String::new()
            } else {
                format!(" [{}]", output_keys.join(", "))
            };
            match next_agent {
                Some(next) => format!(
                    "{} {}{} → {}",
                    CHECK,
                    style(agent_id).green(),
                    style(outputs).dim(),
                    style(next).cyan()
                ),
                None => format!("{} {}{}", CHECK, style(agent_id).green(), style(outputs).dim()),
            }
        }
        ExecutionEvent::OutputsCleared {
            cleared_by,
            agent_id,
            keys,
        } => format!(
            "{} {} cleared {} output(s) of {}",
            INFO,
            style(cleared_by).dim(),
            keys.len(),
            style(agent_id).yellow()
        ),
        ExecutionEvent::PipelineCompleted {
            execution_id,
            steps,
        } => format!(
            "{} Pipeline ({}) {} after {} steps",
            INFO,
            style(&execution_id.to_string()[..8]).dim(),
            style("completed").green(),
            steps
        ),
        ExecutionEvent::PipelineFailed {
            agent_id,
            kind,
            error,
            ..
        } => format!(
            "{} {} in {}: {}",
            CROSS,
            style(kind).red(),
            style(agent_id.as_deref().unwrap_or("<pipeline>")).red(),
            style(error).dim()
        ),
    }
}

/// Human-readable form of an output label: `final_story` becomes `Final Story`
pub fn format_label(key: &str) -> String {
    key.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_item(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Format the final outputs block printed after a successful run
pub fn format_final_outputs(outputs: &ValueMap) -> String {
    let rule = "=".repeat(BANNER_WIDTH);
    let mut lines = vec![
        String::new(),
        rule.clone(),
        format!("{:^width$}", "FINAL PIPELINE OUTPUTS", width = BANNER_WIDTH)
            .trim_end()
            .to_string(),
        rule.clone(),
    ];

    if outputs.is_empty() {
        lines.push("No final outputs were defined in the pipeline configuration.".to_string());
    }

    for (key, value) in outputs {
        lines.push(String::new());
        lines.push(format!("{}{}:", ARROW, format_label(key)));
        match value {
            Value::Array(items) => {
                lines.extend(items.iter().map(|item| format!("  - {}", format_item(item))));
            }
            Value::String(text) => lines.push(format!("  {}", text)),
            other => {
                let pretty =
                    serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string());
                lines.push(format!("  {}", pretty));
            }
        }
    }

    lines.push(String::new());
    lines.push(rule);
    lines.join("\n")
}
