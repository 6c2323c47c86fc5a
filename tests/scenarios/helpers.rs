//! Test utilities: a scripted model and pipeline builders

use agent_pipeline::{
    ExecutionEvent, ModelError, ModelInvoker, PipelineConfig, PipelineDefinition,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Model that answers with predefined replies in order
///
/// Records every `(model, prompt)` it receives. Fails once the script runs out.
pub struct ScriptedModel {
    replies: Vec<String>,
    index: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            index: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// A model whose every call fails
    pub fn failing() -> Arc<Self> {
        Self::new(&[])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    pub fn models(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .map(|(model, _)| model.clone())
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelInvoker for ScriptedModel {
    async fn invoke(&self, model: &str, prompt: &str) -> Result<String, ModelError> {
        self.prompts
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));

        let idx = self.index.fetch_add(1, Ordering::SeqCst);
        self.replies.get(idx).cloned().ok_or_else(|| {
            ModelError::Api(format!("ScriptedModel: no reply for request {}", idx + 1))
        })
    }
}

/// Parse and validate a pipeline written as JSON
pub fn pipeline(json: Value) -> PipelineDefinition {
    PipelineConfig::from_json(&json.to_string())
        .expect("Should parse pipeline")
        .to_definition()
        .expect("Should build definition")
}

/// Shared sink collecting a label per event
pub fn event_log() -> (Arc<Mutex<Vec<String>>>, impl Fn(ExecutionEvent) + Send + Sync + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let handler = move |event: ExecutionEvent| {
        let label = match event {
            ExecutionEvent::PipelineStarted { .. } => "pipeline started".to_string(),
            ExecutionEvent::AgentStarted { agent_id, .. } => format!("start {}", agent_id),
            ExecutionEvent::InputSubstituted { source_path, .. } => {
                format!("substituted {}", source_path)
            }
            ExecutionEvent::AgentCompleted { agent_id, .. } => format!("done {}", agent_id),
            ExecutionEvent::OutputsCleared {
                cleared_by,
                agent_id,
                ..
            } => format!("{} cleared {}", cleared_by, agent_id),
            ExecutionEvent::PipelineCompleted { .. } => "pipeline completed".to_string(),
            ExecutionEvent::PipelineFailed { kind, .. } => format!("failed {}", kind),
        };
        sink.lock().unwrap().push(label);
    };
    (log, handler)
}
