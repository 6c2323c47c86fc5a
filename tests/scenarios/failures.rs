//! Fatal errors and degraded model calls

use crate::helpers::*;
use agent_pipeline::{
    agent::MODEL_FAILURE_SENTINEL, EngineError, EngineSettings, ModelFailurePolicy,
    PipelineConfig, PipelineRunner,
};
use serde_json::json;

fn single_agent(agent: serde_json::Value) -> agent_pipeline::PipelineDefinition {
    pipeline(json!({
        "pipeline_name": "Single",
        "initial_input": {"topic": "Mars"},
        "start_agent": "only",
        "agents": [agent],
        "final_outputs": {"result": "only.text"}
    }))
}

#[tokio::test]
async fn test_unknown_tool() {
    let definition = single_agent(json!({
        "id": "only", "type": "tool_agent", "tool_name": "ShellTool"
    }));
    let runner = PipelineRunner::new(ScriptedModel::failing(), EngineSettings::default());

    let err = runner.run(&definition).await.unwrap_err();

    assert_eq!(err.kind(), "UnknownToolError");
    assert_eq!(err.agent_id(), Some("only"));
    assert!(err.to_string().contains("ShellTool"));
}

#[tokio::test]
async fn test_unsupported_agent_type() {
    let definition = single_agent(json!({"id": "only", "type": "code_agent"}));
    let (events, handler) = event_log();
    let mut runner = PipelineRunner::new(ScriptedModel::failing(), EngineSettings::default());
    runner.add_event_handler(handler);

    let err = runner.run(&definition).await.unwrap_err();

    assert_eq!(err.kind(), "UnsupportedAgentTypeError");
    assert_eq!(
        events.lock().unwrap().last().map(String::as_str),
        Some("failed UnsupportedAgentTypeError")
    );
}

#[tokio::test]
async fn test_unknown_routing_target() {
    let definition = pipeline(json!({
        "pipeline_name": "Dangling",
        "start_agent": "first",
        "agents": [{"id": "first", "type": "llm_agent", "prompt_template": "Hi", "outputs": ["text"]}],
        "routing": {"first": {"next": "second"}}
    }));
    let runner = PipelineRunner::new(ScriptedModel::new(&["hello"]), EngineSettings::default());

    let err = runner.run(&definition).await.unwrap_err();

    assert_eq!(err.kind(), "UnknownAgentError");
    assert_eq!(err.agent_id(), Some("first"));
    assert!(err.to_string().contains("second"));
}

#[test]
fn test_unknown_start_agent_rejected_at_load() {
    let json = json!({
        "pipeline_name": "No Start",
        "start_agent": "missing",
        "agents": [{"id": "a", "type": "llm_agent", "prompt_template": "x", "outputs": ["t"]}]
    });
    assert!(PipelineConfig::from_json(&json.to_string()).is_err());
}

/// Body-first loop whose router lacks a counter name
fn body_first_loop() -> serde_json::Value {
    json!({
        "pipeline_name": "Body First",
        "initial_input": {"n": 2},
        "start_agent": "gen",
        "agents": [
            {"id": "gen", "type": "llm_agent", "prompt_template": "Item", "outputs": ["item"]},
            {
                "id": "loop",
                "type": "tool_agent",
                "tool_name": "ConditionalRouterTool",
                "tool_config": {
                    "loop_config": {
                        "total_iterations_from": "n",
                        "loop_body_start_id": "gen",
                        "accumulators": {"items": "item"},
                        "loop_body_agents": ["gen"]
                    },
                    "else_execute_step": "done"
                },
                "inputs": {"n": "pipeline.initial_input.n", "item": "gen.item"}
            },
            {"id": "done", "type": "llm_agent", "prompt_template": "Done", "outputs": ["text"]}
        ],
        "routing": {"gen": {"next": "loop"}}
    })
}

#[tokio::test]
async fn test_loop_config_error_before_body_runs() {
    let err = PipelineConfig::from_json(&body_first_loop().to_string()).unwrap_err();
    let err = err.downcast_ref::<EngineError>().unwrap();
    assert_eq!(err.kind(), "LoopConfigError");
    assert_eq!(err.agent_id(), Some("loop"));

    // Skipping the loader does not skip the check
    let config: PipelineConfig = serde_json::from_value(body_first_loop()).unwrap();
    assert_eq!(config.to_definition().unwrap_err().kind(), "LoopConfigError");

    // With the counter name present the body runs as usual
    let mut fixed = body_first_loop();
    fixed["agents"][1]["tool_config"]["loop_config"]["counter_name"] = json!("round");
    let model = ScriptedModel::new(&["a", "b", "c", "finished"]);
    let runner = PipelineRunner::new(model.clone(), EngineSettings::default());
    let report = runner.run(&pipeline(fixed)).await.unwrap();
    assert_eq!(model.calls(), 4);
    assert_eq!(report.state.get_output("loop", "items"), Some(&json!(["a", "b", "c"])));
}

#[tokio::test]
async fn test_missing_input_in_strict_mode() {
    let definition = single_agent(json!({
        "id": "only",
        "type": "llm_agent",
        "prompt_template": "About {hero}",
        "inputs": {"hero": "pipeline.initial_input.hero"},
        "outputs": ["text"]
    }));
    let model = ScriptedModel::new(&["unused"]);
    let runner = PipelineRunner::new(model.clone(), EngineSettings::default());

    let err = runner.run(&definition).await.unwrap_err();

    assert_eq!(err.kind(), "MissingInputError");
    assert!(err.to_string().contains("pipeline.initial_input.hero"));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_literal_inputs_need_no_state() {
    let definition = single_agent(json!({
        "id": "only",
        "type": "llm_agent",
        "prompt_template": "Count to {n}",
        "inputs": {"n": 3},
        "outputs": ["text"]
    }));
    let model = ScriptedModel::new(&["1 2 3"]);
    let runner = PipelineRunner::new(model.clone(), EngineSettings::default());

    let report = runner.run(&definition).await.unwrap();

    assert_eq!(model.prompts(), vec!["Count to 3".to_string()]);
    assert_eq!(report.final_outputs["result"], json!("1 2 3"));
}

#[tokio::test]
async fn test_unknown_placeholder() {
    let definition = single_agent(json!({
        "id": "only",
        "type": "llm_agent",
        "prompt_template": "About {villain}",
        "inputs": {"topic": "pipeline.initial_input.topic"},
        "outputs": ["text"]
    }));
    let runner = PipelineRunner::new(ScriptedModel::new(&["unused"]), EngineSettings::default());

    let err = runner.run(&definition).await.unwrap_err();
    assert_eq!(err.kind(), "PromptFormatError");
}

#[tokio::test]
async fn test_model_failure_degrades_by_default() {
    let definition = single_agent(json!({
        "id": "only",
        "type": "llm_agent",
        "prompt_template": "About {topic}",
        "inputs": {"topic": "pipeline.initial_input.topic"},
        "outputs": ["text"]
    }));
    let runner = PipelineRunner::new(ScriptedModel::failing(), EngineSettings::default());

    let report = runner.run(&definition).await.unwrap();
    assert_eq!(report.final_outputs["result"], json!(MODEL_FAILURE_SENTINEL));
}

#[tokio::test]
async fn test_model_failure_aborts_when_configured() {
    let definition = single_agent(json!({
        "id": "only",
        "type": "llm_agent",
        "prompt_template": "About {topic}",
        "inputs": {"topic": "pipeline.initial_input.topic"},
        "outputs": ["text"]
    }));
    let settings = EngineSettings::default().with_model_failure_policy(ModelFailurePolicy::Abort);
    let runner = PipelineRunner::new(ScriptedModel::failing(), settings);

    let err = runner.run(&definition).await.unwrap_err();
    assert_eq!(err.kind(), "ModelError");
    assert_eq!(err.agent_id(), Some("only"));
}
