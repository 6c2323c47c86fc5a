//! Bounded loops driven by the conditional router

use crate::helpers::*;
use agent_pipeline::{EngineSettings, PipelineRunner};
use serde_json::json;

fn chapter_loop(chapters: serde_json::Value) -> agent_pipeline::PipelineDefinition {
    pipeline(json!({
        "pipeline_name": "Chapter Loop",
        "initial_input": {"topic": "Mars", "chapters": chapters},
        "start_agent": "loop",
        "agents": [
            {
                "id": "loop",
                "type": "tool_agent",
                "tool_name": "ConditionalRouterTool",
                "tool_config": {
                    "loop_config": {
                        "total_iterations_from": "chapters",
                        "loop_body_start_id": "write",
                        "counter_name": "iteration",
                        "accumulators": {"chapters_written": "chapter"},
                        "loop_body_agents": ["write"]
                    },
                    "else_execute_step": "summary"
                },
                "inputs": {
                    "chapters": "pipeline.initial_input.chapters",
                    "chapter": "write.chapter"
                },
                "outputs": ["chapters_written"]
            },
            {
                "id": "write",
                "type": "llm_agent",
                "prompt_template": "Write chapter {n} about {topic}.",
                "inputs": {
                    "n": "loop.iteration",
                    "topic": "pipeline.initial_input.topic"
                },
                "outputs": ["chapter"]
            },
            {
                "id": "summary",
                "type": "tool_agent",
                "tool_name": "DataAggregatorTool",
                "tool_config": {"sources": {"all": "chapters"}},
                "inputs": {"chapters": "loop.chapters_written"},
                "outputs": ["all"]
            }
        ],
        "routing": {
            "write": {"next": "loop"},
            "summary": {"next": null}
        },
        "final_outputs": {
            "chapters": "summary.all",
            "iterations": "loop.iteration"
        }
    }))
}

#[tokio::test]
async fn test_loop_runs_body_n_times_and_accumulates() {
    let model = ScriptedModel::new(&["Chapter A", "Chapter B", "Chapter C"]);
    let (events, handler) = event_log();
    let mut runner = PipelineRunner::new(model.clone(), EngineSettings::default());
    runner.add_event_handler(handler);

    let report = runner.run(&chapter_loop(json!(3))).await.unwrap();

    assert_eq!(
        report.executed_agents(),
        vec!["loop", "write", "loop", "write", "loop", "write", "loop", "summary"]
    );
    assert_eq!(
        report.final_outputs["chapters"],
        json!(["Chapter A", "Chapter B", "Chapter C"])
    );
    assert_eq!(report.final_outputs["iterations"], json!(3));
    assert_eq!(
        model.prompts(),
        vec![
            "Write chapter 1 about Mars.".to_string(),
            "Write chapter 2 about Mars.".to_string(),
            "Write chapter 3 about Mars.".to_string()
        ]
    );

    // Each continuation clears the body; termination does not
    let events = events.lock().unwrap();
    assert_eq!(
        events.iter().filter(|e| *e == "loop cleared write").count(),
        3
    );
    assert_eq!(
        report.state.get_output("write", "chapter"),
        Some(&json!("Chapter C"))
    );
}

#[tokio::test]
async fn test_iteration_count_as_string() {
    let model = ScriptedModel::new(&["Only chapter"]);
    let runner = PipelineRunner::new(model.clone(), EngineSettings::default());

    let report = runner.run(&chapter_loop(json!("1"))).await.unwrap();

    assert_eq!(model.calls(), 1);
    assert_eq!(report.final_outputs["chapters"], json!(["Only chapter"]));
}

#[tokio::test]
async fn test_zero_iterations_skip_body() {
    let model = ScriptedModel::failing();
    let runner = PipelineRunner::new(model.clone(), EngineSettings::default());

    let report = runner.run(&chapter_loop(json!(0))).await.unwrap();

    assert_eq!(report.executed_agents(), vec!["loop", "summary"]);
    assert_eq!(model.calls(), 0);
    assert_eq!(report.final_outputs["chapters"], json!([]));
    assert_eq!(
        report.final_outputs["iterations"],
        json!("Error: Output 'loop.iteration' not found in final state")
    );
}

#[tokio::test]
async fn test_invalid_iteration_count_fails_in_router() {
    let model = ScriptedModel::failing();
    let runner = PipelineRunner::new(model, EngineSettings::default());

    let err = runner.run(&chapter_loop(json!("many"))).await.unwrap_err();

    assert_eq!(err.kind(), "LoopConfigError");
    assert_eq!(err.agent_id(), Some("loop"));
}

#[tokio::test]
async fn test_step_limit_stops_runaway_loop() {
    let model = ScriptedModel::new(&["A", "B", "C", "D", "E"]);
    let settings = EngineSettings::default().with_max_steps(4);
    let runner = PipelineRunner::new(model, settings);

    let err = runner.run(&chapter_loop(json!(5))).await.unwrap_err();

    assert_eq!(err.kind(), "StepLimitExceededError");
    assert_eq!(err.agent_id(), Some("loop"));
}
