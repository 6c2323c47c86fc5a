//! Condition-based routing and next-step precedence

use crate::helpers::*;
use agent_pipeline::{EngineSettings, PipelineRunner};
use serde_json::json;

fn review_pipeline() -> agent_pipeline::PipelineDefinition {
    pipeline(json!({
        "pipeline_name": "Review",
        "initial_input": {"text": "The launch went well."},
        "start_agent": "classify",
        "agents": [
            {
                "id": "classify",
                "type": "llm_agent",
                "prompt_template": "Classify: {text}",
                "inputs": {"text": "pipeline.initial_input.text"},
                "outputs": ["label"]
            },
            {
                "id": "router",
                "type": "tool_agent",
                "tool_name": "ConditionalRouterTool",
                "tool_config": {
                    "condition_groups": [
                        {
                            "if": {"variable": "label", "operator": "contains", "value": "positive"},
                            "then_execute_step": "celebrate"
                        }
                    ],
                    "else_execute_step": "console"
                },
                "inputs": {"label": "classify.label"},
                "outputs": []
            },
            {
                "id": "celebrate",
                "type": "llm_agent",
                "prompt_template": "Celebrate!",
                "outputs": ["message"]
            },
            {
                "id": "console",
                "type": "llm_agent",
                "prompt_template": "Console!",
                "outputs": ["message"]
            }
        ],
        "routing": {
            "classify": {"next": "router"},
            "router": {"next": "console"},
            "celebrate": {"next": null},
            "console": {"next": null}
        },
        "final_outputs": {
            "celebration": "celebrate.message",
            "consolation": "console.message"
        }
    }))
}

#[tokio::test]
async fn test_matching_condition_overrides_static_route() {
    let model = ScriptedModel::new(&["positive", "Hooray"]);
    let runner = PipelineRunner::new(model, EngineSettings::default());

    let report = runner.run(&review_pipeline()).await.unwrap();

    assert_eq!(report.executed_agents(), vec!["classify", "router", "celebrate"]);
    assert_eq!(report.final_outputs["celebration"], json!("Hooray"));
    assert_eq!(report.steps[1].next_agent.as_deref(), Some("celebrate"));
}

#[tokio::test]
async fn test_else_branch() {
    let model = ScriptedModel::new(&["negative", "There there"]);
    let runner = PipelineRunner::new(model, EngineSettings::default());

    let report = runner.run(&review_pipeline()).await.unwrap();

    assert_eq!(report.executed_agents(), vec!["classify", "router", "console"]);
    assert_eq!(report.final_outputs["consolation"], json!("There there"));
    assert_eq!(
        report.final_outputs["celebration"],
        json!("Error: Output 'celebrate.message' not found in final state")
    );
}

#[tokio::test]
async fn test_router_without_match_or_else_follows_routing() {
    let definition = pipeline(json!({
        "pipeline_name": "Fallthrough",
        "initial_input": {"score": 3},
        "start_agent": "gate",
        "agents": [
            {
                "id": "gate",
                "type": "ConditionalRouterTool",
                "tool_config": {
                    "condition_groups": [
                        {
                            "if": {"variable": "score", "operator": "gt", "value": 5},
                            "then_execute_step": "praise"
                        }
                    ]
                },
                "inputs": {"score": "pipeline.initial_input.score"}
            },
            {"id": "praise", "type": "llm_agent", "prompt_template": "Praise", "outputs": ["text"]},
            {"id": "coach", "type": "llm_agent", "prompt_template": "Coach", "outputs": ["text"]}
        ],
        "routing": {"gate": {"next": "coach"}},
        "final_outputs": {"advice": "coach.text"}
    }));
    let model = ScriptedModel::new(&["Keep going"]);
    let runner = PipelineRunner::new(model.clone(), EngineSettings::default());

    let report = runner.run(&definition).await.unwrap();

    assert_eq!(report.executed_agents(), vec!["gate", "coach"]);
    assert_eq!(model.prompts(), vec!["Coach".to_string()]);
    assert_eq!(report.final_outputs["advice"], json!("Keep going"));
}
