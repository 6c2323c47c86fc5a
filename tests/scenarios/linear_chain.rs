//! Linear chains: model agents feeding a tool through static routing

use crate::helpers::*;
use agent_pipeline::{EngineSettings, PipelineConfig, PipelineRunner};
use serde_json::json;

fn story_chain() -> serde_json::Value {
    json!({
        "pipeline_name": "Story Chain",
        "initial_input": {"setting": {"place": "Mars"}},
        "start_agent": "names",
        "agents": [
            {
                "id": "names",
                "type": "llm_agent",
                "model": "llama3",
                "prompt_template": "Name two heroes.",
                "output_format": "list",
                "outputs": ["heroes"]
            },
            {
                "id": "draft",
                "type": "llm_agent",
                "prompt_template": "Write about {heroes} on {place}.",
                "inputs": {
                    "heroes": "names.heroes",
                    "place": "pipeline.initial_input.setting.place"
                },
                "outputs": ["story"]
            },
            {
                "id": "parse",
                "type": "tool_agent",
                "tool_name": "RegexParserTool",
                "tool_config": {
                    "patterns": {"title": "Title: (.*)"},
                    "body_pattern": {"pattern": "---\\n(.*)", "flags": ["DOTALL"]}
                },
                "inputs": {"text_to_parse": "draft.story"},
                "outputs": ["title", "body"]
            }
        ],
        "routing": {
            "names": {"next": "draft"},
            "draft": {"next": "parse"},
            "parse": {"next": null}
        },
        "final_outputs": {
            "heroes": "names.heroes",
            "title": "parse.title",
            "body": "parse.body",
            "missing": "parse.subtitle"
        }
    })
}

#[tokio::test]
async fn test_three_step_chain() {
    let model = ScriptedModel::new(&[
        "1. Ada\n2. Bo",
        "Title: Red Dust\n---\nThey landed.\nThey stayed.",
    ]);
    let (events, handler) = event_log();
    let mut runner = PipelineRunner::new(model.clone(), EngineSettings::default());
    runner.add_event_handler(handler);

    let report = runner.run(&pipeline(story_chain())).await.unwrap();

    assert_eq!(report.executed_agents(), vec!["names", "draft", "parse"]);
    assert_eq!(report.final_outputs["heroes"], json!(["Ada", "Bo"]));
    assert_eq!(report.final_outputs["title"], json!("Red Dust"));
    assert_eq!(report.final_outputs["body"], json!("They landed.\nThey stayed."));
    assert_eq!(
        report.final_outputs["missing"],
        json!("Error: Output 'parse.subtitle' not found in final state")
    );

    // Lists render as JSON inside prompts
    assert_eq!(
        model.prompts(),
        vec![
            "Name two heroes.".to_string(),
            "Write about [\"Ada\",\"Bo\"] on Mars.".to_string()
        ]
    );
    // Agents without a model use the engine default
    assert_eq!(model.models(), vec!["llama3".to_string(), "phi4:latest".to_string()]);

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "pipeline started",
            "start names",
            "done names",
            "start draft",
            "done draft",
            "start parse",
            "done parse",
            "pipeline completed"
        ]
    );
}

#[tokio::test]
async fn test_default_model_from_settings() {
    let model = ScriptedModel::new(&["1. Ada", "Title: T\n---\nB"]);
    let settings = EngineSettings::default().with_default_model("mistral:7b");
    let runner = PipelineRunner::new(model.clone(), settings);

    runner.run(&pipeline(story_chain())).await.unwrap();
    assert_eq!(model.models()[1], "mistral:7b");
}

#[tokio::test]
async fn test_yaml_pipeline() {
    let yaml = r#"
pipeline_name: "Greeting"
initial_input: "Grace"
start_agent: greet
agents:
  - id: greet
    type: llm_agent
    prompt_template: "Greet {name}."
    inputs:
      name: pipeline.initial_input
    outputs: [greeting]
  - id: collect
    type: DataAggregatorTool
    tool_config:
      sources:
        message: greeting
    inputs:
      greeting: greet.greeting
    outputs: [message]
routing:
  greet:
    next: collect
final_outputs:
  message: collect.message
"#;
    let definition = PipelineConfig::from_yaml(yaml).unwrap().to_definition().unwrap();
    let model = ScriptedModel::new(&["Hello, Grace!"]);
    let runner = PipelineRunner::new(model.clone(), EngineSettings::default());

    let report = runner.run(&definition).await.unwrap();

    assert_eq!(model.prompts(), vec!["Greet Grace.".to_string()]);
    assert_eq!(report.final_outputs["message"], json!("Hello, Grace!"));
    // No route out of `collect` ends the run
    assert_eq!(report.step_count(), 2);
}

#[tokio::test]
async fn test_code_tool_consumes_model_list() {
    let definition = pipeline(json!({
        "pipeline_name": "Count",
        "start_agent": "names",
        "agents": [
            {
                "id": "names",
                "type": "llm_agent",
                "prompt_template": "Name some heroes.",
                "output_format": "list",
                "outputs": ["heroes"]
            },
            {
                "id": "count",
                "type": "tool_agent",
                "tool_name": "CodeExecutionTool",
                "tool_config": {
                    "code": "output = {total: inputs.heroes.length, first: inputs.heroes[0]};"
                },
                "inputs": {"heroes": "names.heroes"},
                "outputs": ["total", "first"]
            }
        ],
        "routing": {"names": {"next": "count"}},
        "final_outputs": {"total": "count.total", "first": "count.first"}
    }));
    let model = ScriptedModel::new(&["- Ada\n- Bo\n- Cy"]);
    let runner = PipelineRunner::new(model, EngineSettings::default());

    let report = runner.run(&definition).await.unwrap();

    assert_eq!(report.final_outputs["total"], json!(3));
    assert_eq!(report.final_outputs["first"], json!("Ada"));
}
