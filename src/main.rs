use agent_pipeline::{
    agent::ModelClientConfig,
    cli::{
        commands::{RunCommand, ValidateCommand},
        output::*,
        prompt::ConsolePrompter,
        Cli, Command,
    },
    core::AgentKind,
    EngineError, EngineSettings, InputResolutionPolicy, ModelFailurePolicy, ModelInvoker,
    OllamaCliClient, OllamaClient, PipelineConfig, PipelineDefinition, PipelineRunner, ToolRegistry,
};
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let mut definition = config.to_definition()?;
    apply_input_overrides(&mut definition, &cmd.input)?;

    if !cmd.json {
        println!(
            "{} Loaded pipeline: {} from '{}'",
            CHECK,
            style(&definition.name).bold(),
            cmd.file
        );
    }

    let mut settings = EngineSettings::from_env();
    if let Some(max_steps) = cmd.max_steps {
        settings = settings.with_max_steps(max_steps);
    }
    if let Some(secs) = cmd.step_timeout {
        settings = settings.with_step_timeout(Duration::from_secs(secs));
    }
    if cmd.abort_on_model_error {
        settings = settings.with_model_failure_policy(ModelFailurePolicy::Abort);
    }

    let client_config =
        ModelClientConfig::default().with_server(cmd.ollama_host.clone(), cmd.ollama_port);
    let client: Arc<dyn ModelInvoker> = match &cmd.model_program {
        Some(program) => Arc::new(OllamaCliClient::from_config(
            client_config.with_program(program.clone()),
        )),
        None => Arc::new(OllamaClient::from_config(client_config)),
    };

    let spinner = AgentSpinner::new();
    let policy = if cmd.strict {
        InputResolutionPolicy::Strict
    } else {
        InputResolutionPolicy::Interactive(Arc::new(ConsolePrompter::new(spinner.clone())))
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let mut runner = PipelineRunner::new(client, settings)
        .with_input_policy(policy)
        .with_cancellation(cancel.clone());

    if !cmd.json {
        let events = spinner.clone();
        runner.add_event_handler(move |event| report_event(&events, &event));
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current agent");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let result = runner.run(&definition).await;
    spinner.finish();

    match result {
        Ok(report) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", format_final_outputs(&report.final_outputs));
            }
            Ok(())
        }
        Err(e) => {
            report_failure(&e);
            std::process::exit(1);
        }
    }
}

fn report_failure(e: &EngineError) {
    error!("Pipeline failed: {}", e);
    eprintln!(
        "{} {} ({}) in agent {}",
        CROSS,
        style("Pipeline failed").red().bold(),
        e.kind(),
        style(e.agent_id().unwrap_or("<none>")).cyan()
    );
    eprintln!("  {}", e);
}

/// Merge `--input key=value` pairs into the initial input
fn apply_input_overrides(
    definition: &mut PipelineDefinition,
    overrides: &[(String, String)],
) -> Result<()> {
    if overrides.is_empty() {
        return Ok(());
    }
    if definition.initial_input.is_null() {
        definition.initial_input = Value::Object(Default::default());
    }
    let Some(initial) = definition.initial_input.as_object_mut() else {
        bail!("--input requires the pipeline's initial_input to be an object");
    };
    for (key, value) in overrides {
        initial.insert(key.clone(), Value::String(value.clone()));
    }
    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    let config = match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Invalid pipeline '{}': {:#}", CROSS, cmd.file, e);
            std::process::exit(1);
        }
    };
    let definition = config.to_definition()?;
    let warnings = lint(&definition);

    if cmd.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "valid": true,
                "pipeline_name": definition.name,
                "start_agent": definition.start_agent,
                "agents": definition.agents().iter().map(|a| &a.id).collect::<Vec<_>>(),
                "warnings": warnings,
            }))?
        );
        return Ok(());
    }

    println!(
        "{} Pipeline {} is valid",
        CHECK,
        style(&definition.name).bold()
    );
    println!("  Start agent: {}", style(&definition.start_agent).cyan());
    println!("  Agents: {}", definition.agents().len());
    for agent in definition.agents() {
        let next = definition.routing.next(&agent.id).unwrap_or("<end>");
        println!("    {} → {}", style(&agent.id).cyan(), style(next).dim());
    }
    for warning in &warnings {
        println!("{}{}", WARN, warning);
    }

    Ok(())
}

/// Problems that only surface at run time
fn lint(definition: &PipelineDefinition) -> Vec<String> {
    let tools = ToolRegistry::with_builtin_tools();
    let mut warnings = Vec::new();
    for agent in definition.agents() {
        match &agent.kind {
            AgentKind::Tool(tool) if !tools.contains(&tool.tool_name) => warnings.push(format!(
                "Agent '{}' uses unknown tool '{}'",
                agent.id, tool.tool_name
            )),
            AgentKind::Named(named) if !tools.contains(&named.tool_name) => {
                warnings.push(format!(
                    "Agent '{}' has unsupported type '{}'",
                    agent.id, named.tool_name
                ))
            }
            _ => {}
        }
    }
    warnings
}
