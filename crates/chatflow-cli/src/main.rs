// crates/chatflow-cli/src/main.rs

use anyhow::{bail, Result};
use chatflow_core::{
    ExecutionEvent, ExecutionStatus, InboundMessage, StepDeclaration, StepEvent, Value,
    WorkflowDefinition,
};
use chatflow_runtime::{validate_definition, RuntimeConfig, WorkflowService};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chatflow")]
#[command(about = "Chat workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file against one message
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Message payload as a JSON object
        #[arg(short, long, default_value = "{}")]
        message: String,

        /// Identifier recorded for the message
        #[arg(long, default_value = "cli-message")]
        message_id: String,

        /// Fail the run after this many steps
        #[arg(long)]
        max_steps: Option<usize>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            message,
            message_id,
            max_steps,
            verbose,
        } => {
            init_tracing(verbose);
            run_workflow(file, message, message_id, max_steps).await?;
        }

        Commands::Validate { file } => {
            init_tracing(false);
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_workflow(file: &PathBuf) -> Result<WorkflowDefinition> {
    let workflow_json = std::fs::read_to_string(file)?;
    let workflow: WorkflowDefinition = serde_json::from_str(&workflow_json)?;
    tracing::debug!("Loaded workflow {} with {} steps", workflow.id, workflow.steps.len());
    Ok(workflow)
}

async fn run_workflow(
    file: PathBuf,
    message: String,
    message_id: String,
    max_steps: Option<usize>,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(&file)?;
    let workflow_id = workflow.id.clone();

    println!("📋 Workflow: {} (v{})", workflow.name, workflow.version);
    println!("   Steps: {}", workflow.steps.len());
    println!("   Edges: {}", workflow.edges.len());
    println!();

    let payload: serde_json::Value = serde_json::from_str(&message)?;
    if !payload.is_object() {
        bail!("Message must be a JSON object");
    }
    let message = InboundMessage::new(message_id, Value::from_json(payload));

    let config = RuntimeConfig {
        max_steps,
        ..RuntimeConfig::default()
    };
    let service = WorkflowService::with_config(Arc::new(chatflow_nodes::standard_registry()), config);
    service.register_workflow(workflow).await;

    // Subscribe to events for real-time output
    let mut events = service.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::WorkflowStarted { message_id, .. } => {
                    println!("▶️  Workflow started for message {}", message_id);
                }
                ExecutionEvent::StepStarted { step_id, step_type, .. } => {
                    println!("  ⚡ Starting step: {} ({})", step_id, step_type);
                }
                ExecutionEvent::StepCompleted {
                    step_id,
                    action,
                    duration_ms,
                    ..
                } => {
                    println!("  ✅ Step {} -> '{}' in {}ms", step_id, action, duration_ms);
                }
                ExecutionEvent::StepFailed { step_id, error, .. } => {
                    println!("  ❌ Step {} failed: {}", step_id, error);
                }
                ExecutionEvent::StepEvent { step_id, event, .. } => match event {
                    StepEvent::Info { message } => {
                        println!("     ℹ️  [{}] {}", step_id, message);
                    }
                    StepEvent::Warning { message } => {
                        println!("     ⚠️  [{}] {}", step_id, message);
                    }
                    StepEvent::Progress { percent, message } => {
                        if let Some(msg) = message {
                            println!("     📊 [{}] {}% - {}", step_id, percent, msg);
                        } else {
                            println!("     📊 [{}] {}%", step_id, percent);
                        }
                    }
                },
                ExecutionEvent::WorkflowCompleted {
                    status, duration_ms, ..
                } => {
                    println!("🏁 Workflow {} after {}ms", status, duration_ms);
                    break;
                }
            }
        }
    });

    let execution = service.execute_workflow(&workflow_id, message).await?;
    if let Err(e) = event_task.await {
        tracing::warn!("Event printer stopped abnormally: {}", e);
    }

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", execution.id);
    println!("   Status: {}", execution.status);
    println!("   Path: {}", execution.path.join(" -> "));
    if let Some(error) = &execution.error {
        println!("   Error: {}", error);
    }

    if !execution.shared_data.is_empty() {
        println!();
        println!("📤 Shared data:");
        let mut entries: Vec<_> = execution.shared_data.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in entries {
            println!("   {}: {}", key, value.to_json());
        }
    }

    if execution.status != ExecutionStatus::Completed {
        bail!("workflow {} did not complete: {}", workflow_id, execution.status);
    }

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(&file)?;
    let registry = chatflow_nodes::standard_registry();
    let issues = validate_definition(&workflow, &registry);

    println!("   Name: {}", workflow.name);
    println!("   Steps: {}", workflow.steps.len());
    println!("   Edges: {}", workflow.edges.len());

    if issues.is_empty() {
        println!("✅ Workflow is valid");
        return Ok(());
    }

    println!("⚠️  {} issue(s) found:", issues.len());
    for issue in &issues {
        println!("   • {}", issue);
    }
    bail!("workflow {} has {} issue(s)", workflow.id, issues.len())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = chatflow_nodes::standard_registry();

    for node_type in registry.list_node_types() {
        if let Some(factory) = registry.get(&node_type) {
            println!("  • {} ({})", node_type, factory.category());
            println!("    {}", factory.description());
        }
    }
}

fn example_workflow() -> Result<WorkflowDefinition> {
    let workflow = WorkflowDefinition::builder("chat-inbound", "Example Chat Pipeline")
        .description("Access check, command dispatch and reply rendering")
        .step(
            StepDeclaration::new("access", "chat.access")
                .with_name("Access Control")
                .with_config("allowed_users", Value::Array(vec![Value::from("42")])),
        )
        .step(
            StepDeclaration::new("dispatch", "chat.command")
                .with_name("Command Dispatch")
                .with_config(
                    "commands",
                    Value::Array(vec![Value::from("start"), Value::from("help")]),
                ),
        )
        .step(
            StepDeclaration::new("welcome", "chat.reply")
                .with_config("template", "Welcome, {message.first_name}!"),
        )
        .step(
            StepDeclaration::new("help", "chat.reply")
                .with_config("template", "Commands: /start, /help"),
        )
        .step(
            StepDeclaration::new("echo", "chat.reply").with_config("template", "You said: {message.text}"),
        )
        .step(
            StepDeclaration::new("denied", "chat.reply")
                .with_config("template", "Sorry, this bot is private."),
        )
        .step(StepDeclaration::new("log", "debug.log").with_name("Log Reply"))
        .edge_on("access", "allowed", "dispatch")
        .edge_on("access", "denied", "denied")
        .edge_on("dispatch", "start", "welcome")
        .edge_on("dispatch", "help", "help")
        .edge("dispatch", "echo")
        .edge("welcome", "log")
        .edge("help", "log")
        .edge("echo", "log")
        .entry("access")
        .build()?;
    Ok(workflow)
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let workflow = example_workflow()?;

    // Save to file
    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  chatflow run --file {} --message '{{\"user_id\": \"42\", \"first_name\": \"Ada\", \"text\": \"/start\"}}'",
        output.display()
    );

    Ok(())
}
