use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

use sandloop::domain::MessageRole;
use sandloop::id::generate_conversation_id;
use sandloop::{
    AnthropicClient, CodeWorkflow, Database, LocalSandboxService, MessageStore, OutcomeRecord, RunRequest, StepStore,
    TriggerEvent,
};

fn setup_logging(filter: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sandloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("sandloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::new();
    if let Some(filter) = filter {
        builder.parse_filters(filter);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn open_database(config: &Config) -> Result<Arc<Database>> {
    let path = &config.storage.database_path;
    let db = Database::open(path).context(format!("Failed to open database at {}", path.display()))?;
    Ok(Arc::new(db))
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            prompt,
            conversation,
            run_id,
        } => handle_run_command(prompt, conversation.as_deref(), run_id.as_deref(), config).await,
        Commands::History { conversation } => handle_history_command(conversation, config),
        Commands::Steps { run_id } => handle_steps_command(run_id, config),
    }
}

async fn handle_run_command(
    prompt: &str,
    conversation: Option<&str>,
    run_id: Option<&str>,
    config: &Config,
) -> Result<()> {
    let db = open_database(config)?;
    let llm = Arc::new(AnthropicClient::new(config.anthropic()).context("Failed to create Anthropic client")?);
    let sandboxes = Arc::new(LocalSandboxService::new(config.local_sandbox()));
    let workflow = CodeWorkflow::new(llm, sandboxes, db.clone(), db.clone(), config.workflow());

    let conversation_id = conversation.map(str::to_string).unwrap_or_else(generate_conversation_id);
    let request = RunRequest::new(prompt, conversation_id.clone());
    let event = match run_id {
        Some(id) => TriggerEvent::with_id(id, request),
        None => TriggerEvent::new(request),
    };

    // A resumed run already recorded its prompt
    if db.list_steps(&event.id)?.is_empty() {
        db.insert_message(&OutcomeRecord::user_prompt(&conversation_id, prompt))?;
    }

    info!("Running {} for conversation {}", event.id, conversation_id);
    println!("{} {}", "Run:".cyan(), event.id);
    println!("{} {}", "Conversation:".cyan(), conversation_id);

    let result = workflow.run(&event).await.context("Run failed")?;

    if result.is_success() {
        println!("{} {}", "Done:".green(), result.summary);
        println!("{} {}", "Preview:".cyan(), result.url);
        for path in result.files.keys() {
            println!("  {}", path);
        }
    } else {
        println!("{}", "The agent did not finish within its iteration limit.".red());
        println!("{} {}", "Sandbox:".cyan(), result.url);
    }
    Ok(())
}

fn handle_history_command(conversation: &str, config: &Config) -> Result<()> {
    info!("Showing history for conversation: {}", conversation);
    let db = open_database(config)?;
    let messages = db.messages(conversation)?;

    if messages.is_empty() {
        println!("{} {}", "No messages for".yellow(), conversation);
        return Ok(());
    }

    for message in messages {
        let who = match message.role {
            MessageRole::User => "user".blue(),
            MessageRole::Assistant if message.is_error() => "assistant".red(),
            MessageRole::Assistant => "assistant".green(),
        };
        println!(
            "[{}] {} ({}): {}",
            message.created_at.format("%Y-%m-%d %H:%M:%S"),
            who,
            message.message_type.as_str(),
            message.content
        );
        if let Some(fragment) = message.fragment {
            println!("    {} {}", fragment.title.cyan(), fragment.sandbox_url);
            for path in fragment.files.keys() {
                println!("      {}", path);
            }
        }
    }
    Ok(())
}

fn handle_steps_command(run_id: &str, config: &Config) -> Result<()> {
    info!("Listing steps for run: {}", run_id);
    let db = open_database(config)?;
    let steps = db.list_steps(run_id)?;

    if steps.is_empty() {
        println!("{} {}", "No steps recorded for".yellow(), run_id);
        return Ok(());
    }

    for step in steps {
        let output = step.output.to_string();
        let preview: String = output.chars().take(100).collect();
        println!(
            "{} {} {}",
            step.completed_at.format("%H:%M:%S").to_string().dimmed(),
            step.step_id.green(),
            preview
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with the configured filter
    let rust_log = std::env::var("RUST_LOG").ok();
    setup_logging(config.log_filter(rust_log.as_deref()).as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
