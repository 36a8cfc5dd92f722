use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use office_relay::agent::AgentServer;
use office_relay::config::Config;
use office_relay::host;
use office_relay::registry::{ContentItem, ToolCallRequest, ToolCategory, ToolDefinition};
use office_relay::router::RemoteRouter;

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging(level: Option<&str>) -> Result<PathBuf> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("office-relay")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("office-relay.log");

    // stdout belongs to the agent protocol, so logs go to a file
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.unwrap_or("info")))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        eprintln!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None | Some(Commands::Agent) => run_agent(config).await,
        Some(Commands::Host { listen }) => run_host(listen.as_deref(), config).await,
        Some(Commands::Status) => handle_status_command(config).await,
        Some(Commands::Tools { category }) => handle_tools_command(category.as_deref(), config),
        Some(Commands::Call { tool, arguments }) => handle_call_command(tool, arguments.as_deref(), config).await,
    }
}

async fn run_agent(config: &Config) -> Result<()> {
    let client = config.relay_client()?;
    let registry = config.build_registry(&client)?;
    info!("Serving {} tools on stdio", registry.len());
    AgentServer::new(registry)
        .run_stdio()
        .await
        .context("Agent session failed")
}

async fn run_host(listen: Option<&str>, config: &Config) -> Result<()> {
    let listen = listen.unwrap_or(&config.host.listen);
    let router = RemoteRouter::new().with_overwrite(config.registry.allow_overwrite);
    host::register_diagnostic_actions(&router).context("Failed to register diagnostic actions")?;

    let listener = host::bind(listen).await?;
    let addr = listener.local_addr().context("Listener has no local address")?;
    println!("{} {}", "Office host listening on".green(), format!("http://{}", addr).bold());
    println!("{}", "Press Ctrl-C to stop".dimmed());

    host::serve(listener, Arc::new(router), async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Interrupt received, shutting down");
    })
    .await
    .context("Office host failed")
}

async fn handle_status_command(config: &Config) -> Result<()> {
    let client = config.relay_client()?;
    let connected = client.check_connection().await;
    let status = client.connection_status();

    if connected {
        println!("{} {}", "Connected:".green(), status.endpoint);
        if let Some(heartbeat) = &status.last_heartbeat {
            println!("  Last heartbeat: {}", heartbeat);
        }
        let envelope = client.invoke("status", Value::Null, None).await?;
        if let Some(data) = envelope.data {
            println!("  Host: {}", serde_json::to_string(&data)?);
        }
        Ok(())
    } else {
        println!("{} {}", "Not connected:".red(), status.endpoint);
        if let Some(error) = &status.last_error {
            println!("  {}", error);
        }
        Err(eyre!("office host at {} is not reachable", status.endpoint))
    }
}

fn print_tool(tool: &ToolDefinition) {
    println!("{} [{}]", tool.name.bold(), tool.category.as_str().cyan());
    println!("  {}", tool.description);
    for (name, param) in &tool.input_schema.properties {
        let required = tool.input_schema.required.contains(name);
        let param_type = param.param_type.map(|t| t.as_str()).unwrap_or("any");
        let marker = if required { "*".red().to_string() } else { " ".to_string() };
        match &param.description {
            Some(description) => println!("   {}{} ({}): {}", marker, name, param_type, description),
            None => println!("   {}{} ({})", marker, name, param_type),
        }
    }
}

fn handle_tools_command(category: Option<&str>, config: &Config) -> Result<()> {
    let client = config.relay_client()?;
    let registry = config.build_registry(&client)?;

    let tools = match category {
        Some(raw) => {
            let category = ToolCategory::from_str(raw).ok_or_else(|| eyre!("Unknown category '{}'", raw))?;
            registry.tools_by_category(category)
        }
        None => registry.list_tools(),
    };

    if tools.is_empty() {
        println!("{}", "No tools registered".yellow());
    }
    for tool in &tools {
        print_tool(tool);
    }
    Ok(())
}

async fn handle_call_command(tool: &str, arguments: Option<&str>, config: &Config) -> Result<()> {
    let arguments: Value = match arguments {
        Some(raw) => serde_json::from_str(raw).context("Arguments must be valid JSON")?,
        None => Value::Null,
    };

    let client = config.relay_client()?;
    let registry = config.build_registry(&client)?;
    let result = registry.call_tool(ToolCallRequest::new(tool, arguments)).await?;

    for item in &result.content {
        match item {
            ContentItem::Text { text } => println!("{}", text),
            ContentItem::Json { data } => println!("{}", serde_json::to_string_pretty(data)?),
        }
    }

    match result.error {
        None => Ok(()),
        Some(error) => {
            eprintln!("{} {}", "Tool failed:".red(), error);
            Err(eyre!("tool {} failed", tool))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
