//! Switchback CLI - interactive REPL for tool-calling conversations
//!
//! Drives one session against a Responses API endpoint. The model can call
//! `get_weather`; tool activity is printed as it happens.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use switchback::{Orchestrator, ResponsesClient, Session, SharedSession, ToolRegistry, WeatherTool};

mod config;
mod display;
mod repl;

use crate::config::CliConfig;
use crate::repl::Repl;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML config file (default: ~/.config/switchback/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Model to use
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL for the API endpoint
    #[arg(long)]
    pub base_url: Option<String>,

    /// System prompt, sent as the request instructions
    #[arg(long)]
    pub system: Option<String>,

    /// Tool rounds allowed per turn
    #[arg(long)]
    pub max_tool_rounds: Option<u32>,

    /// Let the model request several tool calls at once and run them concurrently
    #[arg(long)]
    pub parallel_tools: bool,

    /// Continue from stored responses instead of resending the whole history
    #[arg(long)]
    pub previous_response: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = CliConfig::load(&args).context("Failed to load configuration")?;
    log::debug!("Using configuration: {config:?}");

    let client = ResponsesClient::new(config.client_config()?)
        .context("Failed to create the API client")?;

    let tools = ToolRegistry::new();
    tools.register(Arc::new(WeatherTool::with_config(config.weather_config())));

    let orchestrator = Orchestrator::new(client)
        .with_options(config.orchestrator_options())
        .with_event_callback(|event| {
            Box::pin(async move { display::display_event(&event) })
        });

    let mut session = Session::new().with_tools(tools.clone());
    if let Some(prompt) = &config.system_prompt {
        session = session.with_instructions(prompt);
    }

    println!("Model: {}", config.model);
    println!("Registered tools: {}\n", tools.tool_names().join(", "));

    let repl = Repl {
        orchestrator,
        session: SharedSession::new(session),
        tools,
    };
    repl.run().await
}
