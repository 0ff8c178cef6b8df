//! Command-line interface for Mimir AIP

use clap::Parser;
use std::process;
use tracing::{error, info, Level};

mod cli;
mod client;
mod commands;
mod config;
mod output;

use cli::{Cli, Commands};
use client::MimirClient;
use config::MimirCliConfig;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    let log_level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt().with_max_level(log_level).with_target(false).init();

    let config = match MimirCliConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {}", e.message);
            process::exit(1);
        }
    };
    let config = config.with_overrides(&args);
    let format = args.format.clone().unwrap_or_else(|| config.default_format.clone());

    info!("using mimir endpoint {}", config.endpoint);

    let client = match MimirClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            error!("failed to build HTTP client: {}", e.message);
            process::exit(1);
        }
    };

    let result = match args.command {
        Commands::Pipeline { command } => commands::pipeline::handle(command, &client, &format).await,
        Commands::Plugin { command } => commands::plugin::handle(command, &client, &format).await,
        Commands::Scheduler { command } => commands::scheduler::handle(command, &client, &format).await,
        Commands::Mcp { command } => commands::mcp::handle(command, &client, &format).await,
        Commands::Health => commands::health::handle(&client).await,
    };

    if let Err(e) = result {
        error!("command failed: {}", e.message);
        process::exit(1);
    }
}
