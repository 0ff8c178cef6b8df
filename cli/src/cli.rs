//! CLI argument definitions

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mimirctl")]
#[command(about = "Control tool for the Mimir AIP pipeline execution substrate")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Mimir API endpoint URL
    #[arg(short, long, global = true)]
    pub endpoint: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline definition and execution operations
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Plugin discovery operations
    Plugin {
        #[command(subcommand)]
        command: PluginCommands,
    },
    /// Scheduled job operations
    Scheduler {
        #[command(subcommand)]
        command: SchedulerCommands,
    },
    /// MCP tool discovery and execution
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
    /// Check server health
    Health,
}

#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Create a new pipeline definition
    Create {
        /// Pipeline name
        #[arg(short, long)]
        name: String,
        /// Human-readable description
        #[arg(short, long)]
        description: Option<String>,
        /// Tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Path to a YAML or JSON file holding the step config
        #[arg(short = 'F', long)]
        config_file: PathBuf,
        /// Attribution for the creating principal
        #[arg(long)]
        created_by: Option<String>,
    },
    /// List pipeline definitions
    List {
        /// Filter by exact name
        #[arg(short, long)]
        name: Option<String>,
        /// Filter by tag
        #[arg(short, long)]
        tag: Option<String>,
        /// Filter by enabled state
        #[arg(long)]
        enabled: Option<bool>,
    },
    /// Fetch a single pipeline definition
    Get {
        id: String,
    },
    /// Update a pipeline's metadata and/or config
    Update {
        id: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(short = 'F', long)]
        config_file: Option<PathBuf>,
    },
    /// Delete a pipeline definition
    Delete {
        id: String,
    },
    /// Clone a pipeline definition under a new name
    Clone {
        id: String,
        new_name: String,
    },
    /// Validate a pipeline's step config against the plugin registry
    Validate {
        id: String,
    },
    /// List a pipeline's revision history
    History {
        id: String,
    },
    /// Run a pipeline synchronously, either stored or inline
    Execute {
        /// Id of a stored pipeline to run
        #[arg(long, conflicts_with = "config_file")]
        pipeline_id: Option<String>,
        /// Path to a YAML or JSON file holding an inline step config
        #[arg(short = 'F', long)]
        config_file: Option<PathBuf>,
        /// Path to a JSON file seeding the initial run context
        #[arg(long)]
        context_file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum PluginCommands {
    /// List every registered plugin
    List,
    /// List plugins registered under one type
    ListType {
        plugin_type: String,
    },
    /// Describe a single plugin
    Describe {
        plugin_type: String,
        name: String,
    },
}

#[derive(Subcommand)]
pub enum SchedulerCommands {
    /// Create a scheduled job
    Create {
        /// Explicit job id; generated if omitted
        #[arg(long)]
        id: Option<String>,
        name: String,
        pipeline_id: String,
        cron: String,
    },
    /// List scheduled jobs
    List,
    /// Fetch a single scheduled job
    Get {
        id: String,
    },
    /// Update a scheduled job's cron expression
    Update {
        id: String,
        cron: String,
    },
    /// Delete a scheduled job
    Delete {
        id: String,
    },
    /// Enable a scheduled job
    Enable {
        id: String,
    },
    /// Disable a scheduled job
    Disable {
        id: String,
    },
    /// Show a scheduled job's recent run log
    Logs {
        id: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum McpCommands {
    /// List the tools the MCP adapter exposes
    Tools,
    /// Execute an MCP tool
    Execute {
        tool_name: String,
        /// Path to a JSON file holding the tool's input
        #[arg(short = 'F', long)]
        input_file: Option<PathBuf>,
    },
}

#[derive(clap::ValueEnum, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}
