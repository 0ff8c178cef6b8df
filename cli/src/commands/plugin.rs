//! Plugin command implementations

use crate::cli::{OutputFormat, PluginCommands};
use crate::client::MimirClient;
use crate::output;
use mimir_core::errors::AipError;
use serde::Deserialize;

#[derive(Deserialize)]
struct PluginSummary {
    reference: String,
}

#[derive(Deserialize)]
struct PluginDetail {
    reference: String,
    plugin_type: String,
    name: String,
}

pub async fn handle(command: PluginCommands, client: &MimirClient, format: &OutputFormat) -> Result<(), AipError> {
    match command {
        PluginCommands::List => {
            let response = client.get("/plugins").await?;
            let plugins: Vec<PluginSummary> = client.unwrap_envelope(response).await?;
            output::display_plugin_refs(&plugins.into_iter().map(|p| p.reference).collect::<Vec<_>>(), format)
        }
        PluginCommands::ListType { plugin_type } => {
            let response = client.get(&format!("/plugins/{plugin_type}")).await?;
            let plugins: Vec<PluginSummary> = client.unwrap_envelope(response).await?;
            output::display_plugin_refs(&plugins.into_iter().map(|p| p.reference).collect::<Vec<_>>(), format)
        }
        PluginCommands::Describe { plugin_type, name } => {
            let response = client.get(&format!("/plugins/{plugin_type}/{name}")).await?;
            let detail: PluginDetail = client.unwrap_envelope(response).await?;
            println!("{}: type={}, name={}", detail.reference, detail.plugin_type, detail.name);
            Ok(())
        }
    }
}
