//! Health check command implementation

use crate::client::MimirClient;
use colored::*;
use mimir_core::errors::AipError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct HealthStatus {
    status: String,
    version: String,
    time: String,
}

pub async fn handle(client: &MimirClient) -> Result<(), AipError> {
    let response = client.get_root("/health").await?;
    match client.unwrap_plain::<HealthStatus>(response).await {
        Ok(health) => {
            println!("{}", "mimir is healthy".green().bold());
            println!("status: {}", health.status.green());
            println!("version: {}", health.version);
            println!("time: {}", health.time);
            Ok(())
        }
        Err(e) => {
            println!("{}", "mimir health check failed".red().bold());
            println!("error: {}", e.message.red());
            Err(e)
        }
    }
}
