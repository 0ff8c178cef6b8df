//! Scheduled job command implementations

use crate::cli::{OutputFormat, SchedulerCommands};
use crate::client::MimirClient;
use crate::output;
use mimir_core::errors::AipError;
use mimir_scheduler::{JobLogEntry, ScheduledJob};
use serde::Serialize;

#[derive(Serialize)]
struct CreateRequest {
    id: Option<String>,
    name: String,
    pipeline_id: String,
    cron: String,
}

#[derive(Serialize)]
struct UpdateRequest {
    cron: String,
}

pub async fn handle(command: SchedulerCommands, client: &MimirClient, format: &OutputFormat) -> Result<(), AipError> {
    match command {
        SchedulerCommands::Create { id, name, pipeline_id, cron } => {
            let request = CreateRequest { id, name, pipeline_id, cron };
            let response = client.post("/scheduler/jobs", &request).await?;
            let job: ScheduledJob = client.unwrap_envelope(response).await?;
            output::display_job(&job, format)
        }
        SchedulerCommands::List => {
            let response = client.get("/scheduler/jobs").await?;
            let jobs: Vec<ScheduledJob> = client.unwrap_envelope(response).await?;
            output::display_jobs(&jobs, format)
        }
        SchedulerCommands::Get { id } => {
            let response = client.get(&format!("/scheduler/jobs/{id}")).await?;
            let job: ScheduledJob = client.unwrap_envelope(response).await?;
            output::display_job(&job, format)
        }
        SchedulerCommands::Update { id, cron } => {
            let request = UpdateRequest { cron };
            let response = client.put(&format!("/scheduler/jobs/{id}"), &request).await?;
            let job: ScheduledJob = client.unwrap_envelope(response).await?;
            output::display_job(&job, format)
        }
        SchedulerCommands::Delete { id } => {
            let response = client.delete(&format!("/scheduler/jobs/{id}")).await?;
            client.unwrap_empty(response).await?;
            println!("job '{id}' deleted");
            Ok(())
        }
        SchedulerCommands::Enable { id } => {
            let response = client.post(&format!("/scheduler/jobs/{id}/enable"), &serde_json::json!({})).await?;
            client.unwrap_empty(response).await?;
            println!("job '{id}' enabled");
            Ok(())
        }
        SchedulerCommands::Disable { id } => {
            let response = client.post(&format!("/scheduler/jobs/{id}/disable"), &serde_json::json!({})).await?;
            client.unwrap_empty(response).await?;
            println!("job '{id}' disabled");
            Ok(())
        }
        SchedulerCommands::Logs { id, limit } => {
            let response = client.get(&format!("/scheduler/jobs/{id}/logs?limit={limit}")).await?;
            let entries: Vec<JobLogEntry> = client.unwrap_envelope(response).await?;
            output::display_logs(&entries, format)
        }
    }
}
