//! Output formatting for mimirctl

use crate::cli::OutputFormat;
use colored::*;
use mimir_core::errors::AipError;
use mimir_mcp::ToolDescriptor;
use mimir_scheduler::{JobLogEntry, ScheduledJob};
use mimir_store::{PipelineDef, ValidationReport, VersionEntry};
use serde::Serialize;
use tabled::Tabled;

fn render<T: Serialize>(value: &T, format: &OutputFormat) -> Result<(), AipError> {
    let text = match format {
        OutputFormat::Json | OutputFormat::Table => {
            serde_json::to_string_pretty(value).map_err(|e| AipError::internal(format!("failed to serialize: {e}")))?
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(value).map_err(|e| AipError::internal(format!("failed to serialize: {e}")))?
        }
    };
    println!("{text}");
    Ok(())
}

#[derive(Tabled)]
struct PipelineRow {
    id: String,
    name: String,
    version: u64,
    enabled: bool,
    tags: String,
    updated: String,
}

impl From<&PipelineDef> for PipelineRow {
    fn from(def: &PipelineDef) -> Self {
        let mut tags: Vec<&String> = def.metadata.tags.iter().collect();
        tags.sort();
        Self {
            id: def.id.clone(),
            name: def.metadata.name.clone(),
            version: def.metadata.version,
            enabled: def.metadata.enabled,
            tags: tags.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(","),
            updated: def.metadata.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub fn display_pipelines(pipelines: &[PipelineDef], format: &OutputFormat) -> Result<(), AipError> {
    match format {
        OutputFormat::Table => {
            if pipelines.is_empty() {
                println!("No pipelines found");
                return Ok(());
            }
            let rows: Vec<PipelineRow> = pipelines.iter().map(PipelineRow::from).collect();
            println!("{}", tabled::Table::new(rows));
            Ok(())
        }
        _ => render(pipelines, format),
    }
}

pub fn display_pipeline(pipeline: &PipelineDef, format: &OutputFormat) -> Result<(), AipError> {
    match format {
        OutputFormat::Table => {
            println!("{}", "Pipeline".bold().blue());
            println!("{:<12} {}", "ID:".bold(), pipeline.id);
            println!("{:<12} {}", "Name:".bold(), pipeline.metadata.name);
            println!("{:<12} {}", "Version:".bold(), pipeline.metadata.version);
            println!("{:<12} {}", "Enabled:".bold(), pipeline.metadata.enabled);
            println!("{:<12} {}", "Steps:".bold(), pipeline.config.steps.len());
            if let Some(description) = &pipeline.metadata.description {
                println!("{:<12} {}", "Description:".bold(), description);
            }
            Ok(())
        }
        _ => render(pipeline, format),
    }
}

#[derive(Tabled)]
struct JobRow {
    id: String,
    name: String,
    pipeline_id: String,
    cron: String,
    enabled: bool,
    next_run: String,
}

impl From<&ScheduledJob> for JobRow {
    fn from(job: &ScheduledJob) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            pipeline_id: job.pipeline_id.clone(),
            cron: job.cron_expr.clone(),
            enabled: job.enabled,
            next_run: job.next_run.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()).unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub fn display_jobs(jobs: &[ScheduledJob], format: &OutputFormat) -> Result<(), AipError> {
    match format {
        OutputFormat::Table => {
            if jobs.is_empty() {
                println!("No scheduled jobs found");
                return Ok(());
            }
            let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
            println!("{}", tabled::Table::new(rows));
            Ok(())
        }
        _ => render(jobs, format),
    }
}

pub fn display_job(job: &ScheduledJob, format: &OutputFormat) -> Result<(), AipError> {
    match format {
        OutputFormat::Table => display_jobs(std::slice::from_ref(job), format),
        _ => render(job, format),
    }
}

#[derive(Tabled)]
struct LogRow {
    started_at: String,
    finished_at: String,
    status: String,
    run_id: String,
}

impl From<&JobLogEntry> for LogRow {
    fn from(entry: &JobLogEntry) -> Self {
        Self {
            started_at: entry.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            finished_at: entry.finished_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()).unwrap_or_else(|| "-".to_string()),
            status: format!("{:?}", entry.status),
            run_id: entry.triggered_run_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub fn display_logs(entries: &[JobLogEntry], format: &OutputFormat) -> Result<(), AipError> {
    match format {
        OutputFormat::Table => {
            if entries.is_empty() {
                println!("No run history found");
                return Ok(());
            }
            let rows: Vec<LogRow> = entries.iter().map(LogRow::from).collect();
            println!("{}", tabled::Table::new(rows));
            Ok(())
        }
        _ => render(entries, format),
    }
}

#[derive(Tabled)]
struct VersionRow {
    version: u64,
    updated_at: String,
}

pub fn display_history(entries: &[VersionEntry], format: &OutputFormat) -> Result<(), AipError> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<VersionRow> = entries
                .iter()
                .map(|e| VersionRow { version: e.version, updated_at: e.updated_at.format("%Y-%m-%d %H:%M:%S").to_string() })
                .collect();
            println!("{}", tabled::Table::new(rows));
            Ok(())
        }
        _ => render(entries, format),
    }
}

pub fn display_validation(report: &ValidationReport, format: &OutputFormat) -> Result<(), AipError> {
    match format {
        OutputFormat::Table => {
            if report.valid {
                println!("{}", "valid".green().bold());
            } else {
                println!("{}", "invalid".red().bold());
                for error in &report.errors {
                    println!("  - {error}");
                }
            }
            Ok(())
        }
        _ => render(report, format),
    }
}

#[derive(Tabled)]
struct PluginRow {
    reference: String,
}

pub fn display_plugin_refs(references: &[String], format: &OutputFormat) -> Result<(), AipError> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<PluginRow> = references.iter().map(|r| PluginRow { reference: r.clone() }).collect();
            println!("{}", tabled::Table::new(rows));
            Ok(())
        }
        _ => render(references, format),
    }
}

#[derive(Tabled)]
struct ToolRow {
    name: String,
    description: String,
}

pub fn display_tools(tools: &[ToolDescriptor], format: &OutputFormat) -> Result<(), AipError> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<ToolRow> = tools.iter().map(|t| ToolRow { name: t.name.clone(), description: t.description.clone() }).collect();
            println!("{}", tabled::Table::new(rows));
            Ok(())
        }
        _ => render(tools, format),
    }
}

pub fn display_json(value: &serde_json::Value, format: &OutputFormat) -> Result<(), AipError> {
    render(value, format)
}
