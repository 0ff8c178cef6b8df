//! Environment-driven server configuration, per spec §6.4.

use std::net::SocketAddr;
use std::time::Duration;

/// Bind address, store root, and the knobs that size the scheduler and job
/// queue. Every field has the default named in the spec's environment table
/// so a bare `HttpConfig::from_env()` boots a usable server.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind_address: SocketAddr,
    pub pipeline_dir: std::path::PathBuf,
    pub scheduler_timezone: chrono_tz::Tz,
    pub scheduler_max_concurrent: usize,
    pub job_queue_capacity: usize,
    pub job_workers: usize,
    pub job_result_ttl: Duration,
    pub rate_limit_per_minute: u32,
    pub frontend_url: Option<String>,
    /// When set, every `/api/v1` request must carry `Authorization: Bearer
    /// <token>`. Unset (the default) disables the auth middleware stage
    /// entirely, matching spec §4.10's "optional authentication".
    pub api_token: Option<String>,
}

impl HttpConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("SERVER_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
        let bind_address = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| "0.0.0.0:8080".parse().unwrap());

        let pipeline_dir = std::env::var("PIPELINE_DIR")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|_| std::path::PathBuf::from("./pipelines"));

        let scheduler_timezone = std::env::var("SCHEDULER_TIMEZONE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(chrono_tz::UTC);

        let scheduler_max_concurrent = env_usize("SCHEDULER_MAX_CONCURRENT", 4);
        let job_queue_capacity = env_usize("JOB_QUEUE_CAPACITY", 256);
        let job_workers = env_usize("JOB_WORKERS", 4);
        let job_result_ttl = Duration::from_secs(env_usize("JOB_RESULT_TTL_SECONDS", 3600) as u64);
        let rate_limit_per_minute = env_usize("RATE_LIMIT_PER_MINUTE", 1000) as u32;
        let frontend_url = std::env::var("FRONTEND_URL").ok();
        let api_token = std::env::var("API_TOKEN").ok();

        Self {
            bind_address,
            pipeline_dir,
            scheduler_timezone,
            scheduler_max_concurrent,
            job_queue_capacity,
            job_workers,
            job_result_ttl,
            rate_limit_per_minute,
            frontend_url,
            api_token,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".parse().unwrap(),
            pipeline_dir: std::path::PathBuf::from("./pipelines"),
            scheduler_timezone: chrono_tz::UTC,
            scheduler_max_concurrent: 4,
            job_queue_capacity: 256,
            job_workers: 4,
            job_result_ttl: Duration::from_secs(3600),
            rate_limit_per_minute: 1000,
            frontend_url: None,
            api_token: None,
        }
    }
}
