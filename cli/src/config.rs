//! Configuration management for mimirctl

use crate::cli::{Cli, OutputFormat};
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use mimir_core::errors::AipError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the mimirctl CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MimirCliConfig {
    /// Mimir API endpoint, e.g. `http://localhost:8080`.
    pub endpoint: String,
    /// Default output format.
    pub default_format: OutputFormat,
    /// Bearer token sent as `Authorization` when the server requires it.
    pub auth_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for MimirCliConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            default_format: OutputFormat::Table,
            auth_token: None,
            timeout: 30,
        }
    }
}

impl MimirCliConfig {
    /// Load configuration from a default or specified file, then layer
    /// `MIMIR_`-prefixed environment variables on top.
    pub fn load(config_path: &Option<std::path::PathBuf>) -> Result<Self, AipError> {
        let mut figment = Figment::new();

        let default_paths = ["mimirctl.yaml", "mimirctl.yml", ".mimirctl.yaml", ".mimirctl.yml"];
        for path in &default_paths {
            if Path::new(path).exists() {
                figment = figment.merge(Yaml::file(path));
                break;
            }
        }

        if let Some(path) = config_path {
            if path.exists() {
                figment = figment.merge(Yaml::file(path));
            } else {
                return Err(AipError::validation(format!("configuration file not found: {}", path.display())));
            }
        }

        figment = figment.merge(Env::prefixed("MIMIR_"));

        figment
            .extract()
            .map_err(|e| AipError::validation(format!("failed to parse configuration: {e}")))
    }

    /// Apply CLI argument overrides on top of the loaded configuration.
    pub fn with_overrides(mut self, args: &Cli) -> Self {
        if let Some(ref endpoint) = args.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(ref format) = args.format {
            self.default_format = format.clone();
        }
        self
    }

    /// Build the full URL for a path under the versioned API surface.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.endpoint.trim_end_matches('/'), path)
    }

    /// Build the full URL for a path outside the versioned API surface
    /// (health, version, MCP tool discovery and execution).
    pub fn root_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    pub fn auth_headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(ref token) = self.auth_token {
            if let Ok(value) = format!("Bearer {token}").parse() {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_localhost() {
        let config = MimirCliConfig::default();
        assert_eq!(config.endpoint, "http://localhost:8080");
        assert_eq!(config.timeout, 30);
    }

    #[test]
    fn api_url_is_versioned_and_root_url_is_not() {
        let config = MimirCliConfig::default();
        assert_eq!(config.api_url("/pipelines"), "http://localhost:8080/api/v1/pipelines");
        assert_eq!(config.root_url("/health"), "http://localhost:8080/health");
    }

    #[test]
    fn config_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mimirctl.yaml");
        std::fs::write(&path, "endpoint: http://example.com:9090\ntimeout: 60\n").unwrap();

        let config = MimirCliConfig::load(&Some(path)).unwrap();
        assert_eq!(config.endpoint, "http://example.com:9090");
        assert_eq!(config.timeout, 60);
    }
}
