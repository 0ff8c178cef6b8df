//! HTTP client for the Mimir AIP REST surface

use crate::config::MimirCliConfig;
use mimir_core::errors::AipError;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// The `{success, data, error, timestamp}` envelope every versioned
/// endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

pub struct MimirClient {
    client: Client,
    config: MimirCliConfig,
}

impl MimirClient {
    pub fn new(config: MimirCliConfig) -> Result<Self, AipError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .default_headers(config.auth_headers())
            .build()
            .map_err(|e| AipError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub async fn get(&self, path: &str) -> Result<Response, AipError> {
        let url = self.config.api_url(path);
        debug!("GET {url}");
        self.client.get(&url).send().await.map_err(|e| AipError::internal(format!("GET {path} failed: {e}")))
    }

    pub async fn get_root(&self, path: &str) -> Result<Response, AipError> {
        let url = self.config.root_url(path);
        debug!("GET {url}");
        self.client.get(&url).send().await.map_err(|e| AipError::internal(format!("GET {path} failed: {e}")))
    }

    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, AipError> {
        let url = self.config.api_url(path);
        debug!("POST {url}");
        self.client.post(&url).json(body).send().await.map_err(|e| AipError::internal(format!("POST {path} failed: {e}")))
    }

    pub async fn post_root<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, AipError> {
        let url = self.config.root_url(path);
        debug!("POST {url}");
        self.client.post(&url).json(body).send().await.map_err(|e| AipError::internal(format!("POST {path} failed: {e}")))
    }

    pub async fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, AipError> {
        let url = self.config.api_url(path);
        debug!("PUT {url}");
        self.client.put(&url).json(body).send().await.map_err(|e| AipError::internal(format!("PUT {path} failed: {e}")))
    }

    pub async fn delete(&self, path: &str) -> Result<Response, AipError> {
        let url = self.config.api_url(path);
        debug!("DELETE {url}");
        self.client.delete(&url).send().await.map_err(|e| AipError::internal(format!("DELETE {path} failed: {e}")))
    }

    /// Unwrap a response carrying the `{success, data, error}` envelope,
    /// turning a non-2xx status or a `success: false` body into an error.
    pub async fn unwrap_envelope<T: DeserializeOwned>(&self, response: Response) -> Result<T, AipError> {
        let status = response.status();
        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| AipError::internal(format!("failed to decode response body: {e}")))?;

        if !status.is_success() || !envelope.success {
            let message = envelope.error.unwrap_or_else(|| format!("request failed with status {status}"));
            return Err(AipError::internal(message));
        }
        envelope.data.ok_or_else(|| AipError::internal("response carried no data"))
    }

    /// Unwrap a response with no envelope (health, version, MCP tool calls).
    pub async fn unwrap_plain<T: DeserializeOwned>(&self, response: Response) -> Result<T, AipError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AipError::internal(format!("request failed with status {status}: {text}")));
        }
        response.json().await.map_err(|e| AipError::internal(format!("failed to decode response body: {e}")))
    }

    /// Unwrap a response with no body, erroring on non-2xx status.
    pub async fn unwrap_empty(&self, response: Response) -> Result<(), AipError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AipError::internal(format!("request failed with status {status}: {text}")));
        }
        Ok(())
    }

    pub fn config(&self) -> &MimirCliConfig {
        &self.config
    }
}
