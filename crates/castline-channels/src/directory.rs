//! External customer directory (WispHub-style REST API).
//!
//! `GET {endpoint}/clientes/activos` with an `X-API-Key` header returns the
//! active customers. Callers treat any failure as an empty directory.

use async_trait::async_trait;
use castline_core::config::DirectoryConfig;
use castline_core::error::{CastlineError, Result};
use castline_core::traits::RecipientDirectory;
use castline_core::types::DirectoryEntry;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ClientsResponse {
    #[serde(default)]
    data: Vec<ClientRecord>,
}

#[derive(Debug, Deserialize)]
struct ClientRecord {
    #[serde(default)]
    telefono_movil: Option<String>,
    #[serde(default)]
    nombre_completo: String,
    #[serde(default)]
    estado_servicio: String,
}

/// HTTP directory client.
pub struct HttpDirectory {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl HttpDirectory {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        }
    }

    /// Build from config; `None` when no endpoint is configured.
    pub fn from_config(config: &DirectoryConfig) -> Option<Self> {
        let endpoint = config.endpoint.as_deref()?.trim();
        if endpoint.is_empty() {
            return None;
        }
        Some(Self::new(
            endpoint,
            config.api_key.clone(),
            Duration::from_millis(config.timeout_ms),
        ))
    }
}

#[async_trait]
impl RecipientDirectory for HttpDirectory {
    async fn fetch(&self) -> Result<Vec<DirectoryEntry>> {
        let url = format!("{}/clientes/activos", self.endpoint);
        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CastlineError::DirectoryUnavailable(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CastlineError::DirectoryUnavailable(format!(
                "Error {status}: {body}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CastlineError::DirectoryUnavailable(format!("read failed: {e}")))?;
        parse_clients(&body)
    }
}

/// Parse the directory response body into entries.
/// Records without a mobile phone are skipped; `+` signs are removed.
pub fn parse_clients(body: &str) -> Result<Vec<DirectoryEntry>> {
    let parsed: ClientsResponse = serde_json::from_str(body)
        .map_err(|e| CastlineError::DirectoryUnavailable(format!("invalid response: {e}")))?;
    Ok(parsed
        .data
        .into_iter()
        .filter_map(|c| {
            let phone = c.telefono_movil?.replace('+', "");
            (!phone.trim().is_empty()).then(|| DirectoryEntry {
                phone,
                name: c.nombre_completo,
                status: c.estado_servicio,
            })
        })
        .collect())
}
