//! REST client for the persistence service
//!
//! Speaks the store's row-oriented HTTP interface: `GET /rest/v1/{table}`
//! with filter query parameters for reads, `POST /rest/v1/{table}` with a
//! JSON row for inserts. Every request carries the anonymous key in the
//! `apikey` header and the privileged service key as a bearer token.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{StoreError, StoreResult};
use crate::config::StoreSettings;

/// Store client configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the store (without the `/rest/v1` suffix)
    pub base_url: String,

    /// Anonymous API key
    pub anon_key: String,

    /// Privileged service key
    pub service_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            anon_key: String::new(),
            service_key: String::new(),
            timeout_secs: 10,
        }
    }

    /// Set the anonymous key
    pub fn with_anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = key.into();
        self
    }

    /// Set the service key
    pub fn with_service_key(mut self, key: impl Into<String>) -> Self {
        self.service_key = key.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate configuration
    ///
    /// An empty base URL is tolerated (the server may start without store
    /// credentials and gate requests upstream); a non-empty one must be
    /// http(s) and the timeout positive.
    pub fn validate(&self) -> Result<(), String> {
        if !self.base_url.is_empty()
            && !self.base_url.starts_with("http://")
            && !self.base_url.starts_with("https://")
        {
            return Err("store URL must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl From<&StoreSettings> for StoreConfig {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            base_url: settings.url.clone(),
            anon_key: settings.anon_key.clone(),
            service_key: settings.service_key.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }
}

/// HTTP client for the store's REST interface
pub struct StoreClient {
    config: StoreConfig,
    client: Client,
}

impl StoreClient {
    /// Create a new store client
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        config.validate().map_err(StoreError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::InvalidConfig(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// The base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn table_endpoint(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            table
        )
    }

    /// Read rows from a table
    ///
    /// `query` is passed through as URL parameters (`select`, column
    /// filters, `order`, `limit`).
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> StoreResult<Vec<T>> {
        let response = self
            .client
            .get(self.table_endpoint(table))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.service_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| StoreError::Decode {
            reason: format!("{table}: {e}"),
        })
    }

    /// Insert one row into a table
    pub async fn insert<T: Serialize>(&self, table: &str, row: &T) -> StoreResult<()> {
        let response = self
            .client
            .post(self.table_endpoint(table))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.service_key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
