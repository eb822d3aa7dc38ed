//! HTTP API mail transport
//!
//! Sends email as JSON payloads via the provider's HTTP POST endpoint with
//! bearer authentication. One provider call per send; the scheduler owns
//! the attempt semantics.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{is_valid_address, MailError, MailResult, Mailer, OutgoingEmail, SendReceipt};
use crate::config::MailSettings;

/// API mail transport configuration
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// Provider send endpoint
    pub api_url: String,

    /// API credential (sent as Bearer token)
    pub api_key: String,

    /// RFC 5322 "From" value
    pub from_address: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl MailerConfig {
    /// Create a new mailer configuration
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: api_key.into(),
            from_address: "Daybreak <noreply@daybreak.app>".to_string(),
            timeout_secs: 10,
        }
    }

    /// Set the provider endpoint
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the "From" value
    pub fn with_from_address(mut self, from: impl Into<String>) -> Self {
        self.from_address = from.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate configuration
    ///
    /// The key may be empty (requests are gated upstream on the environment
    /// report); the endpoint and timeout must be usable.
    pub fn validate(&self) -> Result<(), String> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err("mail API URL must start with http:// or https://".to_string());
        }

        if !self.from_address.contains('@') {
            return Err(format!(
                "from_address '{}' is not an email address",
                self.from_address
            ));
        }

        if self.timeout_secs == 0 {
            return Err("timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl From<&MailSettings> for MailerConfig {
    fn from(settings: &MailSettings) -> Self {
        Self {
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.clone(),
            from_address: settings.from_address.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }
}

/// Wire shape of the provider's send response
#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
}

/// Mail transport backed by the provider's HTTP API
pub struct ApiMailer {
    config: MailerConfig,
    client: Client,
}

impl ApiMailer {
    /// Create a new API mailer
    pub fn new(config: MailerConfig) -> MailResult<Self> {
        config.validate().map_err(MailError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MailError::InvalidConfig(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// The provider endpoint this mailer posts to
    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    fn build_payload(&self, email: &OutgoingEmail) -> serde_json::Value {
        serde_json::json!({
            "from": self.config.from_address,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html_body,
            "text": email.text_body,
        })
    }
}

#[async_trait]
impl Mailer for ApiMailer {
    fn name(&self) -> &str {
        "api"
    }

    async fn send(&self, email: &OutgoingEmail) -> MailResult<SendReceipt> {
        if !is_valid_address(&email.to) {
            return Err(MailError::InvalidRecipient(email.to.clone()));
        }

        let payload = self.build_payload(email);

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());

            tracing::error!(
                to = %email.to,
                status = status.as_u16(),
                "mail provider rejected send"
            );
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SendResponse = response.json().await.unwrap_or(SendResponse { id: None });
        let message_id = parsed.id.unwrap_or_else(|| "unknown".to_string());

        tracing::info!(to = %email.to, message_id = %message_id, "email delivered");
        Ok(SendReceipt::new(message_id, &email.to))
    }
}
