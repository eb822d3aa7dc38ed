//! Configuration management for the daybreak delivery service
//!
//! Settings are loaded from environment variables. The four credentials the
//! service cannot run without (mail API key, store URL, store anon key,
//! store service key) are deliberately NOT enforced by [`AppConfig::from_env`]:
//! the server starts degraded and every trigger endpoint answers with the
//! exact list of missing variables instead of an opaque downstream failure.
//! [`EnvReport`] is that list.

use std::net::SocketAddr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::clock::{DEFAULT_TOLERANCE_MINUTES, DEFAULT_UTC_OFFSET_HOURS};

/// Environment variables the service refuses to deliver without
pub const REQUIRED_ENV_VARS: &[&str] = &[
    "MAIL_API_KEY",
    "STORE_URL",
    "STORE_ANON_KEY",
    "STORE_SERVICE_KEY",
];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Mail provider configuration
    pub mail: MailSettings,

    /// Persistence service configuration
    pub store: StoreSettings,

    /// Delivery scheduling configuration
    pub delivery: DeliverySettings,

    /// HTTP server configuration
    pub server: ServerSettings,
}

/// Mail provider (HTTP send API) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailSettings {
    /// Provider send endpoint
    pub api_url: String,

    /// Provider API credential
    pub api_key: String,

    /// RFC 5322 "From" value for outgoing mail
    pub from_address: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Persistence service (REST query interface) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Base URL of the store
    pub url: String,

    /// Anonymous API key, sent on every request
    pub anon_key: String,

    /// Privileged service key used for server-side reads and writes
    pub service_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Delivery scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettings {
    /// Time of day the fixed daily trigger targets, "HH:MM"
    pub daily_send_time: String,

    /// Minutes of slack around a user's send time
    pub tolerance_minutes: i64,

    /// Delivery timezone as a whole-hour UTC offset
    pub utc_offset_hours: i32,

    /// Public site URL used for links in outgoing mail
    pub site_url: String,

    /// Recipient of connectivity-test sends
    pub test_recipient: Option<String>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to bind the trigger endpoints on
    pub bind_address: SocketAddr,

    /// Enable permissive CORS
    pub enable_cors: bool,

    /// Enable per-request tracing
    pub enable_request_logging: bool,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Missing required credentials yield empty strings here; presence is
    /// checked at the trigger boundary via [`AppConfig::env_report`].
    pub fn from_env() -> Result<Self> {
        let mail_api_url = std::env::var("MAIL_API_URL")
            .unwrap_or_else(|_| String::from("https://api.resend.com/emails"));
        let mail_api_key = std::env::var("MAIL_API_KEY").unwrap_or_default();
        let mail_from = std::env::var("MAIL_FROM_ADDRESS")
            .unwrap_or_else(|_| String::from("Daybreak <noreply@daybreak.app>"));
        let mail_timeout_secs = std::env::var("DAYBREAK_MAIL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);

        let store_url = std::env::var("STORE_URL").unwrap_or_default();
        let store_anon_key = std::env::var("STORE_ANON_KEY").unwrap_or_default();
        let store_service_key = std::env::var("STORE_SERVICE_KEY").unwrap_or_default();
        let store_timeout_secs = std::env::var("DAYBREAK_STORE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);

        let daily_send_time =
            std::env::var("DAYBREAK_DAILY_SEND_TIME").unwrap_or_else(|_| String::from("06:00"));
        let tolerance_minutes = std::env::var("DAYBREAK_TOLERANCE_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_TOLERANCE_MINUTES);
        let utc_offset_hours = std::env::var("DAYBREAK_UTC_OFFSET_HOURS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(DEFAULT_UTC_OFFSET_HOURS);
        let site_url = std::env::var("DAYBREAK_SITE_URL")
            .unwrap_or_else(|_| String::from("https://daybreak.app"));
        let test_recipient = std::env::var("DAYBREAK_TEST_RECIPIENT").ok();

        let bind_address = std::env::var("DAYBREAK_BIND_ADDR")
            .ok()
            .and_then(|v| v.parse::<SocketAddr>().ok())
            .unwrap_or_else(default_bind_address);

        Ok(Self {
            mail: MailSettings {
                api_url: mail_api_url,
                api_key: mail_api_key,
                from_address: mail_from,
                timeout_secs: mail_timeout_secs,
            },
            store: StoreSettings {
                url: store_url,
                anon_key: store_anon_key,
                service_key: store_service_key,
                timeout_secs: store_timeout_secs,
            },
            delivery: DeliverySettings {
                daily_send_time,
                tolerance_minutes,
                utc_offset_hours,
                site_url,
                test_recipient,
            },
            server: ServerSettings {
                bind_address,
                enable_cors: true,
                enable_request_logging: true,
            },
        })
    }

    /// Validate configuration values
    ///
    /// Checks formats of the values that have them, not the presence of
    /// credentials (that is [`AppConfig::env_report`]'s job).
    pub fn validate(&self) -> Result<()> {
        if crate::clock::Clock::parse_time_of_day(&self.delivery.daily_send_time).is_none() {
            anyhow::bail!(
                "invalid daily_send_time '{}': expected HH:MM",
                self.delivery.daily_send_time
            );
        }

        if self.delivery.tolerance_minutes < 0 {
            anyhow::bail!("tolerance_minutes must not be negative");
        }

        if self.mail.timeout_secs == 0 || self.store.timeout_secs == 0 {
            anyhow::bail!("request timeouts must be greater than 0");
        }

        if Url::parse(&self.mail.api_url).is_err() {
            anyhow::bail!("invalid mail api_url '{}'", self.mail.api_url);
        }

        if !self.store.url.is_empty() && Url::parse(&self.store.url).is_err() {
            anyhow::bail!("invalid store url '{}'", self.store.url);
        }

        Ok(())
    }

    /// Enumerate which required environment variables are missing
    pub fn env_report() -> EnvReport {
        EnvReport::from_env()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mail: MailSettings {
                api_url: String::from("https://api.resend.com/emails"),
                api_key: String::new(),
                from_address: String::from("Daybreak <noreply@daybreak.app>"),
                timeout_secs: 10,
            },
            store: StoreSettings {
                url: String::new(),
                anon_key: String::new(),
                service_key: String::new(),
                timeout_secs: 10,
            },
            delivery: DeliverySettings {
                daily_send_time: String::from("06:00"),
                tolerance_minutes: DEFAULT_TOLERANCE_MINUTES,
                utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
                site_url: String::from("https://daybreak.app"),
                test_recipient: None,
            },
            server: ServerSettings {
                bind_address: default_bind_address(),
                enable_cors: true,
                enable_request_logging: true,
            },
        }
    }
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8787))
}

// ============================================================================
// Environment Report
// ============================================================================

/// Result of checking the required environment variables by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvReport {
    pub missing: Vec<String>,
    pub present: Vec<String>,
}

impl EnvReport {
    /// Check the process environment
    pub fn from_env() -> Self {
        let mut missing = Vec::new();
        let mut present = Vec::new();

        for name in REQUIRED_ENV_VARS {
            match std::env::var(name) {
                Ok(value) if !value.trim().is_empty() => present.push((*name).to_string()),
                _ => missing.push((*name).to_string()),
            }
        }

        Self { missing, present }
    }

    /// A report with everything present, for wiring tests
    pub fn valid() -> Self {
        Self {
            missing: Vec::new(),
            present: REQUIRED_ENV_VARS.iter().map(|v| (*v).to_string()).collect(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_daily_send_time() {
        let mut config = AppConfig::default();
        config.delivery.daily_send_time = String::from("sunrise");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let mut config = AppConfig::default();
        config.delivery.tolerance_minutes = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_store_url_rejected() {
        let mut config = AppConfig::default();
        config.store.url = String::from("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_report() {
        let report = EnvReport::valid();
        assert!(report.is_valid());
        assert_eq!(report.present.len(), REQUIRED_ENV_VARS.len());
    }
}
