//! HTTP trigger server
//!
//! Hosts the cron and operator trigger endpoints in front of the delivery
//! scheduler. The server deliberately starts even when required credentials
//! are missing: every trigger endpoint then answers with the exact list of
//! missing environment variables instead of an opaque downstream failure.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::clock::Clock;
use crate::config::{AppConfig, EnvReport};
use crate::mailer::{ApiMailer, EmailComposer, MailerConfig};
use crate::scheduler::DeliveryScheduler;
use crate::selector::HighlightSelector;
use crate::store::{
    AttemptLog, RestAttemptLog, RestHighlightStore, RestUserDirectory, StoreClient, StoreConfig,
};

use api::create_router;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The delivery scheduler behind every trigger
    pub scheduler: Arc<DeliveryScheduler>,

    /// Audit log, exposed for log inspection endpoints
    pub audit: Arc<dyn AttemptLog>,

    /// Delivery-zone clock
    pub clock: Clock,

    /// Configuration
    pub config: AppConfig,

    /// Required-variable report captured at startup
    pub env: Arc<EnvReport>,

    /// Server start time
    pub start_time: Instant,
}

// ============================================================================
// Delivery Server
// ============================================================================

/// Main trigger server
pub struct DeliveryServer {
    config: AppConfig,
    state: AppState,
}

impl DeliveryServer {
    /// Create a new delivery server
    pub fn new(config: AppConfig) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let env = Arc::new(AppConfig::env_report());
        if !env.is_valid() {
            tracing::warn!(
                missing = ?env.missing,
                "starting degraded: trigger endpoints will refuse to run"
            );
        }

        let store_client = Arc::new(
            StoreClient::new(StoreConfig::from(&config.store))
                .map_err(|e| ServerError::Init(e.to_string()))?,
        );

        let directory = Arc::new(RestUserDirectory::new(store_client.clone()));
        let highlights = Arc::new(RestHighlightStore::new(store_client.clone()));
        let audit: Arc<dyn AttemptLog> = Arc::new(RestAttemptLog::new(store_client));

        let mailer = Arc::new(
            ApiMailer::new(MailerConfig::from(&config.mail))
                .map_err(|e| ServerError::Init(e.to_string()))?,
        );

        let clock = Clock::new(config.delivery.utc_offset_hours);
        let scheduler = Arc::new(
            DeliveryScheduler::new(
                clock,
                directory,
                HighlightSelector::new(highlights),
                mailer,
                audit.clone(),
                EmailComposer::new(config.delivery.site_url.clone()),
            )
            .with_tolerance(config.delivery.tolerance_minutes),
        );

        let state = AppState {
            scheduler,
            audit,
            clock,
            config: config.clone(),
            env,
            start_time: Instant::now(),
        };

        Ok(Self { config, state })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.server.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.server.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Start the server
    pub async fn start(&self) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.config.server.bind_address;

        tracing::info!("starting delivery server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        Ok(())
    }

    /// Start with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.config.server.bind_address;

        tracing::info!("starting delivery server on {} (with graceful shutdown)", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("delivery server shutdown complete");
        Ok(())
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.config.server.bind_address,
            daily_send_time: self.config.delivery.daily_send_time.clone(),
            tolerance_minutes: self.config.delivery.tolerance_minutes,
            cors_enabled: self.config.server.enable_cors,
            request_logging_enabled: self.config.server.enable_request_logging,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub daily_send_time: String,
    pub tolerance_minutes: i64,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "Delivery Server\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Daily Send Time: {}\n\
             Tolerance: {}m\n\
             CORS: {}\n\
             Request Logging: {}",
            "",
            self.bind_address,
            self.daily_send_time,
            self.tolerance_minutes,
            if self.cors_enabled { "enabled" } else { "disabled" },
            if self.request_logging_enabled {
                "enabled"
            } else {
                "disabled"
            }
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Initialization error
    #[error("initialization error: {0}")]
    Init(String),

    /// Failed to bind to address
    #[error("failed to bind: {0}")]
    Bind(String),

    /// Server error
    #[error("server error: {0}")]
    Serve(String),
}
