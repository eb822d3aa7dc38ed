//! daybreak - Daily highlight email delivery
//!
//! A personal knowledge-management backend: users store book highlights and
//! receive one of them by email every day at their configured time. The
//! interesting part lives in [`scheduler`]: a cron-triggered batch runner
//! with tolerance-based time matching and per-user failure isolation.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`clock`] - Delivery-zone time resolution and tolerance matching
//! - [`config`] - Configuration management and environment validation
//! - [`models`] - Core data structures and types
//! - [`store`] - Persistence service access (REST) and in-memory fakes
//! - [`selector`] - Per-user highlight selection
//! - [`mailer`] - Outbound email transport and composition
//! - [`scheduler`] - The batch delivery runner
//! - [`server`] - HTTP trigger endpoints
//!
//! # Example
//!
//! ```no_run
//! use daybreak::config::AppConfig;
//! use daybreak::server::DeliveryServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let server = DeliveryServer::new(config)?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod mailer;
pub mod models;
pub mod scheduler;
pub mod selector;
pub mod server;
pub mod store;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::Clock;
    pub use crate::config::{AppConfig, EnvReport};
    pub use crate::mailer::{EmailComposer, Mailer, OutgoingEmail, SendReceipt};
    pub use crate::models::{
        AttemptKind, AttemptOutcome, DeliveryAttempt, DeliveryCandidate, HighlightRecord,
        SelectedHighlight, SelectionMode,
    };
    pub use crate::scheduler::{BatchReport, BatchRequest, DeliveryScheduler, SchedulerError};
    pub use crate::selector::HighlightSelector;
    pub use crate::server::DeliveryServer;
    pub use crate::store::{AttemptLog, HighlightStore, UserDirectory};
}

// Direct re-exports for convenience
pub use models::{DeliveryCandidate, HighlightRecord, SelectedHighlight, SelectionMode};
