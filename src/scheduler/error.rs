//! Error types for the delivery scheduler

use crate::mailer::MailError;
use crate::store::DirectoryError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
///
/// Per-user selection and transport failures never appear here; they are
/// recorded in the batch report and the audit log. These variants are the
/// batch-fatal (or single-send) failures only.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The candidate directory could not be read; fatal for the batch
    #[error("failed to fetch delivery candidates: {0}")]
    Directory(#[from] DirectoryError),

    /// A supplied window override is not an HH:MM time
    #[error("invalid window time '{time}': expected HH:MM")]
    InvalidWindow { time: String },

    /// A single-send transport call failed
    #[error("send failed: {0}")]
    Mail(#[from] MailError),

    /// A single-send selection failed
    #[error("selection failed: {0}")]
    Select(#[from] crate::selector::SelectError),
}
