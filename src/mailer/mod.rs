//! Outbound email transport
//!
//! The mail provider is an external HTTP send API; this module defines the
//! transport trait, the message/receipt types, and the composer that turns
//! a selected highlight into a deliverable email. Exactly one provider call
//! is made per delivery attempt: retrying inside the transport would break
//! the one-attempt-per-user-per-window contract of the scheduler.

pub mod api;
pub mod capture;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub use api::{ApiMailer, MailerConfig};
pub use capture::CaptureMailer;

/// Result type for mail operations
pub type MailResult<T> = Result<T, MailError>;

/// Errors that can occur sending mail
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// HTTP request failed
    #[error("mail request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the send
    #[error("mail provider answered {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The recipient address is not deliverable
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),

    /// Invalid transport configuration
    #[error("invalid mailer configuration: {0}")]
    InvalidConfig(String),
}

/// One outbound email, transport-agnostic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,

    /// Plain-text alternative for deliverability
    pub text_body: String,
}

/// Receipt returned by a successful send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Provider-assigned message id
    pub message_id: String,
    pub to: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl SendReceipt {
    pub fn new(message_id: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            to: to.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Trait for outbound mail transports
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Get the transport name
    fn name(&self) -> &str;

    /// Send one email
    async fn send(&self, email: &OutgoingEmail) -> MailResult<SendReceipt>;

    /// Check if the transport is available
    async fn health_check(&self) -> MailResult<bool> {
        Ok(true)
    }
}

/// Pragmatic deliverability check for a recipient address
pub fn is_valid_address(address: &str) -> bool {
    if address.contains(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };

    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

// ============================================================================
// Email Composer
// ============================================================================

/// Builds the outgoing emails from selected content
///
/// The markup is deliberately minimal; presentation is not this service's
/// concern.
#[derive(Debug, Clone)]
pub struct EmailComposer {
    site_url: String,
}

impl EmailComposer {
    pub fn new(site_url: impl Into<String>) -> Self {
        let site_url = site_url.into();
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    fn unsubscribe_url(&self, user_id: &str) -> String {
        format!(
            "{}/settings?unsubscribe=true&userId={}",
            self.site_url, user_id
        )
    }

    /// Compose the daily highlight email for a user
    pub fn daily_highlight(
        &self,
        to: &str,
        user_id: &str,
        highlight: &crate::models::SelectedHighlight,
    ) -> OutgoingEmail {
        let subject = format!("Your Daily Highlight from {}", highlight.book_title);
        let text_body = format!(
            "Your highlight from {} by {}: {}",
            highlight.book_title, highlight.book_author, highlight.body
        );

        let html_body = format!(
            "<h2>{title}</h2>\n\
             <p><em>{author}</em></p>\n\
             <blockquote>{body}</blockquote>\n\
             <p><a href=\"{unsubscribe}\">Unsubscribe</a></p>",
            title = html_escape::encode_text(&highlight.book_title),
            author = html_escape::encode_text(&highlight.book_author),
            body = html_escape::encode_text(&highlight.body),
            unsubscribe = self.unsubscribe_url(user_id),
        );

        OutgoingEmail {
            to: to.to_string(),
            subject,
            html_body,
            text_body,
        }
    }

    /// Compose the connectivity-test email sent by the test trigger
    pub fn connectivity_test(&self, to: &str, timestamp: &DateTime<FixedOffset>) -> OutgoingEmail {
        let subject = format!("Daybreak Test Email - {}", timestamp.format("%Y-%m-%d %H:%M"));
        let text_body = format!(
            "This is an automated test email from the delivery scheduler.\n\n\
             Timestamp: {}\n\n\
             Receiving it confirms that scheduled sending is configured correctly.",
            timestamp.to_rfc3339()
        );

        let html_body = format!(
            "<h2>Daybreak Test Email</h2>\n\
             <p>This is an automated test email from the delivery scheduler.</p>\n\
             <p>Timestamp: {}</p>\n\
             <p>Receiving it confirms that scheduled sending is configured correctly.</p>",
            timestamp.to_rfc3339()
        );

        OutgoingEmail {
            to: to.to_string(),
            subject,
            html_body,
            text_body,
        }
    }
}
