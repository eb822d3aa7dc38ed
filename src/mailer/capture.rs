//! Capturing mail transport (for testing and dry runs)
//!
//! Records every outgoing email in memory instead of calling a provider.
//! The CLI `send --dry-run` path uses it to preview a batch without
//! spending provider quota; tests use it to assert on what would be sent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{is_valid_address, MailError, MailResult, Mailer, OutgoingEmail, SendReceipt};

/// Mail transport that captures instead of sending
#[derive(Default)]
pub struct CaptureMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    counter: AtomicUsize,
    fail_with: Mutex<Option<String>>,
}

impl CaptureMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with the given provider message
    pub fn set_failing(&self, message: impl Into<String>) {
        *self.fail_with.lock().expect("capture lock") = Some(message.into());
    }

    /// Clear a previously configured failure
    pub fn set_succeeding(&self) {
        *self.fail_with.lock().expect("capture lock") = None;
    }

    /// Everything captured so far, oldest first
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().expect("capture lock").clone()
    }

    /// Number of captured emails
    pub fn count(&self) -> usize {
        self.sent.lock().expect("capture lock").len()
    }
}

#[async_trait]
impl Mailer for CaptureMailer {
    fn name(&self) -> &str {
        "capture"
    }

    async fn send(&self, email: &OutgoingEmail) -> MailResult<SendReceipt> {
        if !is_valid_address(&email.to) {
            return Err(MailError::InvalidRecipient(email.to.clone()));
        }

        if let Some(message) = self.fail_with.lock().expect("capture lock").clone() {
            return Err(MailError::Rejected {
                status: 502,
                body: message,
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().expect("capture lock").push(email.clone());

        Ok(SendReceipt::new(format!("capture-{n}"), &email.to))
    }
}
