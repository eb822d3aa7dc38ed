//! Batch runner and per-user delivery pipeline
//!
//! One [`DeliveryScheduler::run`] call is one batch: resolve the window
//! time, fetch candidates, then for each candidate filter → select → send
//! → audit, strictly in that order and fully before the next candidate.
//! All collaborators are injected so tests substitute fakes without any
//! process-wide state.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{SchedulerError, SchedulerResult};
use crate::clock::Clock;
use crate::mailer::{EmailComposer, Mailer};
use crate::models::{AttemptDetail, AttemptKind, DeliveryAttempt, DeliveryCandidate};
use crate::selector::HighlightSelector;
use crate::store::{AttemptLog, UserDirectory};

/// User id attached to audit records of operator-initiated test sends
const OPERATOR_USER_ID: &str = "operator";

// ============================================================================
// Batch Request
// ============================================================================

/// Parameters of one batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchRequest {
    /// Compare user send times against this "HH:MM" instead of the clock
    pub target_time: Option<String>,

    /// Process every candidate regardless of their send time
    ///
    /// This is the only flag that bypasses the time filter; `target_time`
    /// alone just changes what the filter compares against.
    pub force_all: bool,

    /// Only process users in random selection mode
    pub only_random: bool,

    /// Only process users in specific selection mode
    pub only_specific: bool,
}

impl BatchRequest {
    /// A run pinned to a fixed window time (cohort send)
    pub fn at_time(time: impl Into<String>) -> Self {
        Self {
            target_time: Some(time.into()),
            ..Default::default()
        }
    }

    /// A run that processes everyone
    pub fn everyone() -> Self {
        Self {
            force_all: true,
            ..Default::default()
        }
    }
}

// ============================================================================
// Batch Report
// ============================================================================

/// Outcome bucket a processed user lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Sent,
    Skipped,
    Failed,
}

/// Per-user detail line in the batch report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOutcome {
    pub user_id: String,
    pub address: String,
    pub status: OutcomeStatus,
    pub reason: String,
}

/// Aggregate result of one batch run
///
/// `sent`, `skipped` and `failed` are mutually exclusive per user and sum
/// to `processed`. Skip reasons live only here; they are never persisted
/// to the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: Uuid,

    /// The "HH:MM" string user send times were compared against
    pub window_time: String,

    pub timestamp: DateTime<FixedOffset>,

    pub total: usize,
    pub processed: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,

    /// One "user <id>: <message>" line per failed user
    pub errors: Vec<String>,

    pub user_details: Vec<UserOutcome>,
}

impl BatchReport {
    fn new(window_time: String, timestamp: DateTime<FixedOffset>, total: usize) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            window_time,
            timestamp,
            total,
            processed: 0,
            sent: 0,
            skipped: 0,
            failed: 0,
            errors: Vec::new(),
            user_details: Vec::new(),
        }
    }

    fn mark_sent(&mut self, candidate: &DeliveryCandidate, reason: String) {
        self.sent += 1;
        self.push_detail(candidate, OutcomeStatus::Sent, reason);
    }

    fn mark_skipped(&mut self, candidate: &DeliveryCandidate, reason: String) {
        self.skipped += 1;
        self.push_detail(candidate, OutcomeStatus::Skipped, reason);
    }

    fn mark_failed(&mut self, candidate: &DeliveryCandidate, message: String) {
        self.failed += 1;
        self.errors
            .push(format!("user {}: {}", candidate.user_id, message));
        self.push_detail(candidate, OutcomeStatus::Failed, message);
    }

    fn push_detail(&mut self, candidate: &DeliveryCandidate, status: OutcomeStatus, reason: String) {
        self.user_details.push(UserOutcome {
            user_id: candidate.user_id.clone(),
            address: candidate.address.clone(),
            status,
            reason,
        });
    }
}

/// Result of one operator-initiated single send
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSendReport {
    pub message_id: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_title: Option<String>,
    pub sent_at: DateTime<FixedOffset>,
}

// ============================================================================
// Delivery Scheduler
// ============================================================================

/// Orchestrates one batch of scheduled deliveries
pub struct DeliveryScheduler {
    clock: Clock,
    directory: Arc<dyn UserDirectory>,
    selector: HighlightSelector,
    mailer: Arc<dyn Mailer>,
    audit: Arc<dyn AttemptLog>,
    composer: EmailComposer,
    tolerance_minutes: i64,
}

impl DeliveryScheduler {
    pub fn new(
        clock: Clock,
        directory: Arc<dyn UserDirectory>,
        selector: HighlightSelector,
        mailer: Arc<dyn Mailer>,
        audit: Arc<dyn AttemptLog>,
        composer: EmailComposer,
    ) -> Self {
        Self {
            clock,
            directory,
            selector,
            mailer,
            audit,
            composer,
            tolerance_minutes: crate::clock::DEFAULT_TOLERANCE_MINUTES,
        }
    }

    /// Override the send-time tolerance
    pub fn with_tolerance(mut self, minutes: i64) -> Self {
        self.tolerance_minutes = minutes;
        self
    }

    /// The clock this scheduler resolves window times with
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Run one delivery batch
    ///
    /// Fatal errors (unreadable directory, malformed window override)
    /// return `Err` with nothing logged. Everything else lands in the
    /// report: each candidate is counted exactly once under sent, skipped
    /// or failed, and one user's failure never stops the next user.
    pub async fn run(&self, request: &BatchRequest) -> SchedulerResult<BatchReport> {
        if let Some(target) = request.target_time.as_deref() {
            if Clock::parse_time_of_day(target).is_none() {
                return Err(SchedulerError::InvalidWindow {
                    time: target.to_string(),
                });
            }
        }

        let now = self.clock.now();
        let window_time = request
            .target_time
            .clone()
            .unwrap_or_else(|| Clock::time_of_day(&now));

        tracing::info!(
            window_time = %window_time,
            force_all = request.force_all,
            only_random = request.only_random,
            only_specific = request.only_specific,
            "starting delivery batch"
        );

        let candidates = self.directory.fetch_due_candidates().await?;
        let mut report = BatchReport::new(window_time.clone(), now, candidates.len());

        if candidates.is_empty() {
            tracing::info!("no delivery candidates configured");
            return Ok(report);
        }

        for candidate in &candidates {
            report.processed += 1;
            self.process_candidate(candidate, &window_time, request, &mut report)
                .await;
        }

        tracing::info!(
            batch_id = %report.batch_id,
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            "delivery batch completed"
        );

        Ok(report)
    }

    /// Filter → select → send → audit for one candidate
    ///
    /// Pure skips (filters) only show up in the report; selection and
    /// transport outcomes additionally write one audit record.
    async fn process_candidate(
        &self,
        candidate: &DeliveryCandidate,
        window_time: &str,
        request: &BatchRequest,
        report: &mut BatchReport,
    ) {
        // The directory excludes address-less users at the source; re-check
        // in case a different implementation slips one through.
        if candidate.address.trim().is_empty() {
            tracing::debug!(user_id = %candidate.user_id, "skipping: no contact address");
            report.mark_skipped(candidate, "no contact address".to_string());
            return;
        }

        if request.only_random && !candidate.mode.is_random() {
            report.mark_skipped(candidate, "not a random-mode user".to_string());
            return;
        }

        if request.only_specific && candidate.mode.is_random() {
            report.mark_skipped(candidate, "not a specific-mode user".to_string());
            return;
        }

        if !request.force_all
            && !Clock::is_within_tolerance(&candidate.send_time, window_time, self.tolerance_minutes)
        {
            report.mark_skipped(
                candidate,
                format!("time mismatch ({} vs {})", candidate.send_time, window_time),
            );
            return;
        }

        let highlight = match self.selector.select_for(candidate).await {
            Ok(highlight) => highlight,
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(user_id = %candidate.user_id, error = %message, "selection failed");

                self.audit
                    .record(&DeliveryAttempt::failure(
                        candidate.user_id.as_str(),
                        AttemptKind::Scheduled,
                        AttemptDetail {
                            error: Some(message.clone()),
                            ..Default::default()
                        },
                    ))
                    .await;

                report.mark_failed(candidate, message);
                return;
            }
        };

        let email = self
            .composer
            .daily_highlight(&candidate.address, &candidate.user_id, &highlight);

        match self.mailer.send(&email).await {
            Ok(receipt) => {
                self.audit
                    .record(&DeliveryAttempt::success(
                        candidate.user_id.as_str(),
                        AttemptKind::Scheduled,
                        AttemptDetail {
                            highlight_id: Some(highlight.highlight_id.clone()),
                            message_id: Some(receipt.message_id.clone()),
                            book_title: Some(highlight.book_title.clone()),
                            ..Default::default()
                        },
                    ))
                    .await;

                report.mark_sent(
                    candidate,
                    format!("delivered (message id {})", receipt.message_id),
                );
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(user_id = %candidate.user_id, error = %message, "transport failed");

                self.audit
                    .record(&DeliveryAttempt::failure(
                        candidate.user_id.as_str(),
                        AttemptKind::Scheduled,
                        AttemptDetail {
                            highlight_id: Some(highlight.highlight_id.clone()),
                            error: Some(message.clone()),
                            ..Default::default()
                        },
                    ))
                    .await;

                report.mark_failed(candidate, message);
            }
        }
    }

    /// Send one ad-hoc highlight email to an operator-chosen recipient
    ///
    /// Uses the daily template with a real highlight when one exists so the
    /// test exercises the same path as a scheduled send. Logged with
    /// kind=test.
    pub async fn run_test_send(
        &self,
        recipient: &str,
        highlight_id: Option<&str>,
    ) -> SchedulerResult<TestSendReport> {
        let highlight = self.selector.pick_for_test(highlight_id).await?;
        let email = self
            .composer
            .daily_highlight(recipient, OPERATOR_USER_ID, &highlight);

        let result = self.mailer.send(&email).await;
        self.audit_test_send(&result, Some(&highlight.highlight_id))
            .await;
        let receipt = result?;

        Ok(TestSendReport {
            message_id: receipt.message_id,
            to: recipient.to_string(),
            highlight_id: Some(highlight.highlight_id),
            book_title: Some(highlight.book_title),
            sent_at: self.clock.now(),
        })
    }

    /// Send the connectivity-test email to an operator-chosen recipient
    ///
    /// No store content involved; proves the transport path alone. Logged
    /// with kind=test.
    pub async fn run_connectivity_test(&self, recipient: &str) -> SchedulerResult<TestSendReport> {
        let now = self.clock.now();
        let email = self.composer.connectivity_test(recipient, &now);

        let result = self.mailer.send(&email).await;
        self.audit_test_send(&result, None).await;
        let receipt = result?;

        Ok(TestSendReport {
            message_id: receipt.message_id,
            to: recipient.to_string(),
            highlight_id: None,
            book_title: None,
            sent_at: now,
        })
    }

    async fn audit_test_send(
        &self,
        result: &Result<crate::mailer::SendReceipt, crate::mailer::MailError>,
        highlight_id: Option<&str>,
    ) {
        let attempt = match result {
            Ok(receipt) => DeliveryAttempt::success(
                OPERATOR_USER_ID,
                AttemptKind::Test,
                AttemptDetail {
                    highlight_id: highlight_id.map(str::to_string),
                    message_id: Some(receipt.message_id.clone()),
                    ..Default::default()
                },
            ),
            Err(e) => DeliveryAttempt::failure(
                OPERATOR_USER_ID,
                AttemptKind::Test,
                AttemptDetail {
                    highlight_id: highlight_id.map(str::to_string),
                    error: Some(e.to_string()),
                    ..Default::default()
                },
            ),
        };

        self.audit.record(&attempt).await;
    }
}
