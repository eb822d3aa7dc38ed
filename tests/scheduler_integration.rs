//! Integration tests for the delivery batch pipeline
//!
//! These exercise the scheduler end to end over in-memory collaborators:
//! window matching, mode filtering, per-user failure isolation, audit
//! logging, and the operator test-send paths.

mod common;

use common::{candidate, harness, highlight};
use daybreak::models::{AttemptKind, AttemptOutcome};
use daybreak::scheduler::{BatchRequest, OutcomeStatus};

// ============================================================================
// Mixed-outcome batch
// ============================================================================

#[tokio::test]
async fn test_mixed_batch_aggregates_every_outcome() {
    // user1: random mode, matches the window, has content
    // user2: specific mode, within tolerance, but the pin dangles
    // user3: send time far outside the window
    let user2 = candidate("user2", "06:02").with_pinned_highlight("hl-deleted");
    let h = harness(vec![candidate("user1", "06:00"), user2, candidate("user3", "12:00")]);

    h.highlights.insert(
        "user1",
        highlight("hl-1", "The sea advances insensibly.", "The Sea", "J. Michelet"),
    );

    let report = h
        .scheduler
        .run(&BatchRequest::at_time("06:00"))
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(report.sent, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 1);

    // The failure names the dangling pin
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("user user2:"));
    assert!(report.errors[0].contains("hl-deleted"));

    // Exactly one email left the building, with real book metadata
    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "user1@example.com");
    assert_eq!(sent[0].subject, "Your Daily Highlight from The Sea");
    assert!(sent[0].text_body.contains("The sea advances insensibly."));

    // Audit: one success for user1, one failure for user2, nothing for the
    // pure time-mismatch skip of user3
    let records = h.audit.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].user_id, "user1");
    assert_eq!(records[0].outcome, AttemptOutcome::Success);
    assert_eq!(records[1].user_id, "user2");
    assert_eq!(records[1].outcome, AttemptOutcome::Failure);
    assert!(records.iter().all(|r| r.kind == AttemptKind::Scheduled));
}

// ============================================================================
// Tolerance window behavior
// ============================================================================

#[tokio::test]
async fn test_two_ticks_inside_the_window_both_deliver() {
    // The design accepts duplicates: two trigger firings landing inside the
    // same tolerance window both send to the same due user.
    let h = harness(vec![candidate("user1", "06:00")]);
    h.highlights
        .insert("user1", highlight("hl-1", "Twice is fine.", "Letters", "Anon"));

    let first = h
        .scheduler
        .run(&BatchRequest::at_time("06:02"))
        .await
        .unwrap();
    let second = h
        .scheduler
        .run(&BatchRequest::at_time("06:04"))
        .await
        .unwrap();

    assert_eq!(first.sent, 1);
    assert_eq!(second.sent, 1);
    assert_eq!(h.mailer.count(), 2);
    assert_eq!(h.audit.records().len(), 2);
}

#[tokio::test]
async fn test_tick_outside_the_window_skips() {
    let h = harness(vec![candidate("user1", "06:00")]);
    h.highlights
        .insert("user1", highlight("hl-1", "Not yet.", "Letters", "Anon"));

    let report = h
        .scheduler
        .run(&BatchRequest::at_time("06:06"))
        .await
        .unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(h.mailer.count(), 0);
}

#[tokio::test]
async fn test_force_all_ignores_every_send_time() {
    let h = harness(vec![
        candidate("user1", "23:00"),
        candidate("user2", "04:30"),
    ]);
    h.highlights
        .insert("user1", highlight("hl-1", "One.", "Letters", "Anon"));
    h.highlights
        .insert("user2", highlight("hl-2", "Two.", "Letters", "Anon"));

    let request = BatchRequest {
        target_time: Some("06:00".to_string()),
        force_all: true,
        ..Default::default()
    };

    let report = h.scheduler.run(&request).await.unwrap();
    assert_eq!(report.sent, 2);
    assert_eq!(report.skipped, 0);
}

// ============================================================================
// Isolation
// ============================================================================

#[tokio::test]
async fn test_early_failure_leaves_later_users_untouched() {
    // user1 fails selection (no content); user2 and user3 still deliver
    let h = harness(vec![
        candidate("user1", "06:00"),
        candidate("user2", "06:00"),
        candidate("user3", "06:00"),
    ]);
    h.highlights
        .insert("user2", highlight("hl-2", "Two.", "Letters", "Anon"));
    h.highlights
        .insert("user3", highlight("hl-3", "Three.", "Letters", "Anon"));

    let report = h.scheduler.run(&BatchRequest::everyone()).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.sent, 2);

    let delivered: Vec<String> = h.mailer.sent().iter().map(|e| e.to.clone()).collect();
    assert_eq!(delivered, vec!["user2@example.com", "user3@example.com"]);
}

#[tokio::test]
async fn test_directory_outage_fails_the_whole_batch() {
    let h = harness(vec![candidate("user1", "06:00")]);
    h.directory.set_failing(true);

    let result = h.scheduler.run(&BatchRequest::everyone()).await;
    assert!(result.is_err());
    assert_eq!(h.mailer.count(), 0);
    assert!(h.audit.records().is_empty());
}

// ============================================================================
// Operator test sends
// ============================================================================

#[tokio::test]
async fn test_test_send_prefers_stored_content() {
    let h = harness(vec![]);
    h.highlights.insert(
        "someone",
        highlight("hl-42", "A stored thought.", "Journals", "R. W. Emerson"),
    );

    let report = h
        .scheduler
        .run_test_send("ops@example.com", None)
        .await
        .unwrap();

    assert_eq!(report.highlight_id.as_deref(), Some("hl-42"));
    assert_eq!(report.book_title.as_deref(), Some("Journals"));

    let sent = h.mailer.sent();
    assert_eq!(sent[0].subject, "Your Daily Highlight from Journals");
}

#[tokio::test]
async fn test_test_send_with_explicit_highlight() {
    let h = harness(vec![]);
    h.highlights.insert(
        "someone",
        highlight("hl-1", "First.", "Journals", "R. W. Emerson"),
    );
    h.highlights.insert(
        "someone-else",
        highlight("hl-2", "Second.", "Walden", "H. D. Thoreau"),
    );

    let report = h
        .scheduler
        .run_test_send("ops@example.com", Some("hl-2"))
        .await
        .unwrap();

    assert_eq!(report.highlight_id.as_deref(), Some("hl-2"));
    assert_eq!(report.book_title.as_deref(), Some("Walden"));
}

#[tokio::test]
async fn test_connectivity_test_needs_no_content() {
    let h = harness(vec![]);

    let report = h
        .scheduler
        .run_connectivity_test("ops@example.com")
        .await
        .unwrap();

    assert!(report.highlight_id.is_none());
    assert_eq!(h.mailer.count(), 1);

    let records = h.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, AttemptKind::Test);
}

// ============================================================================
// Report shape
// ============================================================================

#[tokio::test]
async fn test_detail_lines_cover_every_candidate_once() {
    let user2 = candidate("user2", "06:00").with_pinned_highlight("hl-gone");
    let h = harness(vec![candidate("user1", "06:00"), user2, candidate("user3", "20:00")]);
    h.highlights
        .insert("user1", highlight("hl-1", "One.", "Letters", "Anon"));

    let report = h
        .scheduler
        .run(&BatchRequest::at_time("06:00"))
        .await
        .unwrap();

    assert_eq!(report.user_details.len(), 3);

    let statuses: Vec<OutcomeStatus> = report.user_details.iter().map(|d| d.status).collect();
    assert_eq!(
        statuses,
        vec![
            OutcomeStatus::Sent,
            OutcomeStatus::Failed,
            OutcomeStatus::Skipped
        ]
    );

    // Each bucket counted exactly once
    assert_eq!(report.sent + report.skipped + report.failed, report.processed);
}
