//! Shared fixtures for integration tests

use std::sync::Arc;

use daybreak::clock::Clock;
use daybreak::mailer::{CaptureMailer, EmailComposer};
use daybreak::models::{DeliveryCandidate, HighlightRecord};
use daybreak::scheduler::DeliveryScheduler;
use daybreak::selector::HighlightSelector;
use daybreak::store::{MemoryAttemptLog, MemoryDirectory, MemoryHighlightStore};

/// A fully wired scheduler over in-memory collaborators
pub struct TestHarness {
    pub scheduler: DeliveryScheduler,
    pub directory: Arc<MemoryDirectory>,
    pub highlights: Arc<MemoryHighlightStore>,
    pub mailer: Arc<CaptureMailer>,
    pub audit: Arc<MemoryAttemptLog>,
}

pub fn harness(candidates: Vec<DeliveryCandidate>) -> TestHarness {
    let directory = Arc::new(MemoryDirectory::new(candidates));
    let highlights = Arc::new(MemoryHighlightStore::new());
    let mailer = Arc::new(CaptureMailer::new());
    let audit = Arc::new(MemoryAttemptLog::new());

    let scheduler = DeliveryScheduler::new(
        Clock::default(),
        directory.clone(),
        HighlightSelector::new(highlights.clone()),
        mailer.clone(),
        audit.clone(),
        EmailComposer::new("https://daybreak.app"),
    );

    TestHarness {
        scheduler,
        directory,
        highlights,
        mailer,
        audit,
    }
}

pub fn candidate(id: &str, send_time: &str) -> DeliveryCandidate {
    DeliveryCandidate::new(id, format!("{id}@example.com")).with_send_time(send_time)
}

pub fn highlight(id: &str, body: &str, title: &str, author: &str) -> HighlightRecord {
    HighlightRecord::new(id, body).with_book(format!("bk-{id}"), title, author)
}
