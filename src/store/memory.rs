//! In-memory store implementations (for testing and dry runs)
//!
//! These mirror the REST implementations behind the same traits so the
//! scheduler can be exercised without a live persistence service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::audit::AttemptLog;
use super::directory::{DirectoryError, UserDirectory};
use super::highlights::HighlightStore;
use super::{StoreError, StoreResult};
use crate::models::{DeliveryAttempt, DeliveryCandidate, HighlightRecord};

// ============================================================================
// Directory
// ============================================================================

/// In-memory candidate directory
#[derive(Default)]
pub struct MemoryDirectory {
    candidates: Mutex<Vec<DeliveryCandidate>>,
    fail: AtomicBool,
}

impl MemoryDirectory {
    pub fn new(candidates: Vec<DeliveryCandidate>) -> Self {
        Self {
            candidates: Mutex::new(candidates),
            fail: AtomicBool::new(false),
        }
    }

    /// Make the next fetches fail, simulating a directory outage
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn fetch_due_candidates(&self) -> Result<Vec<DeliveryCandidate>, DirectoryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable(
                "simulated directory outage".to_string(),
            ));
        }

        Ok(self.candidates.lock().expect("directory lock").clone())
    }
}

// ============================================================================
// Highlights
// ============================================================================

/// In-memory highlight store keyed by owner
#[derive(Default)]
pub struct MemoryHighlightStore {
    by_owner: Mutex<HashMap<String, Vec<HighlightRecord>>>,
    fail: AtomicBool,
}

impl MemoryHighlightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a highlight owned by `user_id`
    pub fn insert(&self, user_id: impl Into<String>, record: HighlightRecord) {
        self.by_owner
            .lock()
            .expect("highlight lock")
            .entry(user_id.into())
            .or_default()
            .push(record);
    }

    /// Make the next reads fail, simulating a store outage
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "simulated highlight store outage".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl HighlightStore for MemoryHighlightStore {
    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<HighlightRecord>> {
        self.check_available()?;
        Ok(self
            .by_owner
            .lock()
            .expect("highlight lock")
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_for_user(
        &self,
        user_id: &str,
        highlight_id: &str,
    ) -> StoreResult<Option<HighlightRecord>> {
        self.check_available()?;
        Ok(self
            .by_owner
            .lock()
            .expect("highlight lock")
            .get(user_id)
            .and_then(|records| records.iter().find(|r| r.id == highlight_id).cloned()))
    }

    async fn fetch_by_id(&self, highlight_id: &str) -> StoreResult<Option<HighlightRecord>> {
        self.check_available()?;
        Ok(self
            .by_owner
            .lock()
            .expect("highlight lock")
            .values()
            .flatten()
            .find(|r| r.id == highlight_id)
            .cloned())
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<HighlightRecord>> {
        self.check_available()?;
        Ok(self
            .by_owner
            .lock()
            .expect("highlight lock")
            .values()
            .flatten()
            .take(limit)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Audit log
// ============================================================================

/// In-memory audit log
#[derive(Default)]
pub struct MemoryAttemptLog {
    records: Mutex<Vec<DeliveryAttempt>>,
    reject_writes: AtomicBool,
}

impl MemoryAttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `record` report failure, simulating an audit outage
    pub fn set_rejecting(&self, rejecting: bool) {
        self.reject_writes.store(rejecting, Ordering::SeqCst);
    }

    /// Everything recorded so far, oldest first
    pub fn records(&self) -> Vec<DeliveryAttempt> {
        self.records.lock().expect("audit lock").clone()
    }
}

#[async_trait]
impl AttemptLog for MemoryAttemptLog {
    async fn record(&self, attempt: &DeliveryAttempt) -> bool {
        if self.reject_writes.load(Ordering::SeqCst) {
            tracing::warn!(
                user_id = %attempt.user_id,
                "in-memory audit log rejecting writes"
            );
            return false;
        }

        self.records
            .lock()
            .expect("audit lock")
            .push(attempt.clone());
        true
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<DeliveryAttempt>> {
        Ok(self
            .records
            .lock()
            .expect("audit lock")
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttemptDetail, AttemptKind};

    #[tokio::test]
    async fn test_memory_directory_round_trip() {
        let directory = MemoryDirectory::new(vec![DeliveryCandidate::new(
            "user-1",
            "reader@example.com",
        )]);

        let candidates = directory.fetch_due_candidates().await.unwrap();
        assert_eq!(candidates.len(), 1);

        directory.set_failing(true);
        assert!(directory.fetch_due_candidates().await.is_err());
    }

    #[tokio::test]
    async fn test_memory_highlights_scoped_lookup() {
        let store = MemoryHighlightStore::new();
        store.insert("user-1", HighlightRecord::new("hl-1", "one"));
        store.insert("user-2", HighlightRecord::new("hl-2", "two"));

        assert_eq!(store.list_for_user("user-1").await.unwrap().len(), 1);
        assert!(store
            .fetch_for_user("user-1", "hl-2")
            .await
            .unwrap()
            .is_none());
        assert!(store.fetch_by_id("hl-2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_audit_recent_is_newest_first() {
        let log = MemoryAttemptLog::new();

        for i in 0..3 {
            let attempt = DeliveryAttempt::success(
                "user-1",
                AttemptKind::Scheduled,
                AttemptDetail {
                    message_id: Some(format!("em_{i}")),
                    ..Default::default()
                },
            );
            assert!(log.record(&attempt).await);
        }

        let recent = log.recent_for_user("user-1", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].detail.message_id.as_deref(), Some("em_2"));
    }
}
