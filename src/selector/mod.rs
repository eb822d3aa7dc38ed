//! Per-user content selection
//!
//! Resolves which highlight a user receives today. Random mode draws
//! uniformly from the user's whole collection; specific mode fetches the
//! pinned highlight scoped to its owner. A pin that dangles (the highlight
//! was deleted) fails that user's attempt, never the batch.

use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::models::{DeliveryCandidate, SelectedHighlight, SelectionMode};
use crate::store::{HighlightStore, StoreError};

/// Result type for selection operations
pub type SelectResult<T> = Result<T, SelectError>;

/// Errors from content selection
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    /// The user has no highlights to draw from
    #[error("no highlights found for user {user_id}")]
    NoContent { user_id: String },

    /// The pinned highlight does not exist (or belongs to someone else)
    #[error("highlight {highlight_id} not found for user {user_id}")]
    NotFound {
        user_id: String,
        highlight_id: String,
    },

    /// Specific mode with no pinned highlight configured
    #[error("selection mode is specific but no highlight is pinned")]
    MissingPin,

    /// The underlying highlight read failed
    #[error("highlight lookup failed: {0}")]
    Store(#[from] StoreError),
}

/// Body used when an operator test send finds an empty store
const SAMPLE_BODY: &str =
    "This is a sample highlight used to verify that scheduled delivery is working end to end.";

/// Chooses the highlight delivered to a user
pub struct HighlightSelector {
    store: Arc<dyn HighlightStore>,
}

impl HighlightSelector {
    pub fn new(store: Arc<dyn HighlightStore>) -> Self {
        Self { store }
    }

    /// Select today's highlight for a candidate according to their mode
    pub async fn select_for(
        &self,
        candidate: &DeliveryCandidate,
    ) -> SelectResult<SelectedHighlight> {
        match candidate.mode {
            SelectionMode::Random => self.select_random(&candidate.user_id).await,
            SelectionMode::Specific => {
                let pinned = candidate
                    .pinned_highlight_id
                    .as_deref()
                    .ok_or(SelectError::MissingPin)?;
                self.select_pinned(&candidate.user_id, pinned).await
            }
        }
    }

    async fn select_random(&self, user_id: &str) -> SelectResult<SelectedHighlight> {
        let records = self.store.list_for_user(user_id).await?;

        let record = records
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| SelectError::NoContent {
                user_id: user_id.to_string(),
            })?;

        Ok(SelectedHighlight::from_record(record))
    }

    async fn select_pinned(
        &self,
        user_id: &str,
        highlight_id: &str,
    ) -> SelectResult<SelectedHighlight> {
        let record = self
            .store
            .fetch_for_user(user_id, highlight_id)
            .await?
            .ok_or_else(|| SelectError::NotFound {
                user_id: user_id.to_string(),
                highlight_id: highlight_id.to_string(),
            })?;

        Ok(SelectedHighlight::from_record(&record))
    }

    /// Pick a highlight for an operator test send
    ///
    /// With an explicit id, fetches that highlight regardless of owner.
    /// Otherwise draws from the ten most recent highlights, falling back to
    /// a built-in sample when the store is empty so a fresh deployment can
    /// still verify its mail path.
    pub async fn pick_for_test(
        &self,
        highlight_id: Option<&str>,
    ) -> SelectResult<SelectedHighlight> {
        if let Some(id) = highlight_id {
            let record =
                self.store
                    .fetch_by_id(id)
                    .await?
                    .ok_or_else(|| SelectError::NotFound {
                        user_id: "operator".to_string(),
                        highlight_id: id.to_string(),
                    })?;
            return Ok(SelectedHighlight::from_record(&record));
        }

        let recent = self.store.list_recent(10).await?;
        if let Some(record) = recent.choose(&mut rand::thread_rng()) {
            return Ok(SelectedHighlight::from_record(record));
        }

        Ok(SelectedHighlight {
            highlight_id: "sample".to_string(),
            body: SAMPLE_BODY.to_string(),
            book_title: "Daybreak".to_string(),
            book_author: "The Daybreak Team".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HighlightRecord;
    use crate::store::MemoryHighlightStore;

    fn selector_with(store: MemoryHighlightStore) -> HighlightSelector {
        HighlightSelector::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_random_mode_empty_collection() {
        let selector = selector_with(MemoryHighlightStore::new());
        let candidate = DeliveryCandidate::new("user-1", "reader@example.com");

        let result = selector.select_for(&candidate).await;
        assert!(matches!(result, Err(SelectError::NoContent { .. })));
    }

    #[tokio::test]
    async fn test_random_mode_picks_member_of_collection() {
        let store = MemoryHighlightStore::new();
        for i in 0..5 {
            store.insert(
                "user-1",
                HighlightRecord::new(format!("hl-{i}"), format!("body {i}")),
            );
        }

        let selector = selector_with(store);
        let candidate = DeliveryCandidate::new("user-1", "reader@example.com");

        let selected = selector.select_for(&candidate).await.unwrap();
        assert!(selected.highlight_id.starts_with("hl-"));
    }

    #[tokio::test]
    async fn test_specific_mode_dangling_pin() {
        let store = MemoryHighlightStore::new();
        store.insert("user-1", HighlightRecord::new("hl-1", "kept"));

        let selector = selector_with(store);
        let candidate = DeliveryCandidate::new("user-1", "reader@example.com")
            .with_pinned_highlight("hl-deleted");

        let result = selector.select_for(&candidate).await;
        assert!(matches!(result, Err(SelectError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_specific_mode_does_not_cross_owners() {
        let store = MemoryHighlightStore::new();
        store.insert("user-2", HighlightRecord::new("hl-1", "not yours"));

        let selector = selector_with(store);
        let candidate =
            DeliveryCandidate::new("user-1", "reader@example.com").with_pinned_highlight("hl-1");

        let result = selector.select_for(&candidate).await;
        assert!(matches!(result, Err(SelectError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_specific_mode_without_pin() {
        let selector = selector_with(MemoryHighlightStore::new());
        let mut candidate = DeliveryCandidate::new("user-1", "reader@example.com");
        candidate.mode = SelectionMode::Specific;

        let result = selector.select_for(&candidate).await;
        assert!(matches!(result, Err(SelectError::MissingPin)));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = MemoryHighlightStore::new();
        store.set_failing(true);

        let selector = selector_with(store);
        let candidate = DeliveryCandidate::new("user-1", "reader@example.com");

        let result = selector.select_for(&candidate).await;
        assert!(matches!(result, Err(SelectError::Store(_))));
    }

    #[tokio::test]
    async fn test_pick_for_test_falls_back_to_sample() {
        let selector = selector_with(MemoryHighlightStore::new());

        let selected = selector.pick_for_test(None).await.unwrap();
        assert_eq!(selected.highlight_id, "sample");
        assert_eq!(selected.book_title, "Daybreak");
    }

    #[tokio::test]
    async fn test_pick_for_test_with_explicit_id() {
        let store = MemoryHighlightStore::new();
        store.insert(
            "user-2",
            HighlightRecord::new("hl-7", "chosen").with_book("bk-1", "The Book", "A. Writer"),
        );

        let selector = selector_with(store);
        let selected = selector.pick_for_test(Some("hl-7")).await.unwrap();
        assert_eq!(selected.highlight_id, "hl-7");
        assert_eq!(selected.book_title, "The Book");

        let missing = selector.pick_for_test(Some("hl-missing")).await;
        assert!(matches!(missing, Err(SelectError::NotFound { .. })));
    }
}
