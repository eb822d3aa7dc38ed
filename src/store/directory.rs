//! Due-candidate directory
//!
//! Reads the set of users with a configured delivery preference and a
//! contact address. A failed read is fatal for the whole batch: no partial
//! candidate list is usable, so the error propagates instead of degrading.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{StoreClient, StoreError};
use crate::models::{default_send_time, DeliveryCandidate, SelectionMode};

/// Errors from the candidate directory
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The underlying store read failed
    #[error("failed to read delivery preferences: {0}")]
    Store(#[from] StoreError),

    /// Directory backend unavailable
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Source of delivery candidates for one batch run
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetch every user with a configured preference and contact address
    ///
    /// Users without either are excluded at the source, not filtered
    /// downstream.
    async fn fetch_due_candidates(&self) -> Result<Vec<DeliveryCandidate>, DirectoryError>;
}

/// Wire shape of one `delivery_preferences` row
#[derive(Debug, Deserialize)]
struct PreferenceRow {
    user_id: String,
    address: Option<String>,
    send_time: Option<String>,
    selection_mode: Option<String>,
    pinned_highlight_id: Option<String>,
}

impl PreferenceRow {
    fn into_candidate(self) -> Option<DeliveryCandidate> {
        let address = self.address?;
        if address.trim().is_empty() {
            return None;
        }

        let mode = self
            .selection_mode
            .as_deref()
            .unwrap_or("random")
            .parse::<SelectionMode>()
            .unwrap_or(SelectionMode::Random);

        Some(DeliveryCandidate {
            user_id: self.user_id,
            address,
            send_time: self
                .send_time
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(default_send_time),
            mode,
            pinned_highlight_id: self.pinned_highlight_id,
        })
    }
}

/// Directory backed by the store's `delivery_preferences` table
pub struct RestUserDirectory {
    client: Arc<StoreClient>,
}

impl RestUserDirectory {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UserDirectory for RestUserDirectory {
    async fn fetch_due_candidates(&self) -> Result<Vec<DeliveryCandidate>, DirectoryError> {
        let rows: Vec<PreferenceRow> = self
            .client
            .select(
                "delivery_preferences",
                &[
                    (
                        "select",
                        "user_id,address,send_time,selection_mode,pinned_highlight_id",
                    ),
                    ("address", "not.is.null"),
                ],
            )
            .await?;

        let candidates: Vec<DeliveryCandidate> = rows
            .into_iter()
            .filter_map(PreferenceRow::into_candidate)
            .collect();

        tracing::debug!(count = candidates.len(), "fetched delivery candidates");
        Ok(candidates)
    }
}
