//! Highlight reads for content selection
//!
//! The `highlights` table is queried with its book join embedded so the
//! selector can resolve display metadata in one round trip. A missing join
//! is normal (the book may have been deleted) and surfaces as `book: None`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{StoreClient, StoreResult};
use crate::models::{BookRef, HighlightRecord};

/// Read access to stored highlights
#[async_trait]
pub trait HighlightStore: Send + Sync {
    /// All highlights owned by a user
    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<HighlightRecord>>;

    /// One highlight by id, scoped to its owner
    async fn fetch_for_user(
        &self,
        user_id: &str,
        highlight_id: &str,
    ) -> StoreResult<Option<HighlightRecord>>;

    /// One highlight by id regardless of owner (operator test sends)
    async fn fetch_by_id(&self, highlight_id: &str) -> StoreResult<Option<HighlightRecord>>;

    /// The most recently created highlights across the whole store
    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<HighlightRecord>>;
}

/// Wire shape of one `highlights` row with its embedded book
#[derive(Debug, Deserialize)]
struct HighlightRow {
    id: String,
    body: String,
    book_id: Option<String>,
    #[serde(default)]
    books: Option<BookRow>,
}

#[derive(Debug, Deserialize)]
struct BookRow {
    title: Option<String>,
    author: Option<String>,
}

impl From<HighlightRow> for HighlightRecord {
    fn from(row: HighlightRow) -> Self {
        Self {
            id: row.id,
            body: row.body,
            book_id: row.book_id,
            book: row.books.map(|b| BookRef {
                title: b.title,
                author: b.author,
            }),
        }
    }
}

const HIGHLIGHT_SELECT: &str = "id,body,book_id,books:book_id(title,author)";

/// Highlight store backed by the REST interface
pub struct RestHighlightStore {
    client: Arc<StoreClient>,
}

impl RestHighlightStore {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }

    async fn query(&self, filters: &[(&str, &str)]) -> StoreResult<Vec<HighlightRecord>> {
        let mut params: Vec<(&str, &str)> = vec![("select", HIGHLIGHT_SELECT)];
        params.extend_from_slice(filters);

        let rows: Vec<HighlightRow> = self.client.select("highlights", &params).await?;
        Ok(rows.into_iter().map(HighlightRecord::from).collect())
    }
}

#[async_trait]
impl HighlightStore for RestHighlightStore {
    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<HighlightRecord>> {
        let owner = format!("eq.{user_id}");
        self.query(&[("owner_id", owner.as_str())]).await
    }

    async fn fetch_for_user(
        &self,
        user_id: &str,
        highlight_id: &str,
    ) -> StoreResult<Option<HighlightRecord>> {
        let owner = format!("eq.{user_id}");
        let id = format!("eq.{highlight_id}");
        let rows = self
            .query(&[("owner_id", owner.as_str()), ("id", id.as_str())])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_by_id(&self, highlight_id: &str) -> StoreResult<Option<HighlightRecord>> {
        let id = format!("eq.{highlight_id}");
        let rows = self.query(&[("id", id.as_str())]).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<HighlightRecord>> {
        let limit = limit.to_string();
        self.query(&[("order", "created_at.desc"), ("limit", limit.as_str())])
            .await
    }
}
