//! Core data structures shared across the delivery pipeline
//!
//! The persisted rows (`delivery_preferences`, `delivery_logs`) live in the
//! external store; this module defines their in-process read/write models
//! plus the transient types that flow through one batch run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Selection Mode
// ============================================================================

/// Per-user policy for choosing the day's highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Pick uniformly at random from the user's whole collection
    Random,
    /// Always send the one pinned highlight
    Specific,
}

impl SelectionMode {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Random => "random",
            SelectionMode::Specific => "specific",
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(self, SelectionMode::Random)
    }
}

impl std::str::FromStr for SelectionMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "specific" => SelectionMode::Specific,
            _ => SelectionMode::Random,
        })
    }
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Delivery Candidate
// ============================================================================

/// One user's delivery preference as read from the directory
///
/// Users without a contact address are excluded at the source query and
/// never appear as candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryCandidate {
    pub user_id: String,

    /// Email address the highlight is delivered to
    pub address: String,

    /// Preferred delivery time of day, "HH:MM"
    pub send_time: String,

    pub mode: SelectionMode,

    /// Required when `mode` is `Specific`; may dangle if the highlight
    /// was deleted after pinning
    pub pinned_highlight_id: Option<String>,
}

impl DeliveryCandidate {
    pub fn new(user_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            address: address.into(),
            send_time: default_send_time(),
            mode: SelectionMode::Random,
            pinned_highlight_id: None,
        }
    }

    /// Set the preferred send time
    pub fn with_send_time(mut self, send_time: impl Into<String>) -> Self {
        self.send_time = send_time.into();
        self
    }

    /// Pin a specific highlight and switch to specific mode
    pub fn with_pinned_highlight(mut self, highlight_id: impl Into<String>) -> Self {
        self.mode = SelectionMode::Specific;
        self.pinned_highlight_id = Some(highlight_id.into());
        self
    }
}

/// Default delivery time when a preference row carries none
pub fn default_send_time() -> String {
    "06:00".to_string()
}

// ============================================================================
// Highlights and Books
// ============================================================================

/// Display metadata of the book a highlight was taken from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookRef {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// One stored highlight, with its book join when available
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightRecord {
    pub id: String,

    /// Non-empty highlight text
    pub body: String,

    pub book_id: Option<String>,

    /// Embedded book metadata; `None` when the join produced nothing
    pub book: Option<BookRef>,
}

impl HighlightRecord {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            book_id: None,
            book: None,
        }
    }

    pub fn with_book(
        mut self,
        book_id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        self.book_id = Some(book_id.into());
        self.book = Some(BookRef {
            title: Some(title.into()),
            author: Some(author.into()),
        });
        self
    }
}

/// A highlight resolved for delivery, with book fallbacks applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedHighlight {
    pub highlight_id: String,
    pub body: String,
    pub book_title: String,
    pub book_author: String,
}

impl SelectedHighlight {
    /// Resolve a stored record into a deliverable highlight
    ///
    /// A missing book join falls back to placeholder metadata so an orphaned
    /// highlight never blocks delivery.
    pub fn from_record(record: &HighlightRecord) -> Self {
        let book = record.book.clone().unwrap_or_default();
        Self {
            highlight_id: record.id.clone(),
            body: record.body.clone(),
            book_title: book.title.unwrap_or_else(|| "Unknown Book".to_string()),
            book_author: book.author.unwrap_or_else(|| "Unknown Author".to_string()),
        }
    }
}

// ============================================================================
// Delivery Attempts (audit log)
// ============================================================================

/// Outcome of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Failure => "failure",
        }
    }
}

/// Distinguishes scheduled-batch sends from ad-hoc operator test sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptKind {
    Scheduled,
    Test,
}

impl AttemptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptKind::Scheduled => "scheduled",
            AttemptKind::Test => "test",
        }
    }
}

/// Structured payload attached to an attempt record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttemptDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_id: Option<String>,

    /// Message id returned by the mail provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append-only audit record, one per delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub user_id: String,
    pub outcome: AttemptOutcome,
    pub kind: AttemptKind,
    #[serde(default)]
    pub detail: AttemptDetail,
    pub created_at: DateTime<Utc>,
}

impl DeliveryAttempt {
    pub fn success(user_id: impl Into<String>, kind: AttemptKind, detail: AttemptDetail) -> Self {
        Self {
            user_id: user_id.into(),
            outcome: AttemptOutcome::Success,
            kind,
            detail,
            created_at: Utc::now(),
        }
    }

    pub fn failure(user_id: impl Into<String>, kind: AttemptKind, detail: AttemptDetail) -> Self {
        Self {
            user_id: user_id.into(),
            outcome: AttemptOutcome::Failure,
            kind,
            detail,
            created_at: Utc::now(),
        }
    }
}
