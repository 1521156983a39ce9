// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Raw review as returned by a source page, before filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReview {
    pub content: String,
    pub user_name: Option<String>,
    pub score: Option<i64>,
    /// RFC 3339 timestamp, if the source reports one.
    pub at: Option<String>,
}

/// Item that passed the quality filter. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedItem {
    pub text: String,
    pub author: Option<String>,
    pub rating: Option<u8>,
    pub timestamp: Option<String>,
}

impl FetchedItem {
    pub fn from_raw(raw: RawReview) -> Self {
        Self {
            text: raw.content.trim().to_string(),
            author: raw.user_name,
            rating: raw.score.and_then(|s| u8::try_from(s).ok()),
            timestamp: raw.at,
        }
    }
}

/// One page from a review source. `next_cursor == None` means exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPage {
    pub items: Vec<RawReview>,
    pub next_cursor: Option<String>,
}

#[async_trait::async_trait]
pub trait ReviewSource: Send + Sync {
    /// Fetch up to `batch_size` reviews starting at `cursor` (`None` = first page).
    async fn page(&self, source_id: &str, cursor: Option<&str>, batch_size: usize)
        -> Result<ReviewPage>;
    fn name(&self) -> &'static str;
}

/// Counters for one fetch session; finalized when the session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStats {
    pub total_scanned: usize,
    pub accepted: usize,
    pub rejected_by_rating: usize,
    pub rejected_by_length: usize,
    pub rejected_empty: usize,
    pub target_reached: bool,
    pub ceiling_reached: bool,
}

impl FetchStats {
    pub fn rejected(&self) -> usize {
        self.rejected_by_rating + self.rejected_by_length + self.rejected_empty
    }
}

/// Items plus the stats of the session that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub items: Vec<FetchedItem>,
    pub stats: FetchStats,
}
