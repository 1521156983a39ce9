// src/ingest/providers/memory.rs
//! In-memory review source for fixtures and local runs.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ingest::types::{RawReview, ReviewPage, ReviewSource};

/// Serves preloaded reviews per source id. The cursor is the offset of the
/// next review; the last page carries no cursor.
#[derive(Debug, Default)]
pub struct MemorySource {
    apps: HashMap<String, Vec<RawReview>>,
    pages_served: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(mut self, source_id: impl Into<String>, reviews: Vec<RawReview>) -> Self {
        self.apps.insert(source_id.into(), reviews);
        self
    }

    /// Number of `page` calls answered so far.
    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::Relaxed)
    }

    /// Reviews from a JSON array of `RawReview`.
    pub fn from_json(source_id: &str, json: &str) -> Result<Self> {
        let reviews: Vec<RawReview> = serde_json::from_str(json)?;
        Ok(Self::new().with_app(source_id, reviews))
    }
}

#[async_trait]
impl ReviewSource for MemorySource {
    async fn page(&self, source_id: &str, cursor: Option<&str>, batch_size: usize) -> Result<ReviewPage> {
        let Some(reviews) = self.apps.get(source_id) else {
            bail!("unknown source id `{source_id}`");
        };
        let start = match cursor {
            Some(c) => c.parse::<usize>()?,
            None => 0,
        };
        let end = start.saturating_add(batch_size).min(reviews.len());
        let items = reviews.get(start..end).map(<[RawReview]>::to_vec).unwrap_or_default();
        self.pages_served.fetch_add(1, Ordering::Relaxed);
        Ok(ReviewPage {
            items,
            next_cursor: (end < reviews.len()).then(|| end.to_string()),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(i: usize) -> RawReview {
        RawReview {
            content: format!("review {i}"),
            user_name: None,
            score: Some(3),
            at: None,
        }
    }

    #[tokio::test]
    async fn pages_until_exhausted() {
        let src = MemorySource::new().with_app("app", (0..5).map(review).collect());
        let p1 = src.page("app", None, 2).await.unwrap();
        assert_eq!(p1.items.len(), 2);
        let p2 = src.page("app", p1.next_cursor.as_deref(), 2).await.unwrap();
        let p3 = src.page("app", p2.next_cursor.as_deref(), 2).await.unwrap();
        assert_eq!(p3.items, vec![review(4)]);
        assert!(p3.next_cursor.is_none());
        assert_eq!(src.pages_served(), 3);
    }

    #[tokio::test]
    async fn unknown_source_is_an_error() {
        let src = MemorySource::new();
        assert!(src.page("nope", None, 10).await.is_err());
    }
}
