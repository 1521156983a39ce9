// src/ingest/filter.rs
//! Quality filter for fetched reviews.
//!
//! Checks run in a fixed order (empty, rating, length) and an item failing
//! several is attributed to the first one, so stats are reproducible.

use crate::ingest::types::{FetchStats, FetchedItem};
use crate::text::word_count;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_rating: u8,
    pub max_rating: u8,
    pub min_word_count: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_rating: 2,
            max_rating: 3,
            min_word_count: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Accepted,
    Empty,
    Rating,
    TooShort,
}

impl FilterVerdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, FilterVerdict::Accepted)
    }

    /// Count this verdict into `stats` (does not touch `total_scanned`).
    pub fn record(self, stats: &mut FetchStats) {
        match self {
            FilterVerdict::Accepted => stats.accepted += 1,
            FilterVerdict::Empty => stats.rejected_empty += 1,
            FilterVerdict::Rating => stats.rejected_by_rating += 1,
            FilterVerdict::TooShort => stats.rejected_by_length += 1,
        }
    }
}

pub fn evaluate(item: &FetchedItem, cfg: &FilterConfig) -> FilterVerdict {
    if item.text.trim().is_empty() {
        return FilterVerdict::Empty;
    }
    match item.rating {
        Some(r) if (cfg.min_rating..=cfg.max_rating).contains(&r) => {}
        _ => return FilterVerdict::Rating,
    }
    if word_count(&item.text) < cfg.min_word_count {
        return FilterVerdict::TooShort;
    }
    FilterVerdict::Accepted
}

pub fn accepts(item: &FetchedItem, cfg: &FilterConfig) -> bool {
    evaluate(item, cfg).is_accepted()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str, rating: Option<u8>) -> FetchedItem {
        FetchedItem {
            text: text.into(),
            author: None,
            rating,
            timestamp: None,
        }
    }

    const LONG: &str = "la aplicación debería permitir exportar los datos a un archivo para poder revisarlos luego sin conexión";

    #[test]
    fn first_failing_check_wins() {
        let cfg = FilterConfig::default();
        assert_eq!(evaluate(&item("   ", Some(9)), &cfg), FilterVerdict::Empty);
        assert_eq!(evaluate(&item("corto", Some(5)), &cfg), FilterVerdict::Rating);
        assert_eq!(evaluate(&item("corto", None), &cfg), FilterVerdict::Rating);
        assert_eq!(evaluate(&item("corto", Some(2)), &cfg), FilterVerdict::TooShort);
        assert_eq!(evaluate(&item(LONG, Some(3)), &cfg), FilterVerdict::Accepted);
        assert!(accepts(&item(LONG, Some(2)), &cfg));
    }

    #[test]
    fn rating_bounds_are_inclusive() {
        let cfg = FilterConfig {
            min_rating: 1,
            max_rating: 1,
            min_word_count: 1,
        };
        assert!(accepts(&item("x", Some(1)), &cfg));
        assert!(!accepts(&item("x", Some(2)), &cfg));
    }

    #[test]
    fn verdict_records_into_stats() {
        let mut stats = FetchStats::default();
        FilterVerdict::Rating.record(&mut stats);
        FilterVerdict::Accepted.record(&mut stats);
        assert_eq!(stats.rejected_by_rating, 1);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected(), 1);
    }
}
