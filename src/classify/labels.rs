// src/classify/labels.rs
//! Accept/reject mapping for the binary classifier's labels.
//!
//! Checked in a fixed order: accept set, then reject set, then unknown.
//! A label present in both sets is therefore accepted. Unknown labels are a
//! first-class outcome so callers can record them; they are treated as rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelDecision {
    Accept,
    Reject,
    Unknown,
}

impl LabelDecision {
    pub fn is_accepted(self) -> bool {
        matches!(self, LabelDecision::Accept)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPolicy {
    accept: BTreeSet<String>,
    reject: BTreeSet<String>,
}

impl Default for LabelPolicy {
    /// Custom labels plus the generic `LABEL_n` and bare numeric variants the
    /// hosted binary model may emit.
    fn default() -> Self {
        Self::new(["aplica", "LABEL_1", "1"], ["no-aplica", "LABEL_0", "0"])
    }
}

impl LabelPolicy {
    pub fn new<A, R, S1, S2>(accept: A, reject: R) -> Self
    where
        A: IntoIterator<Item = S1>,
        R: IntoIterator<Item = S2>,
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            accept: accept.into_iter().map(Into::into).collect(),
            reject: reject.into_iter().map(Into::into).collect(),
        }
    }

    /// Same sets with polarity swapped, for models trained with the opposite
    /// label convention.
    pub fn inverted(self) -> Self {
        Self {
            accept: self.reject,
            reject: self.accept,
        }
    }

    pub fn decide(&self, label: &str) -> LabelDecision {
        let label = label.trim();
        if self.accept.contains(label) {
            LabelDecision::Accept
        } else if self.reject.contains(label) {
            LabelDecision::Reject
        } else {
            LabelDecision::Unknown
        }
    }

    pub fn accept_labels(&self) -> impl Iterator<Item = &str> {
        self.accept.iter().map(String::as_str)
    }

    pub fn reject_labels(&self) -> impl Iterator<Item = &str> {
        self.reject.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_maps_known_labels() {
        let p = LabelPolicy::default();
        assert_eq!(p.decide("aplica"), LabelDecision::Accept);
        assert_eq!(p.decide("LABEL_1"), LabelDecision::Accept);
        assert_eq!(p.decide("no-aplica"), LabelDecision::Reject);
        assert_eq!(p.decide(" 0 "), LabelDecision::Reject);
        assert_eq!(p.decide("foo"), LabelDecision::Unknown);
        assert!(!p.decide("foo").is_accepted());
    }

    #[test]
    fn inverted_policy_swaps_polarity() {
        let p = LabelPolicy::default().inverted();
        assert_eq!(p.decide("LABEL_0"), LabelDecision::Accept);
        assert_eq!(p.decide("LABEL_1"), LabelDecision::Reject);
        assert_eq!(p.decide("foo"), LabelDecision::Unknown);
    }

    #[test]
    fn accept_set_wins_on_overlap() {
        let p = LabelPolicy::new(["x"], ["x", "y"]);
        assert_eq!(p.decide("x"), LabelDecision::Accept);
        assert_eq!(p.decide("y"), LabelDecision::Reject);
    }
}
