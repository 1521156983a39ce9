// src/classify/lexicon.rs
//! Keyword classifier over a bundled usability lexicon.
//!
//! Runs fully offline. Used when no hosted model is configured and as the
//! deterministic classifier in tests.

use super::{ClassificationOutcome, Classifier, ClassifierError};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    label: String,
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawLexicon {
    requirement_cues: Vec<String>,
    categories: Vec<CategoryEntry>,
}

struct Lexicon {
    cues: HashSet<String>,
    /// Catalog order is kept; ties resolve to the earlier category.
    categories: Vec<(String, HashSet<String>)>,
}

static LEXICON: Lazy<Lexicon> = Lazy::new(|| {
    let raw = include_str!("usability_lexicon.json");
    let parsed: RawLexicon = serde_json::from_str(raw).expect("valid usability lexicon");
    Lexicon {
        cues: parsed.requirement_cues.into_iter().collect(),
        categories: parsed
            .categories
            .into_iter()
            .map(|c| (c.label, c.keywords.into_iter().collect()))
            .collect(),
    }
});

/// Category labels known to the bundled lexicon, in catalog order.
pub fn lexicon_categories() -> Vec<&'static str> {
    LEXICON.categories.iter().map(|(l, _)| l.as_str()).collect()
}

#[derive(Debug, Clone)]
enum Mode {
    Acceptance { accept: String, reject: String },
    Categories,
}

#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    mode: Mode,
}

impl LexiconClassifier {
    /// Binary classifier emitting `accept_label` when the text carries a
    /// requirement cue, `reject_label` otherwise.
    pub fn acceptance(accept_label: impl Into<String>, reject_label: impl Into<String>) -> Self {
        Self {
            mode: Mode::Acceptance {
                accept: accept_label.into(),
                reject: reject_label.into(),
            },
        }
    }

    /// Multiclass classifier over the bundled usability categories.
    pub fn categories() -> Self {
        Self {
            mode: Mode::Categories,
        }
    }

    fn classify_acceptance(&self, text: &str, accept: &str, reject: &str) -> ClassificationOutcome {
        let hits = tokenize(text).filter(|t| LEXICON.cues.contains(t)).count();
        if hits > 0 {
            let conf = (0.55 + 0.1 * hits as f32).min(0.95);
            ClassificationOutcome::new(accept, conf)
        } else {
            ClassificationOutcome::new(reject, 0.7)
        }
    }

    fn classify_category(&self, text: &str) -> Result<ClassificationOutcome, ClassifierError> {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut best: Option<(&str, usize)> = None;
        let mut total = 0usize;
        for (label, words) in LEXICON.categories.iter() {
            let n = tokens.iter().filter(|t| words.contains(t.as_str())).count();
            total += n;
            match best {
                Some((_, b)) if b >= n => {}
                _ => best = Some((label.as_str(), n)),
            }
        }
        let (label, n) =
            best.ok_or_else(|| ClassifierError::Unavailable("lexicon has no categories".into()))?;
        let confidence = if total == 0 {
            1.0 / LEXICON.categories.len() as f32
        } else {
            n as f32 / total as f32
        };
        Ok(ClassificationOutcome::new(label, confidence))
    }
}

impl Classifier for LexiconClassifier {
    fn classify(&self, text: &str) -> Result<ClassificationOutcome, ClassifierError> {
        match &self.mode {
            Mode::Acceptance { accept, reject } => {
                Ok(self.classify_acceptance(text, accept, reject))
            }
            Mode::Categories => self.classify_category(text),
        }
    }

    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Acceptance { .. } => "lexicon-acceptance",
            Mode::Categories => "lexicon-categories",
        }
    }
}

/// Alphanumeric tokens, lower-cased (accents kept).
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceptance_needs_a_requirement_cue() {
        let c = LexiconClassifier::acceptance("aplica", "no-aplica");
        let yes = c
            .classify("La aplicación debería permitir cambiar el tamaño de la letra")
            .unwrap();
        assert_eq!(yes.label, "aplica");
        assert!(yes.confidence > 0.5);
        let no = c.classify("Me encanta, cinco estrellas para todos").unwrap();
        assert_eq!(no.label, "no-aplica");
    }

    #[test]
    fn categories_pick_the_densest_match() {
        let c = LexiconClassifier::categories();
        let out = c
            .classify("Necesito ayuda, el soporte nunca responde y no hay chat")
            .unwrap();
        assert_eq!(out.label, "Asistencia al usuario");
        assert!(out.confidence > 0.5 && out.confidence <= 1.0);
    }

    #[test]
    fn categories_fall_back_to_first_in_catalog() {
        let c = LexiconClassifier::categories();
        let out = c.classify("zzz qqq").unwrap();
        assert_eq!(out.label, lexicon_categories()[0]);
        assert!((out.confidence - 0.125).abs() < 1e-6);
    }

    #[test]
    fn lexicon_has_eight_categories() {
        assert_eq!(lexicon_categories().len(), 8);
    }
}
