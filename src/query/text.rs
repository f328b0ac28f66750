//! Inverted text index with relevance scoring over a fixed set of string fields.

use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use super::eval::get_path;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "to", "was", "with",
];

/// Declares which fields a text index covers and how much each contributes to the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextIndexSpec {
    pub fields: Vec<(String, f64)>,
}

impl TextIndexSpec {
    /// Equal weight (1.0) for every field.
    #[must_use]
    pub fn over(fields: &[&str]) -> Self {
        Self { fields: fields.iter().map(|f| ((*f).to_string(), 1.0)).collect() }
    }

    /// Name in the `field_text_field_text` form.
    #[must_use]
    pub fn name(&self) -> String {
        self.fields.iter().map(|(f, _)| format!("{f}_text")).collect::<Vec<_>>().join("_")
    }

    fn same_fields(&self, other: &Self) -> bool {
        let a: BTreeSet<&str> = self.fields.iter().map(|(f, _)| f.as_str()).collect();
        let b: BTreeSet<&str> = other.fields.iter().map(|(f, _)| f.as_str()).collect();
        a == b
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextIndexStats {
    pub terms: usize,
    pub entries: usize,
    pub searches: u64,
}

#[derive(Debug, Clone)]
pub struct TextIndex {
    pub spec: TextIndexSpec,
    postings: HashMap<String, HashSet<DocumentId>>,
    pub stats: TextIndexStats,
}

/// Lower-cased alphanumeric runs with stop words removed.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn field_tokens(doc: &BsonDocument, field: &str) -> Vec<String> {
    match get_path(doc, field) {
        Some(Bson::String(s)) => tokenize(s),
        Some(Bson::Array(items)) => items
            .iter()
            .filter_map(|b| if let Bson::String(s) = b { Some(tokenize(s)) } else { None })
            .flatten()
            .collect(),
        _ => Vec::new(),
    }
}

impl TextIndex {
    #[must_use]
    pub fn new(spec: TextIndexSpec) -> Self {
        Self { spec, postings: HashMap::new(), stats: TextIndexStats::default() }
    }

    /// True when `spec` covers the same fields as this index.
    #[must_use]
    pub fn matches_spec(&self, spec: &TextIndexSpec) -> bool {
        self.spec.same_fields(spec)
    }

    pub fn insert(&mut self, doc: &BsonDocument, id: &DocumentId) {
        for (field, _) in &self.spec.fields {
            for tok in field_tokens(doc, field) {
                if self.postings.entry(tok).or_default().insert(id.clone()) {
                    self.stats.entries += 1;
                }
            }
        }
        self.stats.terms = self.postings.len();
    }

    pub fn remove(&mut self, doc: &BsonDocument, id: &DocumentId) {
        for (field, _) in &self.spec.fields {
            for tok in field_tokens(doc, field) {
                if let Some(set) = self.postings.get_mut(&tok) {
                    if set.remove(id) {
                        self.stats.entries = self.stats.entries.saturating_sub(1);
                    }
                    if set.is_empty() {
                        self.postings.remove(&tok);
                    }
                }
            }
        }
        self.stats.terms = self.postings.len();
    }

    /// Ids containing at least one of `terms`.
    pub fn candidates(&mut self, terms: &[String]) -> HashSet<DocumentId> {
        self.stats.searches += 1;
        terms
            .iter()
            .filter_map(|t| self.postings.get(t))
            .flat_map(|ids| ids.iter().cloned())
            .collect()
    }

    /// Per field and matched term: `weight * (0.5 + 0.5 * occurrences / field_tokens)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self, doc: &BsonDocument, terms: &[String]) -> f64 {
        let mut score = 0.0;
        for (field, weight) in &self.spec.fields {
            let toks = field_tokens(doc, field);
            if toks.is_empty() {
                continue;
            }
            let distinct: BTreeSet<&String> = terms.iter().collect();
            for term in distinct {
                let occurrences = toks.iter().filter(|t| *t == term).count();
                if occurrences > 0 {
                    score += weight * (0.5 + 0.5 * occurrences as f64 / toks.len() as f64);
                }
            }
        }
        score
    }
}
