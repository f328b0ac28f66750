use crate::collection::Collection;
use crate::document::Document;
use crate::types::DocumentId;
use std::sync::Arc;

use super::eval::CompiledFilter;
use super::types::Filter;

/// Result set of a find.
///
/// Unsorted finds hold a snapshot of candidate ids and evaluate the filter as they are
/// advanced; sorted or projected finds hold materialized documents.
#[derive(Clone)]
pub struct Cursor {
    pub collection: Arc<Collection>,
    pub ids: Vec<DocumentId>,
    pub pos: usize,
    pub docs: Option<Vec<Document>>, // when present, iterate these
    filter: CompiledFilter,
    skip: usize,
    remaining: usize,
}

impl Cursor {
    pub(crate) fn lazy(
        collection: Arc<Collection>,
        ids: Vec<DocumentId>,
        filter: Filter,
        skip: usize,
        limit: usize,
    ) -> Self {
        Self { collection, ids, pos: 0, docs: None, filter: CompiledFilter::new(filter), skip, remaining: limit }
    }

    pub(crate) fn materialized(collection: Arc<Collection>, docs: Vec<Document>) -> Self {
        let remaining = docs.len();
        Self {
            collection,
            ids: Vec::new(),
            pos: 0,
            docs: Some(docs),
            filter: CompiledFilter::new(Filter::True),
            skip: 0,
            remaining,
        }
    }

    pub fn advance(&mut self) -> Option<Document> {
        if self.remaining == 0 {
            return None;
        }
        if let Some(ref docs) = self.docs {
            let d = docs.get(self.pos)?.clone();
            self.pos += 1;
            self.remaining -= 1;
            return Some(d);
        }
        while self.pos < self.ids.len() {
            let id = &self.ids[self.pos];
            self.pos += 1;
            // Documents deleted since the snapshot are skipped.
            let Some(d) = self.collection.find_document(id) else {
                continue;
            };
            if !self.filter.matches(&d.data) {
                continue;
            }
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }
            self.remaining -= 1;
            return Some(d);
        }
        None
    }

    #[must_use]
    pub fn to_vec(mut self) -> Vec<Document> {
        if let Some(docs) = self.docs.take() {
            return docs.into_iter().skip(self.pos).take(self.remaining).collect();
        }
        let mut out = Vec::new();
        while let Some(d) = self.advance() {
            out.push(d);
        }
        out
    }
}

impl Iterator for Cursor {
    type Item = Document;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}
