use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::types::DocumentId;
use crate::utils::querylog;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use super::cursor::Cursor;
use super::eval::{CompiledFilter, as_f64, compare_docs, project_fields};
use super::text::tokenize;
use super::types::{
    Filter, FindOptions, MAX_LIMIT, MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS, UpdateDoc,
    UpdateReport,
};

pub fn find_docs(col: &Arc<Collection>, filter: &Filter, opts: &FindOptions) -> Cursor {
    let started = Instant::now();
    let skip = opts.skip.unwrap_or(0);
    let limit = opts.limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT);

    if opts.projection.is_none() && opts.sort.is_none() {
        let ids = col.list_ids();
        querylog::record("find", &col.name_str(), started, ids.len());
        return Cursor::lazy(col.clone(), ids, filter.clone(), skip, limit);
    }

    let matcher = CompiledFilter::new(filter.clone());
    let mut docs: Vec<Document> =
        col.get_all_documents().into_iter().filter(|d| matcher.matches(&d.data)).collect();

    if let Some(sort) = &opts.sort {
        if sort.len() > MAX_SORT_FIELDS {
            log::warn!("sort spec too long: {}", sort.len());
        }
        // Stable: ties keep insertion order.
        docs.sort_by(|a, b| compare_docs(&a.data, &b.data, sort));
    }

    if let Some(fields) = &opts.projection {
        let fields: Vec<String> = fields.iter().take(MAX_PROJECTION_FIELDS).cloned().collect();
        for d in &mut docs {
            d.data = project_fields(&d.data, &fields);
        }
    }

    let docs: Vec<Document> = docs.into_iter().skip(skip).take(limit).collect();
    querylog::record("find", &col.name_str(), started, docs.len());
    Cursor::materialized(col.clone(), docs)
}

#[must_use]
pub fn count_docs(col: &Arc<Collection>, filter: &Filter) -> u64 {
    let started = Instant::now();
    let matcher = CompiledFilter::new(filter.clone());
    let n = col.get_all_documents().iter().filter(|d| matcher.matches(&d.data)).count();
    querylog::record("count", &col.name_str(), started, n);
    n as u64
}

pub fn update_many(col: &Arc<Collection>, filter: &Filter, update: &UpdateDoc) -> UpdateReport {
    let started = Instant::now();
    let mut report = UpdateReport::default();
    let matcher = CompiledFilter::new(filter.clone());
    let ids: Vec<DocumentId> = col
        .list_ids()
        .into_iter()
        .filter(|id| col.find_document(id).is_some_and(|d| matcher.matches(&d.data)))
        .collect();
    for id in ids {
        if let Some(mut doc) = col.find_document(&id) {
            report.matched += 1;
            if apply_update(&mut doc, update) {
                report.modified += 1;
                col.update_document(&id, doc);
            }
        }
    }
    querylog::record("update_many", &col.name_str(), started, report.modified as usize);
    report
}

/// Updates the first document, in insertion order, that matches `filter`.
pub fn update_one(col: &Arc<Collection>, filter: &Filter, update: &UpdateDoc) -> UpdateReport {
    let started = Instant::now();
    let matcher = CompiledFilter::new(filter.clone());
    let first = col
        .list_ids()
        .into_iter()
        .find_map(|id| col.find_document(&id).filter(|d| matcher.matches(&d.data)));
    let report = match first {
        Some(mut doc) => {
            let changed = apply_update(&mut doc, update);
            if changed {
                let id = doc.id.clone();
                col.update_document(&id, doc);
            }
            UpdateReport { matched: 1, modified: u64::from(changed) }
        }
        None => UpdateReport::default(),
    };
    querylog::record("update_one", &col.name_str(), started, report.modified as usize);
    report
}

/// Relevance-ranked search over the collection's text index, best match first.
///
/// # Errors
/// Returns `IndexMissing` when the collection has no text index.
pub fn text_search(
    col: &Arc<Collection>,
    search: &str,
    limit: Option<usize>,
) -> Result<Vec<(Document, f64)>, DbError> {
    let started = Instant::now();
    let terms = tokenize(search);
    let candidates: HashSet<DocumentId> = {
        let mut guard = col.text_index.write();
        let idx = guard.as_mut().ok_or_else(|| DbError::IndexMissing(col.name_str()))?;
        idx.candidates(&terms)
    };
    let mut hits: Vec<(Document, f64)> = Vec::with_capacity(candidates.len());
    for id in col.list_ids().into_iter().filter(|id| candidates.contains(id)) {
        if let Some(d) = col.find_document(&id) {
            let score = col.text_index.read().as_ref().map_or(0.0, |idx| idx.score(&d.data, &terms));
            hits.push((d, score));
        }
    }
    hits.sort_by_key(|(_, score)| Reverse(OrderedFloat(*score)));
    hits.truncate(limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT));
    querylog::record("text_search", &col.name_str(), started, hits.len());
    Ok(hits)
}

pub fn apply_update(doc: &mut Document, upd: &UpdateDoc) -> bool {
    fn traverse_to_parent<'a>(
        root: &'a mut bson::Document,
        path: &str,
    ) -> (&'a mut bson::Document, String) {
        let mut cur = root;
        let mut iter = path.split('.').peekable();
        let mut last = String::new();
        while let Some(seg) = iter.next() {
            if iter.peek().is_none() {
                last = seg.to_string();
                break;
            }
            if !matches!(cur.get(seg), Some(bson::Bson::Document(_))) {
                cur.insert(seg.to_string(), bson::Document::new());
            }
            cur = match cur.get_mut(seg) {
                Some(bson::Bson::Document(d)) => d,
                _ => unreachable!("sub-document inserted above"),
            };
        }
        (cur, last)
    }
    fn set_path(root: &mut bson::Document, path: &str, value: bson::Bson) -> bool {
        let (parent, last) = traverse_to_parent(root, path);
        let old = parent.insert(last, value.clone());
        old.as_ref() != Some(&value)
    }
    fn unset_path(root: &mut bson::Document, path: &str) -> bool {
        let (parent, last) = traverse_to_parent(root, path);
        parent.remove(&last).is_some()
    }
    fn inc_path(root: &mut bson::Document, path: &str, by: f64) -> bool {
        let cur = super::eval::get_path(root, path).and_then(as_f64).unwrap_or(0.0);
        set_path(root, path, bson::Bson::Double(cur + by))
    }

    let mut changed = false;
    for (k, v) in &upd.set {
        changed |= set_path(&mut doc.data, k, v.clone());
    }
    for (k, inc) in &upd.inc {
        changed |= inc_path(&mut doc.data, k, *inc);
    }
    for k in &upd.unset {
        changed |= unset_path(&mut doc.data, k);
    }
    changed
}
