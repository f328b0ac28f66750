use crate::document::Document;
use crate::errors::DbError;
use crate::query::text::{TextIndex, TextIndexSpec};
use crate::types::DocumentId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Documents keyed by id, iterated in insertion order.
#[derive(Debug, Default)]
struct DocStore {
    order: Vec<DocumentId>,
    docs: HashMap<DocumentId, Document>,
}

pub struct Collection {
    pub name: RwLock<String>,
    store: RwLock<DocStore>,
    pub(crate) text_index: RwLock<Option<TextIndex>>,
}

fn log_audit(op: &str, collection: &str, id: &DocumentId) {
    log::info!(target: "bookshelf::audit", "op={op} collection={collection} id={id}");
}

impl Collection {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name: RwLock::new(name),
            store: RwLock::new(DocStore::default()),
            text_index: RwLock::new(None),
        }
    }

    pub fn insert_document(&self, document: Document) -> DocumentId {
        let doc_id = document.id.clone();
        {
            let mut st = self.store.write();
            if let Some(idx) = self.text_index.write().as_mut() {
                idx.insert(&document.data, &doc_id);
            }
            if st.docs.insert(doc_id.clone(), document).is_none() {
                st.order.push(doc_id.clone());
            }
        }
        log_audit("insert", &self.name_str(), &doc_id);
        doc_id
    }

    pub fn find_document(&self, id: &DocumentId) -> Option<Document> {
        self.store.read().docs.get(id).cloned()
    }

    /// Replaces the stored document, keeping its id and creation time.
    pub fn update_document(&self, id: &DocumentId, new_document: Document) -> bool {
        let mut st = self.store.write();
        let Some(old) = st.docs.get_mut(id) else {
            return false;
        };
        if let Some(idx) = self.text_index.write().as_mut() {
            idx.remove(&old.data, id);
            idx.insert(&new_document.data, id);
        }
        old.update(new_document.data);
        drop(st);
        log_audit("update", &self.name_str(), id);
        true
    }

    pub fn delete_document(&self, id: &DocumentId) -> bool {
        let mut st = self.store.write();
        let Some(old) = st.docs.remove(id) else {
            return false;
        };
        st.order.retain(|x| x != id);
        drop(st);
        if let Some(idx) = self.text_index.write().as_mut() {
            idx.remove(&old.data, id);
        }
        log_audit("delete", &self.name_str(), id);
        true
    }

    pub fn get_all_documents(&self) -> Vec<Document> {
        let st = self.store.read();
        st.order.iter().filter_map(|id| st.docs.get(id).cloned()).collect()
    }

    /// Return only the IDs of all documents without cloning each document.
    pub fn list_ids(&self) -> Vec<DocumentId> {
        self.store.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.store.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds the collection's text index over existing documents.
    ///
    /// Declaring the same field set again is a no-op; a different field set is a conflict,
    /// since a collection carries at most one text index.
    ///
    /// # Errors
    /// Returns `IndexConflict` when another text index already exists.
    pub fn create_text_index(&self, spec: &TextIndexSpec) -> Result<String, DbError> {
        if spec.fields.is_empty() {
            return Err(DbError::QueryError("text index needs at least one field".into()));
        }
        // Lock order: store, then text index.
        let st = self.store.read();
        let mut guard = self.text_index.write();
        if let Some(existing) = guard.as_ref() {
            if existing.matches_spec(spec) {
                return Ok(existing.spec.name());
            }
            return Err(DbError::IndexConflict(format!(
                "collection {} already has text index {}",
                self.name_str(),
                existing.spec.name()
            )));
        }
        let started = std::time::Instant::now();
        let mut idx = TextIndex::new(spec.clone());
        for id in &st.order {
            if let Some(d) = st.docs.get(id) {
                idx.insert(&d.data, id);
            }
        }
        drop(st);
        let name = spec.name();
        log::info!(
            "built text index {name} on {}: {} terms, {} entries in {} ms",
            self.name_str(),
            idx.stats.terms,
            idx.stats.entries,
            started.elapsed().as_millis()
        );
        *guard = Some(idx);
        Ok(name)
    }

    pub fn has_text_index(&self) -> bool {
        self.text_index.read().is_some()
    }

    pub fn drop_text_index(&self) -> bool {
        self.text_index.write().take().is_some()
    }

    pub fn set_name(&self, new_name: String) {
        *self.name.write() = new_name;
    }

    /// Returns the collection's name as a String (cloned), hiding the `RwLock`.
    pub fn name_str(&self) -> String {
        self.name.read().clone()
    }
}
