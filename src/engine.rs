use crate::collection::Collection;
use crate::errors::DbError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-process registry of named collections.
#[derive(Default)]
pub struct Engine {
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `name`, or returns the existing collection of that name.
    pub fn create_collection(&self, name: &str) -> Arc<Collection> {
        let mut cols = self.collections.write();
        cols.entry(name.to_string())
            .or_insert_with(|| {
                log::info!("created collection {name}");
                Arc::new(Collection::new(name.to_string()))
            })
            .clone()
    }

    pub fn get_collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// # Errors
    /// Returns `NoSuchCollection` when `name` does not exist.
    pub fn collection(&self, name: &str) -> Result<Arc<Collection>, DbError> {
        self.get_collection(name).ok_or_else(|| DbError::NoSuchCollection(name.to_string()))
    }

    pub fn drop_collection(&self, name: &str) -> bool {
        let removed = self.collections.write().remove(name).is_some();
        if removed {
            log::info!("dropped collection {name}");
        }
        removed
    }

    /// # Errors
    /// Returns an error if `old` is missing or `new` is taken.
    pub fn rename_collection(&self, old: &str, new: &str) -> Result<(), DbError> {
        let mut cols = self.collections.write();
        if cols.contains_key(new) {
            return Err(DbError::QueryError(format!("collection {new} already exists")));
        }
        let col = cols.remove(old).ok_or_else(|| DbError::NoSuchCollection(old.to_string()))?;
        col.set_name(new.to_string());
        cols.insert(new.to_string(), col);
        Ok(())
    }

    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent() {
        let e = Engine::new();
        let a = e.create_collection("books");
        let b = e.create_collection("books");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(e.list_collection_names(), vec!["books".to_string()]);
    }

    #[test]
    fn rename_and_drop() {
        let e = Engine::new();
        e.create_collection("books");
        e.rename_collection("books", "library").unwrap();
        assert!(e.get_collection("books").is_none());
        assert_eq!(e.collection("library").unwrap().name_str(), "library");
        assert!(matches!(e.rename_collection("books", "x"), Err(DbError::NoSuchCollection(_))));
        assert!(e.drop_collection("library"));
        assert!(!e.drop_collection("library"));
    }
}
