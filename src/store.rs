//! The document-store surface the query runner is written against.

use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::query::{self, Cursor, Filter, FindOptions, Stage, TextIndexSpec, UpdateDoc, UpdateReport};
use bson::Document as BsonDocument;
use std::sync::Arc;

/// Find/update/aggregate/index primitives over a single collection.
///
/// Errors are the store's own and reach callers unchanged.
pub trait DocumentStore {
    /// Name of the collection behind this handle.
    fn collection_name(&self) -> String;

    fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Cursor, DbError>;

    fn count(&self, filter: &Filter) -> Result<u64, DbError>;

    /// Updates the first match only.
    fn update_one(&self, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError>;

    fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<BsonDocument>, DbError>;

    /// Returns the index name.
    fn create_text_index(&self, spec: &TextIndexSpec) -> Result<String, DbError>;

    /// Matches with their relevance score, best first.
    fn text_search(&self, search: &str, limit: Option<usize>) -> Result<Vec<(Document, f64)>, DbError>;
}

impl DocumentStore for Arc<Collection> {
    fn collection_name(&self) -> String {
        self.name_str()
    }

    fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Cursor, DbError> {
        Ok(query::find_docs(self, filter, opts))
    }

    fn count(&self, filter: &Filter) -> Result<u64, DbError> {
        Ok(query::count_docs(self, filter))
    }

    fn update_one(&self, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport, DbError> {
        Ok(query::update_one(self, filter, update))
    }

    fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<BsonDocument>, DbError> {
        Ok(query::aggregate(self, pipeline))
    }

    fn create_text_index(&self, spec: &TextIndexSpec) -> Result<String, DbError> {
        Collection::create_text_index(self, spec)
    }

    fn text_search(&self, search: &str, limit: Option<usize>) -> Result<Vec<(Document, f64)>, DbError> {
        query::text_search(self, search, limit)
    }
}
