pub mod books;
pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod import;
pub mod logger;
pub mod query;
pub mod runner;
pub mod store;
pub mod types;
pub mod utils;

use crate::books::Book;
use crate::collection::Collection;
use crate::config::ShelfConfig;
use crate::engine::Engine;
use crate::errors::DbError;
use crate::runner::QueryRunner;
use std::sync::Arc;

/// An engine holding the configured book collection, with a runner over it.
pub struct Bookshelf {
    engine: Engine,
    config: ShelfConfig,
}

impl Bookshelf {
    /// Creates an empty book collection named by `config.collection`.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid.
    pub fn new(config: ShelfConfig) -> Result<Self, DbError> {
        config.validate()?;
        utils::querylog::set_slow_query_ms(config.slow_query_ms);
        let engine = Engine::new();
        engine.create_collection(&config.collection);
        Ok(Self { engine, config })
    }

    /// # Errors
    /// Returns `NoSuchCollection` if the collection was dropped from the engine.
    pub fn collection(&self) -> Result<Arc<Collection>, DbError> {
        self.engine.collection(&self.config.collection)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &ShelfConfig {
        &self.config
    }

    /// Inserts `books` in order; returns how many were inserted.
    ///
    /// # Errors
    /// Returns `NoSuchCollection` if the collection is gone.
    pub fn seed<I: IntoIterator<Item = Book>>(&self, books: I) -> Result<usize, DbError> {
        let col = self.collection()?;
        let mut n = 0;
        for b in books {
            col.insert_document(b.into_document());
            n += 1;
        }
        log::info!("seeded {n} books into {}", self.config.collection);
        Ok(n)
    }

    /// # Errors
    /// Returns `NoSuchCollection` if the collection is gone.
    pub fn runner(&self) -> Result<QueryRunner<Arc<Collection>>, DbError> {
        Ok(QueryRunner::new(self.collection()?).with_max_results(self.config.max_results))
    }
}
