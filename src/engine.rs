use std::path::Path;

use crate::{
    chunking::Source,
    config::Config,
    embedding::Embedder,
    error::Result,
    indexing,
    reranker::Reranker,
    search::{self, QueryHit, QueryParams},
    store::DocumentStore,
};

/// A store plus the model that embeds into it and re-ranks out of it.
///
/// One model value plays both roles so a ColBERT checkpoint is loaded once.
pub struct Kite<M> {
    store: DocumentStore,
    model: M,
    config: Config,
}

impl<M: Embedder + Reranker> Kite<M> {
    pub fn new(model: M, config: Config) -> Result<Self> {
        Ok(Self {
            store: DocumentStore::new()?,
            model,
            config,
        })
    }

    /// Index a source, returning how many documents it produced.
    pub fn index(&mut self, source: &Source) -> Result<usize> {
        indexing::index(
            source,
            &mut self.model,
            &mut self.store,
            self.config.batch_size,
        )
    }

    /// Classify `path` with the configured pattern and index it.
    pub fn index_path(&mut self, path: &Path) -> Result<usize> {
        let source = Source::resolve(path, &self.config.pattern)?;
        self.index(&source)
    }

    /// Answer a query; an empty result is not an error.
    pub fn query(&mut self, text: &str) -> Vec<QueryHit> {
        let params = QueryParams {
            top_k: self.config.results,
            fuzzy: self.config.fuzzy,
        };
        search::execute_query(text, params, &self.store, &mut self.model)
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
