use super::{BookStore, FindSpec};
use crate::collection::Collection;
use crate::errors::RunnerError;
use crate::index::IndexSpec;
use crate::query::{self, DeleteReport, FindOptions, UpdateReport, Verbosity};
use bson::Document;
use std::sync::Arc;

/// A store backed by an in-process [`Collection`].
pub struct MemoryStore {
    database: String,
    collection: Arc<Collection>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { database: database.into(), collection: Arc::new(Collection::new(collection)) }
    }

    /// A store preloaded with the sample bookstore.
    #[must_use]
    pub fn seeded(database: impl Into<String>, collection: impl Into<String>) -> Self {
        let store = Self::new(database, collection);
        for d in crate::seed::sample_books() {
            store.collection.insert_document(d);
        }
        store
    }

    /// Underlying collection, for inspection in tests and the CLI.
    #[must_use]
    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }

    fn find_options(spec: &FindSpec) -> Result<FindOptions, RunnerError> {
        Ok(FindOptions {
            projection: spec.projection.as_ref().map(query::parse_projection).transpose()?,
            sort: spec.sort.as_ref().map(query::parse_sort).transpose()?,
            // the server treats a negative limit as its absolute value and 0 as no limit
            limit: spec.limit.filter(|n| *n != 0).and_then(|n| usize::try_from(n.unsigned_abs()).ok()),
            skip: None,
        })
    }
}

impl BookStore for MemoryStore {
    fn namespace(&self) -> String {
        crate::types::namespace(&self.database, self.collection.name_str())
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<Vec<Document>, RunnerError> {
        let filter = query::parse_filter(&filter)?;
        let opts = Self::find_options(&spec)?;
        Ok(query::find_docs(&self.collection, &filter, &opts).to_vec())
    }

    async fn count(&self, filter: Document) -> Result<u64, RunnerError> {
        let filter = query::parse_filter(&filter)?;
        Ok(crate::utils::num::count_u64(query::count_docs(&self.collection, &filter)))
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<usize, RunnerError> {
        let n = docs.len();
        for d in docs {
            self.collection.insert_document(d);
        }
        Ok(n)
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateReport, RunnerError> {
        let filter = query::parse_filter(&filter)?;
        let update = query::parse_update(&update)?;
        query::update_one(&self.collection, &filter, &update)
    }

    async fn delete_one(&self, filter: Document) -> Result<DeleteReport, RunnerError> {
        let filter = query::parse_filter(&filter)?;
        Ok(query::delete_one(&self.collection, &filter))
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, RunnerError> {
        query::aggregate_docs(self.collection.get_all_documents(), &pipeline)
    }

    async fn create_index(&self, keys: Document) -> Result<String, RunnerError> {
        self.collection.create_index(IndexSpec::from_keys(&keys)?)
    }

    async fn list_index_names(&self) -> Result<Vec<String>, RunnerError> {
        Ok(self.collection.index_descriptors().into_iter().map(|d| d.name).collect())
    }

    async fn explain_find(&self, filter: Document, verbosity: Verbosity) -> Result<Document, RunnerError> {
        query::explain_find(&self.collection, &self.database, &filter, verbosity)
    }

    async fn drop_collection(&self) -> Result<(), RunnerError> {
        self.collection.clear();
        Ok(())
    }

    async fn close(self) -> Result<(), RunnerError> {
        log::info!("closed in-memory store {} ({} documents)", self.namespace(), self.collection.len());
        Ok(())
    }
}
