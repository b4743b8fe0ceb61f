//! Storage backends the runner can drive.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::errors::RunnerError;
use crate::query::{DeleteReport, UpdateReport, Verbosity};
use bson::Document;

/// Options for [`BookStore::find`], in server syntax.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<i64>,
}

impl FindSpec {
    #[must_use]
    pub fn projected(projection: Document) -> Self {
        Self { projection: Some(projection), ..Self::default() }
    }

    #[must_use]
    pub fn sorted(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// A connection to one collection of books.
///
/// The store is owned by whoever opened it and released with [`BookStore::close`], which
/// consumes it.
#[allow(async_fn_in_trait)]
pub trait BookStore {
    /// `<database>.<collection>`.
    fn namespace(&self) -> String;

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<Vec<Document>, RunnerError>;

    async fn count(&self, filter: Document) -> Result<u64, RunnerError>;

    async fn insert_many(&self, docs: Vec<Document>) -> Result<usize, RunnerError>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateReport, RunnerError>;

    /// Removes the first document matching `filter`.
    async fn delete_one(&self, filter: Document) -> Result<DeleteReport, RunnerError>;

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, RunnerError>;

    /// Creates an index and returns its name. Creating an existing index is a no-op.
    async fn create_index(&self, keys: Document) -> Result<String, RunnerError>;

    async fn list_index_names(&self) -> Result<Vec<String>, RunnerError>;

    async fn explain_find(&self, filter: Document, verbosity: Verbosity) -> Result<Document, RunnerError>;

    async fn drop_collection(&self) -> Result<(), RunnerError>;

    async fn close(self) -> Result<(), RunnerError>
    where
        Self: Sized;
}

/// Inserts `docs` and hands the store back. When the insert fails the store is closed
/// before the error is returned, so a caller that never receives it holds no connection.
///
/// # Errors
/// Returns the insert failure wrapped as the `seed` step.
pub async fn seed_or_close<S: BookStore>(store: S, docs: Vec<Document>) -> Result<S, RunnerError> {
    match store.insert_many(docs).await {
        Ok(n) => {
            log::info!("inserted {n} documents into {}", store.namespace());
            Ok(store)
        }
        Err(e) => {
            let e = e.in_step("seed");
            log::error!("{e}");
            if let Err(c) = store.close().await {
                log::error!("close after failed seed: {c}");
            }
            Err(e)
        }
    }
}
