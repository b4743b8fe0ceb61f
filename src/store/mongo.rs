use super::{BookStore, FindSpec};
use crate::config::{APP_NAME, Settings, redact_uri};
use crate::errors::RunnerError;
use crate::query::{DeleteReport, UpdateReport, Verbosity};
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use std::time::Duration;

/// A store backed by a MongoDB deployment through the official driver.
pub struct MongoStore {
    client: Client,
    db: Database,
    collection: Collection<Document>,
}

fn connection_err(e: &mongodb::error::Error) -> RunnerError {
    RunnerError::Connection(e.to_string())
}

impl MongoStore {
    /// Connects, verifies the deployment answers `ping`, and selects the configured collection.
    ///
    /// # Errors
    /// Returns `RunnerError::Connection` if the URI is invalid or the server cannot be reached.
    pub async fn connect(settings: &Settings) -> Result<Self, RunnerError> {
        log::info!("connecting to {}", redact_uri(&settings.uri));
        let mut opts = ClientOptions::parse(&settings.uri).await.map_err(|e| connection_err(&e))?;
        opts.app_name = Some(APP_NAME.to_string());
        if let Some(ms) = settings.server_selection_timeout_ms {
            opts.server_selection_timeout = Some(Duration::from_millis(ms));
        }
        let client = Client::with_options(opts).map_err(|e| connection_err(&e))?;
        client
            .database("admin")
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|e| connection_err(&e))?;
        let db = client.database(&settings.database);
        let collection = db.collection::<Document>(&settings.collection);
        log::info!("connected; using {}.{}", settings.database, settings.collection);
        Ok(Self { client, db, collection })
    }
}

impl BookStore for MongoStore {
    fn namespace(&self) -> String {
        crate::types::namespace(self.db.name(), self.collection.name())
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<Vec<Document>, RunnerError> {
        let mut action = self.collection.find(filter);
        if let Some(p) = spec.projection {
            action = action.projection(p);
        }
        if let Some(s) = spec.sort {
            action = action.sort(s);
        }
        if let Some(n) = spec.limit {
            action = action.limit(n);
        }
        let cursor = action.await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs)
    }

    async fn count(&self, filter: Document) -> Result<u64, RunnerError> {
        Ok(self.collection.count_documents(filter).await?)
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<usize, RunnerError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let res = self.collection.insert_many(docs).await?;
        Ok(res.inserted_ids.len())
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateReport, RunnerError> {
        let res = self.collection.update_one(filter, update).await?;
        Ok(UpdateReport { matched: res.matched_count, modified: res.modified_count })
    }

    async fn delete_one(&self, filter: Document) -> Result<DeleteReport, RunnerError> {
        let res = self.collection.delete_one(filter).await?;
        Ok(DeleteReport { deleted: res.deleted_count })
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, RunnerError> {
        let cursor = self.collection.aggregate(pipeline).await?;
        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| RunnerError::Aggregation(e.to_string()))?;
        Ok(docs)
    }

    async fn create_index(&self, keys: Document) -> Result<String, RunnerError> {
        let model = IndexModel::builder().keys(keys).build();
        let res = self
            .collection
            .create_index(model)
            .await
            .map_err(|e| RunnerError::IndexError(e.to_string()))?;
        Ok(res.index_name)
    }

    async fn list_index_names(&self) -> Result<Vec<String>, RunnerError> {
        Ok(self.collection.list_index_names().await?)
    }

    async fn explain_find(&self, filter: Document, verbosity: Verbosity) -> Result<Document, RunnerError> {
        let cmd = doc! {
            "explain": {"find": self.collection.name(), "filter": filter},
            "verbosity": verbosity.as_str(),
        };
        Ok(self.db.run_command(cmd).await?)
    }

    async fn drop_collection(&self) -> Result<(), RunnerError> {
        Ok(self.collection.drop().await?)
    }

    async fn close(self) -> Result<(), RunnerError> {
        self.client.shutdown().await;
        log::info!("client shut down");
        Ok(())
    }
}
