use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("BSON: {0}")]
    Bson(#[from] bson::de::Error),

    #[error("BSON encode: {0}")]
    BsonEncode(#[from] bson::ser::Error),

    #[error("MongoDB: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("step '{step}' failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<RunnerError>,
    },
}

impl From<std::io::Error> for RunnerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl RunnerError {
    /// Wraps an operation failure with the name of the step that raised it.
    #[must_use]
    pub fn in_step(self, step: &'static str) -> Self {
        Self::Step { step, source: Box::new(self) }
    }
}
