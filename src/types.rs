use serde::{Deserialize, Serialize};

/// Position of a record in an in-memory collection.
///
/// Ids are handed out in insertion order, so iterating records by id yields the
/// collection's natural order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fully qualified collection name, `<database>.<collection>`.
#[must_use]
pub fn namespace(database: &str, collection: &str) -> String {
    format!("{database}.{collection}")
}
