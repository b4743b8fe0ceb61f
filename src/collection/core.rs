use crate::index::IndexManager;
use crate::types::RecordId;
use bson::Document as BsonDocument;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;

/// An in-memory collection of schemaless documents.
///
/// Records live in a `BTreeMap` keyed by `RecordId`, so a scan visits them in
/// insertion order. Secondary indexes are kept in sync on every write.
pub struct Collection {
    pub name: String,
    pub(crate) records: RwLock<BTreeMap<RecordId, BsonDocument>>,
    pub(crate) next_id: AtomicU64,
    pub indexes: RwLock<IndexManager>,
    pub(crate) build_lock: RwLock<()>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
            indexes: RwLock::new(IndexManager::new()),
            build_lock: RwLock::new(()),
        }
    }

    pub fn name_str(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
