use super::core::Collection;
use crate::errors::RunnerError;
use crate::index::{ID_INDEX_NAME, IndexDescriptor, IndexSpec};
use bson::doc;

impl Collection {
    /// Declares an index and builds it from the current records.
    ///
    /// Creating an index that already exists is a no-op returning the same name.
    ///
    /// # Errors
    /// Returns `RunnerError::IndexError` when the name clashes with a different pattern.
    pub fn create_index(&self, spec: IndexSpec) -> Result<String, RunnerError> {
        let _wguard = self.build_lock.write();
        let name = spec.name();
        let mut mgr = self.indexes.write();
        if !mgr.create_index(spec)? {
            log::debug!("index {name} already present on {}", self.name);
            return Ok(name);
        }
        // offline build from the current records
        let start = std::time::Instant::now();
        let records = self.records.read();
        if let Some(idx) = mgr.get_mut(&name) {
            for (id, doc) in records.iter() {
                idx.insert(doc, *id);
            }
            idx.stats.build_time_ms = start.elapsed().as_millis();
        }
        log::info!("built index {name} on {} ({} records)", self.name, records.len());
        Ok(name)
    }

    pub fn drop_index(&self, name: &str) -> bool {
        let _wguard = self.build_lock.write();
        self.indexes.write().drop_index(name)
    }

    /// All indexes including the implicit `_id_` index, in creation order.
    pub fn index_descriptors(&self) -> Vec<IndexDescriptor> {
        let mut out =
            vec![IndexDescriptor { name: ID_INDEX_NAME.to_string(), key_pattern: doc! {"_id": 1} }];
        out.extend(self.indexes.read().descriptors());
        out
    }
}
