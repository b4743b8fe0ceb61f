use super::core::Collection;
use crate::index::{index_insert_all, index_remove_all};
use crate::types::RecordId;
use bson::Document as BsonDocument;
use bson::oid::ObjectId;
use std::sync::atomic::Ordering;

impl Collection {
    /// Stores a document, assigning an `_id` when it has none.
    pub fn insert_document(&self, mut document: BsonDocument) -> RecordId {
        let _guard = self.build_lock.read();
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let id = RecordId(self.next_id.fetch_add(1, Ordering::SeqCst));
        index_insert_all(&mut self.indexes.write(), &document, id);
        self.records.write().insert(id, document);
        log::debug!("insert {id} into {}", self.name);
        id
    }

    pub fn find_document(&self, id: RecordId) -> Option<BsonDocument> {
        self.records.read().get(&id).cloned()
    }

    /// Replaces the stored document; the original `_id` is kept.
    pub fn update_document(&self, id: RecordId, mut new_document: BsonDocument) -> bool {
        let _guard = self.build_lock.read();
        let mut records = self.records.write();
        let Some(old) = records.get(&id) else {
            return false;
        };
        if let Some(oid) = old.get("_id") {
            new_document.insert("_id", oid.clone());
        }
        let mut mgr = self.indexes.write();
        index_remove_all(&mut mgr, old, id);
        index_insert_all(&mut mgr, &new_document, id);
        records.insert(id, new_document);
        true
    }

    pub fn delete_document(&self, id: RecordId) -> bool {
        let _guard = self.build_lock.read();
        let Some(old) = self.records.write().remove(&id) else {
            return false;
        };
        index_remove_all(&mut self.indexes.write(), &old, id);
        log::debug!("delete {id} from {}", self.name);
        true
    }

    /// Record ids in natural (insertion) order.
    pub fn list_ids(&self) -> Vec<RecordId> {
        self.records.read().keys().copied().collect()
    }

    pub fn get_all_documents(&self) -> Vec<BsonDocument> {
        self.records.read().values().cloned().collect()
    }

    /// Removes every record and every secondary index.
    pub fn clear(&self) {
        let _guard = self.build_lock.write();
        self.records.write().clear();
        self.indexes.write().indexes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn insert_assigns_object_id_and_keeps_order() {
        let col = Collection::new("books");
        let a = col.insert_document(doc! {"title": "A"});
        let b = col.insert_document(doc! {"title": "B"});
        assert!(a < b);
        assert!(col.find_document(a).unwrap().get_object_id("_id").is_ok());
        let titles: Vec<String> = col
            .get_all_documents()
            .iter()
            .map(|d| d.get_str("title").unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn update_preserves_id_and_delete_removes() {
        let col = Collection::new("books");
        let id = col.insert_document(doc! {"_id": 7, "title": "A"});
        assert!(col.update_document(id, doc! {"title": "A2"}));
        let d = col.find_document(id).unwrap();
        assert_eq!(d.get_i32("_id").unwrap(), 7);
        assert_eq!(d.get_str("title").unwrap(), "A2");
        assert!(col.delete_document(id));
        assert!(!col.delete_document(id));
        assert!(col.is_empty());
    }
}
