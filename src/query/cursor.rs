use crate::collection::Collection;
use crate::types::RecordId;
use bson::Document as BsonDocument;
use std::sync::Arc;

/// A forward-only cursor over query results.
///
/// Holds either record ids that are fetched lazily, or already materialized
/// documents (after sorting or projection).
#[derive(Clone)]
pub struct Cursor {
    pub collection: Arc<Collection>,
    pub ids: Vec<RecordId>,
    pub pos: usize,
    pub docs: Option<Vec<BsonDocument>>, // when present, iterate these
}

impl Cursor {
    pub fn advance(&mut self) -> Option<BsonDocument> {
        if let Some(ref docs) = self.docs {
            let d = docs.get(self.pos)?.clone();
            self.pos += 1;
            return Some(d);
        }
        while let Some(id) = self.ids.get(self.pos).copied() {
            self.pos += 1;
            // a record deleted after planning is skipped
            if let Some(d) = self.collection.find_document(id) {
                return Some(d);
            }
        }
        None
    }

    #[must_use]
    pub fn to_vec(mut self) -> Vec<BsonDocument> {
        if let Some(docs) = self.docs.take() {
            return docs.into_iter().skip(self.pos).collect();
        }
        let mut out = Vec::with_capacity(self.ids.len());
        while let Some(d) = self.advance() {
            out.push(d);
        }
        out
    }
}

impl Iterator for Cursor {
    type Item = BsonDocument;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}
