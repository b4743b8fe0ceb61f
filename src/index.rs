use crate::errors::RunnerError;
use crate::query::Order;
use crate::types::RecordId;
use bson::{Bson, Document as BsonDocument};
use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, BTreeSet};

/// Name of the implicit primary-key index every collection reports.
pub const ID_INDEX_NAME: &str = "_id_";

#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub keys: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub build_time_ms: u128,
}

/// One component of an index key. Variant order follows the server's type brackets
/// for the types books actually carry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKeyKind {
    Null,
    Num(OrderedFloat<f64>),
    Str(String),
    Other(String),
    Bool(bool),
}

impl IndexKeyKind {
    fn same_bracket(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Smallest key within this key's bracket.
    fn floor(&self) -> Self {
        match self {
            Self::Null => Self::Null,
            Self::Num(_) => Self::Num(OrderedFloat(f64::NEG_INFINITY)),
            Self::Str(_) => Self::Str(String::new()),
            Self::Other(_) => Self::Other(String::new()),
            Self::Bool(_) => Self::Bool(false),
        }
    }
}

/// Missing fields are indexed as null, like the server does.
#[must_use]
pub fn key_from_bson(v: Option<&Bson>) -> IndexKeyKind {
    match v {
        None | Some(Bson::Null | Bson::Undefined) => IndexKeyKind::Null,
        Some(Bson::String(s)) => IndexKeyKind::Str(s.clone()),
        Some(Bson::Boolean(b)) => IndexKeyKind::Bool(*b),
        Some(other) => match crate::query::to_f64(other) {
            Some(n) => IndexKeyKind::Num(OrderedFloat(n)),
            None => IndexKeyKind::Other(other.to_string()),
        },
    }
}

/// Key pattern of an index, e.g. `{author: 1, published_year: -1}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub keys: Vec<(String, Order)>,
}

impl IndexSpec {
    /// # Errors
    /// Returns `RunnerError::IndexError` for an empty pattern or a direction other than 1/-1.
    pub fn from_keys(keys: &BsonDocument) -> Result<Self, RunnerError> {
        if keys.is_empty() {
            return Err(RunnerError::IndexError("index key pattern must not be empty".into()));
        }
        let mut out = Vec::with_capacity(keys.len());
        for (field, dir) in keys {
            let order = match crate::query::to_f64(dir) {
                Some(n) if n == 1.0 => Order::Asc,
                Some(n) if n == -1.0 => Order::Desc,
                _ => {
                    return Err(RunnerError::IndexError(format!(
                        "unsupported index direction for {field}: {dir}"
                    )));
                }
            };
            out.push((field.clone(), order));
        }
        Ok(Self { keys: out })
    }

    /// Server-style default name: `title_1`, `author_1_published_year_-1`.
    #[must_use]
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(f, o)| format!("{f}_{}", o.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }

    #[must_use]
    pub fn key_pattern(&self) -> BsonDocument {
        let mut d = BsonDocument::new();
        for (f, o) in &self.keys {
            d.insert(f.clone(), o.as_i32());
        }
        d
    }

    fn first_field(&self) -> &str {
        self.keys.first().map_or("", |(f, _)| f.as_str())
    }
}

/// Outcome of an index lookup: candidate records plus how many keys were walked.
#[derive(Debug, Clone, Default)]
pub struct IndexScan {
    pub ids: Vec<RecordId>,
    pub keys_examined: u64,
}

#[derive(Debug, Clone)]
pub struct BTreeIndex {
    pub name: String,
    pub spec: IndexSpec,
    pub map: BTreeMap<Vec<IndexKeyKind>, BTreeSet<RecordId>>,
    pub stats: IndexStats,
}

impl BTreeIndex {
    #[must_use]
    pub fn new(spec: IndexSpec) -> Self {
        Self { name: spec.name(), spec, map: BTreeMap::new(), stats: IndexStats::default() }
    }

    fn entry_key(&self, doc: &BsonDocument) -> Vec<IndexKeyKind> {
        self.spec
            .keys
            .iter()
            .map(|(f, _)| key_from_bson(crate::query::get_path(doc, f)))
            .collect()
    }

    pub fn insert(&mut self, doc: &BsonDocument, id: RecordId) {
        let k = self.entry_key(doc);
        if self.map.entry(k).or_default().insert(id) {
            self.stats.entries += 1;
        }
        self.stats.keys = self.map.len();
    }

    pub fn remove(&mut self, doc: &BsonDocument, id: RecordId) {
        let k = self.entry_key(doc);
        if let Some(set) = self.map.get_mut(&k) {
            if set.remove(&id) {
                self.stats.entries = self.stats.entries.saturating_sub(1);
            }
            if set.is_empty() {
                self.map.remove(&k);
            }
        }
        self.stats.keys = self.map.len();
    }

    /// Equality on the leading key field.
    pub fn lookup_eq(&mut self, v: &Bson) -> IndexScan {
        let k = key_from_bson(Some(v));
        let mut scan = IndexScan::default();
        for (key, set) in self.map.range(vec![k.clone()]..) {
            if key.first() != Some(&k) {
                break;
            }
            scan.keys_examined += 1;
            scan.ids.extend(set.iter().copied());
        }
        self.record(&scan);
        scan
    }

    /// Range on the leading key field, confined to the bound's type bracket.
    pub fn lookup_range(
        &mut self,
        min: Option<&Bson>,
        max: Option<&Bson>,
        inclusive_min: bool,
        inclusive_max: bool,
    ) -> IndexScan {
        let lo = min.map(|b| key_from_bson(Some(b)));
        let hi = max.map(|b| key_from_bson(Some(b)));
        let mut scan = IndexScan::default();
        let Some(bracket) = lo.clone().or_else(|| hi.clone()) else {
            return scan;
        };
        let start = lo.clone().unwrap_or_else(|| bracket.floor());
        for (key, set) in self.map.range(vec![start]..) {
            let Some(first) = key.first() else { continue };
            if !first.same_bracket(&bracket) {
                break;
            }
            if let Some(h) = &hi {
                match first.cmp(h) {
                    std::cmp::Ordering::Greater => break,
                    std::cmp::Ordering::Equal if !inclusive_max => break,
                    _ => {}
                }
            }
            scan.keys_examined += 1;
            if !inclusive_min && lo.as_ref() == Some(first) {
                continue;
            }
            scan.ids.extend(set.iter().copied());
        }
        self.record(&scan);
        scan
    }

    fn record(&mut self, scan: &IndexScan) {
        if scan.ids.is_empty() {
            self.stats.misses += 1;
        } else {
            self.stats.hits += 1;
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexDescriptor {
    pub name: String,
    pub key_pattern: BsonDocument,
}

#[derive(Debug, Default)]
pub struct IndexManager {
    pub indexes: Vec<BTreeIndex>,
}

impl IndexManager {
    #[must_use]
    pub fn new() -> Self {
        Self { indexes: Vec::new() }
    }

    /// Registers an index. Returns `Ok(false)` when an identical index already exists.
    ///
    /// # Errors
    /// Returns `RunnerError::IndexError` when the name is taken by a different key pattern.
    pub fn create_index(&mut self, spec: IndexSpec) -> Result<bool, RunnerError> {
        let name = spec.name();
        if let Some(existing) = self.indexes.iter().find(|i| i.name == name) {
            if existing.spec == spec {
                return Ok(false);
            }
            return Err(RunnerError::IndexError(format!(
                "index {name} already exists with a different key pattern"
            )));
        }
        self.indexes.push(BTreeIndex::new(spec));
        Ok(true)
    }

    pub fn drop_index(&mut self, name: &str) -> bool {
        let before = self.indexes.len();
        self.indexes.retain(|i| i.name != name);
        before != self.indexes.len()
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut BTreeIndex> {
        self.indexes.iter_mut().find(|i| i.name == name)
    }

    /// Index whose leading field is `field`, preferring the narrowest key pattern.
    pub fn for_leading_field(&mut self, field: &str) -> Option<&mut BTreeIndex> {
        self.indexes
            .iter_mut()
            .filter(|i| i.spec.first_field() == field)
            .min_by_key(|i| i.spec.keys.len())
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.indexes
            .iter()
            .map(|i| IndexDescriptor { name: i.name.clone(), key_pattern: i.spec.key_pattern() })
            .collect()
    }
}

pub fn index_insert_all(mgr: &mut IndexManager, doc: &BsonDocument, id: RecordId) {
    for idx in &mut mgr.indexes {
        idx.insert(doc, id);
    }
}

pub fn index_remove_all(mgr: &mut IndexManager, doc: &BsonDocument, id: RecordId) {
    for idx in &mut mgr.indexes {
        idx.remove(doc, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn year_index() -> BTreeIndex {
        let mut idx = BTreeIndex::new(IndexSpec::from_keys(&doc! {"published_year": 1}).unwrap());
        for (i, y) in [1851, 1949, 1960, 1988, 2015].iter().enumerate() {
            idx.insert(&doc! {"published_year": *y}, RecordId(i as u64));
        }
        idx.insert(&doc! {"title": "no year"}, RecordId(99));
        idx
    }

    #[test]
    fn names_follow_server_convention() {
        let spec = IndexSpec::from_keys(&doc! {"author": 1, "published_year": -1}).unwrap();
        assert_eq!(spec.name(), "author_1_published_year_-1");
        assert!(IndexSpec::from_keys(&doc! {"title": 2}).is_err());
    }

    #[test]
    fn range_scan_is_exclusive_and_skips_nulls() {
        let mut idx = year_index();
        let scan = idx.lookup_range(Some(&Bson::Int32(1960)), None, false, false);
        assert_eq!(scan.ids, vec![RecordId(3), RecordId(4)]);
        let scan = idx.lookup_range(None, Some(&Bson::Int32(1949)), false, true);
        assert_eq!(scan.ids, vec![RecordId(0), RecordId(1)]);
    }

    #[test]
    fn equality_scan_matches_across_numeric_types() {
        let mut idx = year_index();
        let scan = idx.lookup_eq(&Bson::Double(1988.0));
        assert_eq!(scan.ids, vec![RecordId(3)]);
        assert_eq!(idx.stats.hits, 1);
    }

    #[test]
    fn duplicate_create_is_a_noop_but_conflicts_error() {
        let mut mgr = IndexManager::new();
        let spec = IndexSpec::from_keys(&doc! {"title": 1}).unwrap();
        assert!(mgr.create_index(spec.clone()).unwrap());
        assert!(!mgr.create_index(spec).unwrap());
        assert_eq!(mgr.indexes.len(), 1);
    }
}
