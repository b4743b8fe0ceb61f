use crate::collection::Collection;
use crate::errors::RunnerError;
use crate::types::RecordId;
use crate::utils::num::{count_u64, elapsed_ms};
use bson::{Bson, Document as BsonDocument};
use std::sync::Arc;

use super::cursor::Cursor;
use super::eval::{compare_docs, eval_filter, project, to_f64};
use super::types::{CmpOp, DeleteReport, Filter, FindOptions, MAX_LIMIT, UpdateDoc, UpdateReport};

/// Index chosen by the planner for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexUse {
    pub name: String,
    pub key_pattern: BsonDocument,
}

/// Execution counters, reported by `explain` and the bench log lines.
#[derive(Debug, Clone, Default)]
pub struct ExecStats {
    pub n_returned: u64,
    pub docs_examined: u64,
    pub keys_examined: u64,
    pub elapsed_ms: u64,
    pub index: Option<IndexUse>,
}

struct Plan {
    index: Option<IndexUse>,
    ids: Vec<RecordId>,
    keys_examined: u64,
}

pub(crate) struct FindOutcome {
    pub ids: Vec<RecordId>,
    pub docs: Vec<BsonDocument>,
    pub stats: ExecStats,
}

fn plan_index_candidates(col: &Collection, filter: &Filter) -> Option<Plan> {
    match filter {
        Filter::Cmp { path, op, value } => {
            let mut mgr = col.indexes.write();
            let idx = mgr.for_leading_field(path)?;
            let scan = match op {
                CmpOp::Eq => idx.lookup_eq(value),
                CmpOp::Gt => idx.lookup_range(Some(value), None, false, false),
                CmpOp::Gte => idx.lookup_range(Some(value), None, true, false),
                CmpOp::Lt => idx.lookup_range(None, Some(value), false, false),
                CmpOp::Lte => idx.lookup_range(None, Some(value), false, true),
            };
            let mut ids = scan.ids;
            // keep natural order so "first match" means first inserted
            ids.sort_unstable();
            ids.dedup();
            Some(Plan {
                index: Some(IndexUse { name: idx.name.clone(), key_pattern: idx.spec.key_pattern() }),
                ids,
                keys_examined: scan.keys_examined,
            })
        }
        Filter::And(fs) => fs.iter().find_map(|f| plan_index_candidates(col, f)),
        _ => None,
    }
}

fn plan(col: &Collection, filter: &Filter) -> Plan {
    plan_index_candidates(col, filter)
        .unwrap_or_else(|| Plan { index: None, ids: col.list_ids(), keys_examined: 0 })
}

pub(crate) fn run_find(col: &Collection, filter: &Filter, opts: &FindOptions) -> FindOutcome {
    let start = std::time::Instant::now();
    let plan = plan(col, filter);
    let mut docs_examined = 0u64;
    let mut matched: Vec<(RecordId, BsonDocument)> = Vec::new();
    for id in &plan.ids {
        if let Some(d) = col.find_document(*id) {
            docs_examined += 1;
            if eval_filter(&d, filter) {
                matched.push((*id, d));
            }
        }
    }
    if let Some(sort) = &opts.sort {
        matched.sort_by(|a, b| compare_docs(&a.1, &b.1, sort));
    }
    let skip = opts.skip.unwrap_or(0);
    let limit = opts.limit.unwrap_or(usize::MAX).min(MAX_LIMIT);
    let (ids, mut docs): (Vec<RecordId>, Vec<BsonDocument>) =
        matched.into_iter().skip(skip).take(limit).unzip();
    if let Some(p) = &opts.projection {
        for d in &mut docs {
            *d = project(d, p);
        }
    }
    let stats = ExecStats {
        n_returned: count_u64(docs.len()),
        docs_examined,
        keys_examined: plan.keys_examined,
        elapsed_ms: elapsed_ms(start),
        index: plan.index,
    };
    FindOutcome { ids, docs, stats }
}

fn bench(op: &str, col: &Collection, stats: &ExecStats) {
    crate::dev6!(
        "{{\"bench\":\"query\",\"op\":\"{}\",\"collection\":\"{}\",\"duration_ms\":{},\"used_index\":{},\"result_count\":{},\"docs_examined\":{}}}",
        op,
        col.name_str(),
        stats.elapsed_ms,
        stats.index.is_some(),
        stats.n_returned,
        stats.docs_examined
    );
}

pub fn find_docs(col: &Arc<Collection>, filter: &Filter, opts: &FindOptions) -> Cursor {
    let outcome = run_find(col, filter, opts);
    bench("find", col, &outcome.stats);
    if opts.projection.is_none() && opts.sort.is_none() {
        // lazy path: re-fetch by id while iterating
        return Cursor { collection: col.clone(), ids: outcome.ids, pos: 0, docs: None };
    }
    Cursor { collection: col.clone(), ids: Vec::new(), pos: 0, docs: Some(outcome.docs) }
}

#[must_use]
pub fn count_docs(col: &Arc<Collection>, filter: &Filter) -> usize {
    let outcome = run_find(col, filter, &FindOptions::default());
    bench("count", col, &outcome.stats);
    outcome.docs.len()
}

fn matching_ids(col: &Collection, filter: &Filter) -> Vec<RecordId> {
    plan(col, filter)
        .ids
        .into_iter()
        .filter(|id| col.find_document(*id).is_some_and(|d| eval_filter(&d, filter)))
        .collect()
}

/// Updates the first matching document in natural order.
///
/// # Errors
/// Returns an error when `$inc` targets a non-numeric field.
pub fn update_one(
    col: &Arc<Collection>,
    filter: &Filter,
    update: &UpdateDoc,
) -> Result<UpdateReport, RunnerError> {
    let bench_start = std::time::Instant::now();
    let mut report = UpdateReport::default();
    if let Some(id) = matching_ids(col, filter).first().copied()
        && let Some(mut doc) = col.find_document(id)
    {
        report.matched = 1;
        if apply_update(&mut doc, update)? {
            report.modified = 1;
            col.update_document(id, doc);
        }
    }
    crate::dev6!(
        "{{\"bench\":\"query\",\"op\":\"update_one\",\"collection\":\"{}\",\"duration_ms\":{},\"matched\":{},\"modified\":{}}}",
        col.name_str(),
        elapsed_ms(bench_start),
        report.matched,
        report.modified
    );
    Ok(report)
}

/// Deletes the first matching document in natural order.
pub fn delete_one(col: &Arc<Collection>, filter: &Filter) -> DeleteReport {
    let deleted = matching_ids(col, filter)
        .first()
        .is_some_and(|id| col.delete_document(*id));
    crate::dev6!(
        "{{\"bench\":\"query\",\"op\":\"delete_one\",\"collection\":\"{}\",\"deleted\":{}}}",
        col.name_str(),
        u64::from(deleted)
    );
    DeleteReport { deleted: u64::from(deleted) }
}

/// Applies `$set`, `$inc` and `$unset` in that order. Returns whether anything changed.
///
/// # Errors
/// Returns `RunnerError::QueryError` when `$inc` targets a non-numeric value, or when a dotted
/// path runs through a value that is not a document.
pub fn apply_update(doc: &mut BsonDocument, upd: &UpdateDoc) -> Result<bool, RunnerError> {
    fn ensure_subdoc<'a>(
        root: &'a mut BsonDocument,
        key: &str,
        path: &str,
    ) -> Result<&'a mut BsonDocument, RunnerError> {
        if !root.contains_key(key) {
            root.insert(key.to_string(), Bson::Document(BsonDocument::new()));
        }
        match root.get_mut(key) {
            Some(Bson::Document(d)) => Ok(d),
            Some(other) => Err(RunnerError::QueryError(format!(
                "cannot create field '{path}' inside non-document value {other} at '{key}'"
            ))),
            None => Err(RunnerError::QueryError(format!("cannot create field '{path}'"))),
        }
    }
    fn traverse_to_parent<'a>(
        root: &'a mut BsonDocument,
        path: &str,
    ) -> Result<(&'a mut BsonDocument, String), RunnerError> {
        let mut cur = root;
        let mut iter = path.split('.').peekable();
        let mut last = String::new();
        while let Some(seg) = iter.next() {
            if iter.peek().is_none() {
                last = seg.to_string();
                break;
            }
            cur = ensure_subdoc(cur, seg, path)?;
        }
        Ok((cur, last))
    }
    fn set_path(root: &mut BsonDocument, path: &str, value: Bson) -> Result<bool, RunnerError> {
        let (parent, last) = traverse_to_parent(root, path)?;
        let old = parent.insert(last, value.clone());
        Ok(old.as_ref() != Some(&value))
    }
    fn unset_path(root: &mut BsonDocument, path: &str) -> bool {
        let mut cur = root;
        let mut iter = path.split('.').peekable();
        while let Some(seg) = iter.next() {
            if iter.peek().is_none() {
                return cur.remove(seg).is_some();
            }
            match cur.get_mut(seg) {
                Some(Bson::Document(d)) => cur = d,
                _ => return false,
            }
        }
        false
    }
    fn add_numbers(cur: &Bson, by: &Bson) -> Option<Bson> {
        let as_i64 = |b: &Bson| match b {
            Bson::Int32(i) => Some(i64::from(*i)),
            Bson::Int64(i) => Some(*i),
            _ => None,
        };
        match (cur, by) {
            (Bson::Int32(a), Bson::Int32(b)) => {
                Some(a.checked_add(*b).map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32))
            }
            _ => match (as_i64(cur), as_i64(by)) {
                (Some(a), Some(b)) => a.checked_add(b).map(Bson::Int64),
                _ => Some(Bson::Double(to_f64(cur)? + to_f64(by)?)),
            },
        }
    }

    let mut changed = false;
    for (k, v) in &upd.set {
        changed |= set_path(doc, k, v.clone())?;
    }
    for (k, by) in &upd.inc {
        let next = match super::eval::get_path(doc, k) {
            None => by.clone(),
            Some(cur) => add_numbers(cur, by).ok_or_else(|| {
                RunnerError::QueryError(format!("cannot apply $inc to non-numeric field {k}"))
            })?,
        };
        changed |= set_path(doc, k, next)?;
    }
    for k in &upd.unset {
        changed |= unset_path(doc, k);
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Order, Projection, SortSpec, parse_filter};
    use bson::doc;

    fn books() -> Arc<Collection> {
        let col = Arc::new(Collection::new("books"));
        col.insert_document(doc! {"title": "A", "price": 12.5, "published_year": 1960});
        col.insert_document(doc! {"title": "B", "price": 8, "published_year": 1940});
        col.insert_document(doc! {"title": "C", "published_year": 2015});
        col
    }

    #[test]
    fn update_doc_set_inc_unset() {
        let mut d = doc! {"x": 1, "y": 2, "z": 0};
        let ud = UpdateDoc {
            set: vec![("y".into(), Bson::Int32(5))],
            inc: vec![("x".into(), Bson::Int32(2))],
            unset: vec!["z".into()],
        };
        assert!(apply_update(&mut d, &ud).unwrap());
        assert_eq!(d, doc! {"x": 3, "y": 5});
    }

    #[test]
    fn inc_on_string_is_an_error() {
        let mut d = doc! {"price": "free"};
        let ud = UpdateDoc { inc: vec![("price".into(), Bson::Int32(1))], ..UpdateDoc::default() };
        assert!(apply_update(&mut d, &ud).is_err());
    }

    #[test]
    fn dotted_set_through_a_scalar_is_rejected() {
        let mut d = doc! {"title": "A", "meta": {"pages": 10}};
        let nested = UpdateDoc { set: vec![("meta.isbn".into(), Bson::from("x"))], ..UpdateDoc::default() };
        assert!(apply_update(&mut d, &nested).unwrap());
        assert_eq!(d, doc! {"title": "A", "meta": {"pages": 10, "isbn": "x"}});

        let through = UpdateDoc { set: vec![("title.sub".into(), Bson::Int32(1))], ..UpdateDoc::default() };
        let e = apply_update(&mut d, &through).unwrap_err();
        assert!(e.to_string().contains("cannot create field 'title.sub'"));
        assert_eq!(d.get_str("title").unwrap(), "A");

        let inc = UpdateDoc { inc: vec![("title.n".into(), Bson::Int32(1))], ..UpdateDoc::default() };
        assert!(apply_update(&mut d, &inc).is_err());
    }

    #[test]
    fn failed_update_leaves_the_stored_document_alone() {
        let col = books();
        let f = parse_filter(&doc! {"title": "A"}).unwrap();
        let upd = UpdateDoc {
            set: vec![("price".into(), Bson::Int32(1)), ("title.sub".into(), Bson::Int32(1))],
            ..UpdateDoc::default()
        };
        assert!(update_one(&col, &f, &upd).is_err());
        let stored = find_docs(&col, &f, &FindOptions::default()).to_vec();
        assert_eq!(stored[0].get_f64("price").unwrap(), 12.5);
        assert_eq!(stored[0].get_str("title").unwrap(), "A");
    }

    #[test]
    fn find_docs_projection_sort_and_pagination() {
        let col = books();
        let opts = FindOptions {
            projection: Some(Projection::Include { fields: vec!["title".into()], include_id: false }),
            sort: Some(vec![SortSpec { field: "price".into(), order: Order::Desc }]),
            limit: Some(2),
            skip: None,
        };
        let docs = find_docs(&col, &Filter::True, &opts).to_vec();
        assert_eq!(docs, vec![doc! {"title": "A"}, doc! {"title": "B"}]);
    }

    #[test]
    fn update_one_touches_only_the_first_match() {
        let col = books();
        let f = parse_filter(&doc! {"published_year": {"$gt": 1900}}).unwrap();
        let upd = UpdateDoc { set: vec![("price".into(), Bson::Int32(1000))], ..UpdateDoc::default() };
        let r = update_one(&col, &f, &upd).unwrap();
        assert_eq!(r, UpdateReport { matched: 1, modified: 1 });
        let prices: Vec<_> = col.get_all_documents().iter().map(|d| d.get("price").cloned()).collect();
        assert_eq!(prices[0], Some(Bson::Int32(1000)));
        assert_eq!(prices[1], Some(Bson::Int32(8)));
    }

    #[test]
    fn bench_line_reports_index_use() {
        let _g = crate::utils::devlog::capture();
        let col = books();
        col.create_index(crate::index::IndexSpec::from_keys(&doc! {"title": 1}).unwrap()).unwrap();
        let f = parse_filter(&doc! {"title": "B"}).unwrap();
        assert_eq!(count_docs(&col, &f), 1);
        let counts = crate::utils::devlog::bench_lines("count");
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0]["used_index"], true);
    }
}
