use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{
    CmpOp, Filter, MAX_IN_SET, MAX_PATH_DEPTH, MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS, Order,
    Projection, SortSpec,
};

pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => is_in_set(get_path(doc, path), values),
        Filter::Nin { path, values } => !is_in_set(get_path(doc, path), values),
        Filter::Cmp { path, op, value } => match (get_path(doc, path), op) {
            (Some(v), CmpOp::Eq) => values_equal(v, value),
            // a missing field equals null, as on the server
            (None, CmpOp::Eq) => matches!(value, Bson::Null),
            (Some(v), _) => {
                // range operators only match within the same type bracket
                if type_rank(v) != type_rank(value) {
                    return false;
                }
                let c = compare_bson(v, value);
                match op {
                    CmpOp::Gt => c == Ordering::Greater,
                    CmpOp::Gte => c != Ordering::Less,
                    CmpOp::Lt => c == Ordering::Less,
                    CmpOp::Lte => c != Ordering::Greater,
                    CmpOp::Eq => unreachable!(),
                }
            }
            (None, _) => false,
        },
        #[cfg(feature = "regex")]
        Filter::Regex { path, pattern, case_insensitive } => {
            if let Some(Bson::String(s)) = get_path(doc, path) {
                let mut re = regex::RegexBuilder::new(pattern);
                re.case_insensitive(*case_insensitive);
                if let Ok(r) = re.build() { r.is_match(s) } else { false }
            } else {
                false
            }
        }
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        let ord = compare_opt(get_path(a, &s.field), get_path(b, &s.field));
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Orders optional values with a missing field below every present value, null included.
pub fn compare_opt(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => compare_bson(x, y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn is_in_set(v: Option<&Bson>, set: &[Bson]) -> bool {
    match v {
        Some(v) => set.iter().take(MAX_IN_SET).any(|x| values_equal(v, x)),
        None => set.iter().take(MAX_IN_SET).any(|x| matches!(x, Bson::Null)),
    }
}

pub(crate) fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut cur = doc.get(first)?;
    for (depth, part) in parts.enumerate() {
        if depth + 2 > MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Bson::Document(d) => cur = d.get(part)?,
            _ => return None,
        }
    }
    Some(cur)
}

pub(crate) fn to_f64(b: &Bson) -> Option<f64> {
    match b {
        Bson::Int32(i) => Some(f64::from(*i)),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        _ => None,
    }
}

/// Equality with numeric widening, so `Int32(1000)` matches `Double(1000.0)`.
#[allow(clippy::float_cmp)]
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    if let (Some(x), Some(y)) = (to_f64(a), to_f64(b)) {
        return x == y;
    }
    a == b
}

pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (to_f64(a), to_f64(b)) {
        return x.total_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// Bracket order used by the server when comparing values of different types.
fn type_rank(v: &Bson) -> u8 {
    use bson::Bson as T;
    match v {
        T::MinKey => 0,
        T::Null | T::Undefined => 1,
        T::Int32(_) | T::Int64(_) | T::Double(_) | T::Decimal128(_) => 2,
        T::Symbol(_) | T::String(_) => 3,
        T::Document(_) => 4,
        T::Array(_) => 5,
        T::Binary(_) => 6,
        T::ObjectId(_) => 7,
        T::Boolean(_) => 8,
        T::DateTime(_) => 9,
        T::Timestamp(_) => 10,
        T::RegularExpression(_) => 11,
        T::DbPointer(_) => 12,
        T::JavaScriptCode(_) | T::JavaScriptCodeWithScope(_) => 13,
        T::MaxKey => 255,
    }
}

pub fn project(doc: &BsonDocument, projection: &Projection) -> BsonDocument {
    match projection {
        Projection::Include { fields, include_id } => {
            let mut out = BsonDocument::new();
            if *include_id && let Some(id) = doc.get("_id") {
                out.insert("_id", id.clone());
            }
            for f in fields.iter().take(MAX_PROJECTION_FIELDS) {
                if let Some(v) = get_path(doc, f) {
                    insert_path(&mut out, f, v.clone());
                }
            }
            out
        }
        Projection::Exclude { fields } => {
            let mut out = doc.clone();
            for f in fields.iter().take(MAX_PROJECTION_FIELDS) {
                remove_path(&mut out, f);
            }
            out
        }
    }
}

fn insert_path(out: &mut BsonDocument, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            out.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(out.get(head), Some(Bson::Document(_))) {
                out.insert(head, BsonDocument::new());
            }
            if let Some(Bson::Document(sub)) = out.get_mut(head) {
                insert_path(sub, rest, value);
            }
        }
    }
}

fn remove_path(out: &mut BsonDocument, path: &str) {
    match path.split_once('.') {
        None => {
            out.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(sub)) = out.get_mut(head) {
                remove_path(sub, rest);
            }
        }
    }
}
