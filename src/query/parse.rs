use crate::errors::RunnerError;
use bson::{Bson, Document as BsonDocument};

use super::types::{
    CmpOp, Filter, MAX_IN_SET, MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS, MAX_UPDATE_FIELDS, Order,
    Projection, SortSpec, UpdateDoc,
};

fn query_err(msg: impl Into<String>) -> RunnerError {
    RunnerError::QueryError(msg.into())
}

/// Parses a filter written in server syntax (`{"published_year": {"$gt": 1950}}`).
///
/// # Errors
/// Returns `RunnerError::QueryError` for unknown operators or malformed operands.
pub fn parse_filter(doc: &BsonDocument) -> Result<Filter, RunnerError> {
    let mut clauses = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        clauses.push(parse_clause(key, value)?);
    }
    Ok(match clauses.len() {
        0 => Filter::True,
        1 => clauses.remove(0),
        _ => Filter::And(clauses),
    })
}

fn parse_clause(key: &str, value: &Bson) -> Result<Filter, RunnerError> {
    match key {
        "$and" => Ok(Filter::And(parse_filter_list(key, value)?)),
        "$or" => Ok(Filter::Or(parse_filter_list(key, value)?)),
        "$nor" => Ok(Filter::Not(Box::new(Filter::Or(parse_filter_list(key, value)?)))),
        k if k.starts_with('$') => Err(query_err(format!("unknown top-level operator: {k}"))),
        field => match value {
            Bson::Document(ops) if is_operator_doc(ops) => parse_field_ops(field, ops),
            other => Ok(Filter::Cmp { path: field.to_string(), op: CmpOp::Eq, value: other.clone() }),
        },
    }
}

fn parse_filter_list(op: &str, value: &Bson) -> Result<Vec<Filter>, RunnerError> {
    let Bson::Array(items) = value else {
        return Err(query_err(format!("{op} requires an array")));
    };
    if items.is_empty() {
        return Err(query_err(format!("{op} requires a non-empty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter(d),
            _ => Err(query_err(format!("{op} entries must be documents"))),
        })
        .collect()
}

fn is_operator_doc(d: &BsonDocument) -> bool {
    d.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn parse_field_ops(field: &str, ops: &BsonDocument) -> Result<Filter, RunnerError> {
    let mut parts = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let path = field.to_string();
        let f = match op.as_str() {
            "$eq" => Filter::Cmp { path, op: CmpOp::Eq, value: operand.clone() },
            "$ne" => Filter::Not(Box::new(Filter::Cmp { path, op: CmpOp::Eq, value: operand.clone() })),
            "$gt" => Filter::Cmp { path, op: CmpOp::Gt, value: operand.clone() },
            "$gte" => Filter::Cmp { path, op: CmpOp::Gte, value: operand.clone() },
            "$lt" => Filter::Cmp { path, op: CmpOp::Lt, value: operand.clone() },
            "$lte" => Filter::Cmp { path, op: CmpOp::Lte, value: operand.clone() },
            "$in" => Filter::In { path, values: array_operand(op, operand)? },
            "$nin" => Filter::Nin { path, values: array_operand(op, operand)? },
            "$exists" => Filter::Exists { path, exists: truthy(operand) },
            "$not" => match operand {
                Bson::Document(inner) if is_operator_doc(inner) => {
                    Filter::Not(Box::new(parse_field_ops(field, inner)?))
                }
                _ => return Err(query_err("$not requires an operator document")),
            },
            #[cfg(feature = "regex")]
            "$regex" => {
                let case_insensitive = ops.get_str("$options").is_ok_and(|o| o.contains('i'));
                match operand {
                    Bson::String(p) => Filter::Regex { path, pattern: p.clone(), case_insensitive },
                    Bson::RegularExpression(r) => Filter::Regex {
                        path,
                        pattern: r.pattern.clone(),
                        case_insensitive: case_insensitive || r.options.contains('i'),
                    },
                    _ => return Err(query_err("$regex requires a string pattern")),
                }
            }
            #[cfg(feature = "regex")]
            "$options" => continue,
            other => return Err(query_err(format!("unknown operator: {other}"))),
        };
        parts.push(f);
    }
    Ok(if parts.len() == 1 { parts.remove(0) } else { Filter::And(parts) })
}

fn array_operand(op: &str, operand: &Bson) -> Result<Vec<Bson>, RunnerError> {
    match operand {
        Bson::Array(vals) => Ok(vals.iter().take(MAX_IN_SET).cloned().collect()),
        _ => Err(query_err(format!("{op} requires an array"))),
    }
}

fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        other => super::eval::to_f64(other).is_none_or(|n| n != 0.0),
    }
}

fn direction(field: &str, v: &Bson) -> Result<Order, RunnerError> {
    match super::eval::to_f64(v) {
        Some(n) if n > 0.0 => Ok(Order::Asc),
        Some(n) if n < 0.0 => Ok(Order::Desc),
        _ => Err(query_err(format!("invalid sort direction for {field}: {v}"))),
    }
}

/// Parses a sort document (`{"price": -1}`) into ordered sort keys.
///
/// # Errors
/// Returns an error when a direction is not a non-zero number or there are too many keys.
pub fn parse_sort(doc: &BsonDocument) -> Result<Vec<SortSpec>, RunnerError> {
    if doc.len() > MAX_SORT_FIELDS {
        return Err(query_err(format!("sort spec too long: {}", doc.len())));
    }
    doc.iter()
        .map(|(field, v)| Ok(SortSpec { field: field.clone(), order: direction(field, v)? }))
        .collect()
}

/// Parses a projection document (`{"title": 1, "_id": 0}`).
///
/// # Errors
/// Returns an error when inclusion and exclusion are mixed on fields other than `_id`.
pub fn parse_projection(doc: &BsonDocument) -> Result<Projection, RunnerError> {
    if doc.len() > MAX_PROJECTION_FIELDS {
        return Err(query_err(format!("projection too long: {}", doc.len())));
    }
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut id_flag: Option<bool> = None;
    for (field, v) in doc {
        let on = truthy(v);
        if field == "_id" {
            id_flag = Some(on);
        } else if on {
            include.push(field.clone());
        } else {
            exclude.push(field.clone());
        }
    }
    match (include.is_empty(), exclude.is_empty()) {
        (false, false) => Err(query_err("cannot mix inclusion and exclusion in a projection")),
        (false, true) => Ok(Projection::Include { fields: include, include_id: id_flag.unwrap_or(true) }),
        (true, false) => {
            if id_flag == Some(false) {
                exclude.push("_id".into());
            }
            Ok(Projection::Exclude { fields: exclude })
        }
        (true, true) => Ok(match id_flag {
            Some(false) => Projection::Exclude { fields: vec!["_id".into()] },
            Some(true) => Projection::Include { fields: Vec::new(), include_id: true },
            None => Projection::Exclude { fields: Vec::new() },
        }),
    }
}

/// Parses an update document made of `$set`, `$inc` and `$unset`.
///
/// # Errors
/// Returns an error for replacement documents, unknown operators and non-numeric `$inc`.
pub fn parse_update(doc: &BsonDocument) -> Result<UpdateDoc, RunnerError> {
    if doc.is_empty() {
        return Err(query_err("update document must not be empty"));
    }
    let mut out = UpdateDoc::default();
    for (op, body) in doc {
        let Bson::Document(fields) = body else {
            return Err(query_err(format!("{op} requires a document")));
        };
        match op.as_str() {
            "$set" => {
                for (k, v) in fields.iter().take(MAX_UPDATE_FIELDS) {
                    out.set.push((k.clone(), v.clone()));
                }
            }
            "$inc" => {
                for (k, v) in fields.iter().take(MAX_UPDATE_FIELDS) {
                    if super::eval::to_f64(v).is_none() {
                        return Err(query_err("$inc requires numeric"));
                    }
                    out.inc.push((k.clone(), v.clone()));
                }
            }
            "$unset" => {
                out.unset.extend(fields.keys().take(MAX_UPDATE_FIELDS).cloned());
            }
            k if k.starts_with('$') => return Err(query_err(format!("unknown update operator: {k}"))),
            _ => return Err(query_err("update document requires atomic operators")),
        }
    }
    Ok(out)
}

/// # Errors
/// Returns an error if the JSON string is not an object or is not a valid filter.
pub fn parse_filter_json(json: &str) -> Result<Filter, RunnerError> {
    let doc = crate::utils::json::str_to_document(json).map_err(query_err)?;
    parse_filter(&doc)
}

/// # Errors
/// Returns an error if the JSON string is not an object or is not a valid update.
pub fn parse_update_json(json: &str) -> Result<UpdateDoc, RunnerError> {
    let doc = crate::utils::json::str_to_document(json).map_err(query_err)?;
    parse_update(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn implicit_equality_and_operator_doc() {
        let f = parse_filter(&doc! {"in_stock": true, "published_year": {"$gt": 2010}}).unwrap();
        let Filter::And(parts) = f else { panic!("expected conjunction") };
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], Filter::Cmp { path, op: CmpOp::Eq, .. } if path == "in_stock"));
        assert!(matches!(&parts[1], Filter::Cmp { op: CmpOp::Gt, .. }));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches!(parse_filter(&doc! {}).unwrap(), Filter::True));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let e = parse_filter(&doc! {"price": {"$near": 3}}).unwrap_err();
        assert!(e.to_string().contains("$near"));
    }

    #[test]
    fn projection_mixing_is_rejected() {
        assert!(parse_projection(&doc! {"title": 1, "genre": 0}).is_err());
        let p = parse_projection(&doc! {"title": 1, "author": 1, "price": 1, "_id": 0}).unwrap();
        assert_eq!(
            p,
            Projection::Include {
                fields: vec!["title".into(), "author".into(), "price".into()],
                include_id: false
            }
        );
    }

    #[test]
    fn sort_direction_must_be_signed_number() {
        let s = parse_sort(&doc! {"price": -1, "title": 1}).unwrap();
        assert_eq!(s[0].order, Order::Desc);
        assert_eq!(s[1].order, Order::Asc);
        assert!(parse_sort(&doc! {"price": 0}).is_err());
    }

    #[test]
    fn replacement_update_is_rejected() {
        assert!(parse_update(&doc! {"price": 1000}).is_err());
        let u = parse_update(&doc! {"$set": {"price": 1000}, "$unset": {"promo": ""}}).unwrap();
        assert_eq!(u.set.len(), 1);
        assert_eq!(u.unset, vec!["promo".to_string()]);
    }
}
