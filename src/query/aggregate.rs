//! Aggregation pipelines over in-memory documents.
//!
//! Supported stages: `$match`, `$group`, `$sort`, `$limit`, `$skip`, `$project`, `$count`.
//! `$group` accepts `$sum`, `$avg`, `$min`, `$max`, `$first` and `$last` and emits groups
//! in the order their key was first seen.

use crate::errors::RunnerError;
use bson::{Bson, Document as BsonDocument};

use super::eval::{compare_bson, compare_docs, eval_filter, get_path, project, to_f64, values_equal};
use super::parse::{parse_filter, parse_projection, parse_sort};
use super::types::{Filter, MAX_LIMIT, Projection, SortSpec};

const MAX_STAGES: usize = 64;

fn agg_err(msg: impl Into<String>) -> RunnerError {
    RunnerError::Aggregation(msg.into())
}

/// Value expression: `"$field"`, a literal, or a document of expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(Bson),
    Doc(Vec<(String, Expr)>),
}

impl Expr {
    fn parse(v: &Bson) -> Result<Self, RunnerError> {
        match v {
            Bson::String(s) if s.starts_with('$') => {
                let path = &s[1..];
                if path.is_empty() || path.starts_with('$') {
                    return Err(agg_err(format!("unsupported field path: {s}")));
                }
                Ok(Self::Field(path.to_string()))
            }
            Bson::Document(d) => {
                if let Some(k) = d.keys().find(|k| k.starts_with('$')) {
                    return Err(agg_err(format!("unsupported expression operator: {k}")));
                }
                d.iter()
                    .map(|(k, v)| Ok((k.clone(), Self::parse(v)?)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Doc)
            }
            other => Ok(Self::Literal(other.clone())),
        }
    }

    /// Evaluates against `doc`; `None` means the referenced field is missing.
    fn eval(&self, doc: &BsonDocument) -> Option<Bson> {
        match self {
            Self::Field(p) => get_path(doc, p).cloned(),
            Self::Literal(b) => Some(b.clone()),
            Self::Doc(fields) => {
                let mut out = BsonDocument::new();
                for (k, e) in fields {
                    if let Some(v) = e.eval(doc) {
                        out.insert(k.clone(), v);
                    }
                }
                Some(Bson::Document(out))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccOp {
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub field: String,
    pub op: AccOp,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub id: Expr,
    pub accumulators: Vec<Accumulator>,
}

#[derive(Debug, Clone)]
pub enum Stage {
    Match(Filter),
    Group(GroupSpec),
    Sort(Vec<SortSpec>),
    Limit(usize),
    Skip(usize),
    Project(Projection),
    Count(String),
}

/// Parses a pipeline written in server syntax.
///
/// # Errors
/// Returns `RunnerError::Aggregation` for unknown stages or malformed stage bodies.
pub fn parse_pipeline(stages: &[BsonDocument]) -> Result<Vec<Stage>, RunnerError> {
    if stages.len() > MAX_STAGES {
        return Err(agg_err(format!("pipeline too long: {}", stages.len())));
    }
    stages.iter().map(parse_stage).collect()
}

fn parse_stage(stage: &BsonDocument) -> Result<Stage, RunnerError> {
    let mut it = stage.iter();
    let (Some((name, body)), None) = (it.next(), it.next()) else {
        return Err(agg_err("a pipeline stage must have exactly one field"));
    };
    match (name.as_str(), body) {
        ("$match", Bson::Document(d)) => Ok(Stage::Match(parse_filter(d)?)),
        ("$group", Bson::Document(d)) => parse_group(d).map(Stage::Group),
        ("$sort", Bson::Document(d)) => {
            let s = parse_sort(d)?;
            if s.is_empty() {
                return Err(agg_err("$sort requires at least one key"));
            }
            Ok(Stage::Sort(s))
        }
        ("$project", Bson::Document(d)) => Ok(Stage::Project(parse_projection(d)?)),
        ("$limit", n) => match count_operand(n) {
            Some(0) | None => Err(agg_err("$limit requires a positive integer")),
            Some(n) => Ok(Stage::Limit(n.min(MAX_LIMIT))),
        },
        ("$skip", n) => count_operand(n)
            .map(Stage::Skip)
            .ok_or_else(|| agg_err("$skip requires a non-negative integer")),
        ("$count", Bson::String(f)) if !f.is_empty() && !f.starts_with('$') && !f.contains('.') => {
            Ok(Stage::Count(f.clone()))
        }
        ("$count", _) => Err(agg_err("$count requires a plain field name")),
        (other, _) if ["$match", "$group", "$sort", "$project"].contains(&other) => {
            Err(agg_err(format!("{other} requires a document")))
        }
        (other, _) => Err(agg_err(format!("unsupported stage: {other}"))),
    }
}

fn count_operand(v: &Bson) -> Option<usize> {
    match v {
        Bson::Int32(i) => usize::try_from(*i).ok(),
        Bson::Int64(i) => usize::try_from(*i).ok(),
        Bson::Double(f) => crate::utils::num::whole_count(*f),
        _ => None,
    }
}

fn parse_group(d: &BsonDocument) -> Result<GroupSpec, RunnerError> {
    let id = d.get("_id").ok_or_else(|| agg_err("$group requires an _id expression"))?;
    let id = Expr::parse(id)?;
    let mut accumulators = Vec::new();
    for (field, spec) in d.iter().filter(|(k, _)| k.as_str() != "_id") {
        if field.contains('.') {
            return Err(agg_err(format!("group field name cannot contain '.': {field}")));
        }
        let Bson::Document(spec) = spec else {
            return Err(agg_err(format!("group field {field} must be an accumulator document")));
        };
        let mut it = spec.iter();
        let (Some((op, arg)), None) = (it.next(), it.next()) else {
            return Err(agg_err(format!("group field {field} must use exactly one accumulator")));
        };
        let op = match op.as_str() {
            "$sum" => AccOp::Sum,
            "$avg" => AccOp::Avg,
            "$min" => AccOp::Min,
            "$max" => AccOp::Max,
            "$first" => AccOp::First,
            "$last" => AccOp::Last,
            other => return Err(agg_err(format!("unknown group accumulator: {other}"))),
        };
        accumulators.push(Accumulator { field: field.clone(), op, expr: Expr::parse(arg)? });
    }
    Ok(GroupSpec { id, accumulators })
}

#[derive(Debug, Clone)]
enum AccState {
    Sum { int: i64, float: f64, is_float: bool, wide: bool },
    Avg { total: f64, n: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    First(Option<Option<Bson>>),
    Last(Option<Bson>),
}

impl AccState {
    fn new(op: AccOp) -> Self {
        match op {
            AccOp::Sum => Self::Sum { int: 0, float: 0.0, is_float: false, wide: false },
            AccOp::Avg => Self::Avg { total: 0.0, n: 0 },
            AccOp::Min => Self::Min(None),
            AccOp::Max => Self::Max(None),
            AccOp::First => Self::First(None),
            AccOp::Last => Self::Last(None),
        }
    }

    fn feed(&mut self, v: Option<Bson>) {
        match self {
            Self::Sum { int, float, is_float, wide } => match v {
                Some(Bson::Int32(i)) => add_int(int, float, is_float, i64::from(i)),
                Some(Bson::Int64(i)) => {
                    *wide = true;
                    add_int(int, float, is_float, i);
                }
                // non-numeric values are ignored by $sum
                Some(other) => {
                    if let Some(f) = to_f64(&other) {
                        *is_float = true;
                        *float += f;
                    }
                }
                None => {}
            },
            Self::Avg { total, n } => {
                if let Some(f) = v.as_ref().and_then(to_f64) {
                    *total += f;
                    *n += 1;
                }
            }
            Self::Min(cur) => keep_extreme(cur, v, std::cmp::Ordering::Less),
            Self::Max(cur) => keep_extreme(cur, v, std::cmp::Ordering::Greater),
            Self::First(cur) => {
                if cur.is_none() {
                    *cur = Some(v);
                }
            }
            Self::Last(cur) => *cur = v,
        }
    }

    fn finish(self) -> Bson {
        match self {
            Self::Sum { int, float, is_float, wide } => {
                if is_float {
                    #[allow(clippy::cast_precision_loss)]
                    let total = float + int as f64;
                    Bson::Double(total)
                } else if !wide && let Ok(i) = i32::try_from(int) {
                    Bson::Int32(i)
                } else {
                    Bson::Int64(int)
                }
            }
            Self::Avg { total, n } => {
                if n == 0 {
                    Bson::Null
                } else {
                    #[allow(clippy::cast_precision_loss)]
                    let mean = total / n as f64;
                    Bson::Double(mean)
                }
            }
            Self::Min(v) | Self::Max(v) | Self::Last(v) => v.unwrap_or(Bson::Null),
            Self::First(v) => v.flatten().unwrap_or(Bson::Null),
        }
    }
}

fn add_int(int: &mut i64, float: &mut f64, is_float: &mut bool, by: i64) {
    match int.checked_add(by) {
        Some(n) => *int = n,
        None => {
            #[allow(clippy::cast_precision_loss)]
            let spill = by as f64;
            *is_float = true;
            *float += spill;
        }
    }
}

fn keep_extreme(cur: &mut Option<Bson>, v: Option<Bson>, want: std::cmp::Ordering) {
    let Some(v) = v else { return };
    if matches!(v, Bson::Null | Bson::Undefined) {
        return;
    }
    match cur {
        Some(c) if compare_bson(&v, c) != want => {}
        _ => *cur = Some(v),
    }
}

fn group_key_eq(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|((ka, va), (kb, vb))| ka == kb && group_key_eq(va, vb))
        }
        _ => values_equal(a, b),
    }
}

fn run_group(docs: Vec<BsonDocument>, spec: &GroupSpec) -> Vec<BsonDocument> {
    let mut groups: Vec<(Bson, Vec<AccState>)> = Vec::new();
    for doc in &docs {
        // a missing group key groups under null
        let key = spec.id.eval(doc).unwrap_or(Bson::Null);
        let slot = match groups.iter().position(|(k, _)| group_key_eq(k, &key)) {
            Some(i) => i,
            None => {
                groups.push((key, spec.accumulators.iter().map(|a| AccState::new(a.op)).collect()));
                groups.len() - 1
            }
        };
        for (state, acc) in groups[slot].1.iter_mut().zip(&spec.accumulators) {
            state.feed(acc.expr.eval(doc));
        }
    }
    groups
        .into_iter()
        .map(|(key, states)| {
            let mut out = BsonDocument::new();
            out.insert("_id", key);
            for (state, acc) in states.into_iter().zip(&spec.accumulators) {
                out.insert(acc.field.clone(), state.finish());
            }
            out
        })
        .collect()
}

/// Runs parsed stages over `docs` in order.
#[must_use]
pub fn run_pipeline(mut docs: Vec<BsonDocument>, stages: &[Stage]) -> Vec<BsonDocument> {
    for stage in stages {
        docs = match stage {
            Stage::Match(f) => docs.into_iter().filter(|d| eval_filter(d, f)).collect(),
            Stage::Group(g) => run_group(docs, g),
            Stage::Sort(s) => {
                docs.sort_by(|a, b| compare_docs(a, b, s));
                docs
            }
            Stage::Limit(n) => {
                docs.truncate(*n);
                docs
            }
            Stage::Skip(n) => docs.into_iter().skip(*n).collect(),
            Stage::Project(p) => docs.iter().map(|d| project(d, p)).collect(),
            Stage::Count(field) => {
                if docs.is_empty() {
                    Vec::new()
                } else {
                    let n = i64::try_from(docs.len()).unwrap_or(i64::MAX);
                    let mut out = BsonDocument::new();
                    match i32::try_from(n) {
                        Ok(small) => out.insert(field.clone(), small),
                        Err(_) => out.insert(field.clone(), n),
                    };
                    vec![out]
                }
            }
        };
    }
    docs
}

/// Parses and runs `pipeline` over `docs`.
///
/// # Errors
/// Returns `RunnerError::Aggregation` (or `QueryError` from a `$match`) when the pipeline is malformed.
pub fn aggregate_docs(
    docs: Vec<BsonDocument>,
    pipeline: &[BsonDocument],
) -> Result<Vec<BsonDocument>, RunnerError> {
    let stages = parse_pipeline(pipeline)?;
    let start = std::time::Instant::now();
    let input = docs.len();
    let out = run_pipeline(docs, &stages);
    crate::dev6!(
        "{{\"bench\":\"aggregate\",\"stages\":{},\"input\":{},\"output\":{},\"duration_ms\":{}}}",
        stages.len(),
        input,
        out.len(),
        crate::utils::num::elapsed_ms(start)
    );
    Ok(out)
}
