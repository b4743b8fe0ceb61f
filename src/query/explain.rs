use crate::collection::Collection;
use crate::errors::RunnerError;
use bson::{Bson, Document as BsonDocument, doc};
use std::str::FromStr;

use super::exec::{ExecStats, run_find};
use super::parse::parse_filter;
use super::types::{CmpOp, Filter, FindOptions};

/// How much detail an explain report carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    QueryPlanner,
    #[default]
    ExecutionStats,
    AllPlansExecution,
}

impl Verbosity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueryPlanner => "queryPlanner",
            Self::ExecutionStats => "executionStats",
            Self::AllPlansExecution => "allPlansExecution",
        }
    }
}

impl FromStr for Verbosity {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queryplanner" => Ok(Self::QueryPlanner),
            "executionstats" => Ok(Self::ExecutionStats),
            "allplansexecution" => Ok(Self::AllPlansExecution),
            other => Err(RunnerError::QueryError(format!("unknown explain verbosity: {other}"))),
        }
    }
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn op_name(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "$eq",
        CmpOp::Gt => "$gt",
        CmpOp::Gte => "$gte",
        CmpOp::Lt => "$lt",
        CmpOp::Lte => "$lte",
    }
}

fn field_op(path: &str, op: &str, value: Bson) -> BsonDocument {
    let mut inner = BsonDocument::new();
    inner.insert(op, value);
    let mut out = BsonDocument::new();
    out.insert(path, inner);
    out
}

/// Renders a parsed filter back into the normalized form reported as `parsedQuery`.
#[must_use]
pub fn filter_to_doc(f: &Filter) -> BsonDocument {
    let list = |fs: &[Filter]| Bson::Array(fs.iter().map(|f| Bson::Document(filter_to_doc(f))).collect());
    match f {
        Filter::True => BsonDocument::new(),
        Filter::And(fs) => doc! {"$and": list(fs)},
        Filter::Or(fs) => doc! {"$or": list(fs)},
        Filter::Not(inner) => match inner.as_ref() {
            Filter::Or(fs) => doc! {"$nor": list(fs)},
            other => doc! {"$nor": [filter_to_doc(other)]},
        },
        Filter::Exists { path, exists } => field_op(path, "$exists", Bson::Boolean(*exists)),
        Filter::In { path, values } => field_op(path, "$in", Bson::Array(values.clone())),
        Filter::Nin { path, values } => field_op(path, "$nin", Bson::Array(values.clone())),
        Filter::Cmp { path, op, value } => field_op(path, op_name(*op), value.clone()),
        #[cfg(feature = "regex")]
        Filter::Regex { path, pattern, case_insensitive } => {
            let mut inner = doc! {"$regex": pattern.clone()};
            if *case_insensitive {
                inner.insert("$options", "i");
            }
            let mut out = BsonDocument::new();
            out.insert(path.clone(), inner);
            out
        }
    }
}

fn winning_plan(stats: &ExecStats, parsed: &BsonDocument) -> BsonDocument {
    match &stats.index {
        Some(ix) => doc! {
            "stage": "FETCH",
            "filter": parsed.clone(),
            "inputStage": {
                "stage": "IXSCAN",
                "keyPattern": ix.key_pattern.clone(),
                "indexName": ix.name.clone(),
                "isMultiKey": false,
                "direction": "forward",
            },
        },
        None => doc! {"stage": "COLLSCAN", "filter": parsed.clone(), "direction": "forward"},
    }
}

fn count(n: u64) -> Bson {
    Bson::Int64(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Explains a find on `col` the way the server's `explain` command would answer.
///
/// # Errors
/// Returns `RunnerError::QueryError` when the filter cannot be parsed.
pub fn explain_find(
    col: &Collection,
    database: &str,
    filter_doc: &BsonDocument,
    verbosity: Verbosity,
) -> Result<BsonDocument, RunnerError> {
    let filter = parse_filter(filter_doc)?;
    let parsed = filter_to_doc(&filter);
    let outcome = run_find(col, &filter, &FindOptions::default());
    let stats = &outcome.stats;
    let plan = winning_plan(stats, &parsed);
    let mut out = doc! {
        "explainVersion": "1",
        "queryPlanner": {
            "namespace": crate::types::namespace(database, col.name_str()),
            "parsedQuery": parsed.clone(),
            "indexFilterSet": false,
            "winningPlan": plan.clone(),
            "rejectedPlans": [],
        },
    };
    if verbosity != Verbosity::QueryPlanner {
        let mut exec = doc! {
            "executionSuccess": true,
            "nReturned": count(stats.n_returned),
            "executionTimeMillis": count(stats.elapsed_ms),
            "totalKeysExamined": count(stats.keys_examined),
            "totalDocsExamined": count(stats.docs_examined),
            "executionStages": {
                "stage": plan.get_str("stage").unwrap_or("COLLSCAN"),
                "nReturned": count(stats.n_returned),
                "docsExamined": count(stats.docs_examined),
            },
        };
        if verbosity == Verbosity::AllPlansExecution {
            exec.insert("allPlansExecution", Bson::Array(Vec::new()));
        }
        out.insert("executionStats", exec);
    }
    out.insert("command", doc! {"find": col.name_str(), "filter": filter_doc.clone(), "$db": database});
    out.insert("ok", 1.0);
    log::debug!(
        "explain on {}: {} returned={} docs_examined={}",
        col.name_str(),
        if stats.index.is_some() { "IXSCAN" } else { "COLLSCAN" },
        stats.n_returned,
        stats.docs_examined
    );
    Ok(out)
}
