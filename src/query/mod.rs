// Submodules for separation of concerns
mod aggregate;
mod cursor;
mod eval;
mod exec;
mod explain;
mod parse;
mod types;

pub use aggregate::{AccOp, Accumulator, Expr, GroupSpec, Stage, aggregate_docs, parse_pipeline, run_pipeline};
pub use cursor::Cursor;
pub use eval::{compare_bson, compare_docs, eval_filter, project, values_equal};
pub(crate) use eval::{get_path, to_f64};
pub use exec::{ExecStats, IndexUse, apply_update, count_docs, delete_one, find_docs, update_one};
pub use explain::{Verbosity, explain_find, filter_to_doc};
pub use parse::{
    parse_filter, parse_filter_json, parse_projection, parse_sort, parse_update, parse_update_json,
};
pub use types::{
    CmpOp, DeleteReport, Filter, FindOptions, Order, Projection, SortSpec, UpdateDoc, UpdateReport,
};
