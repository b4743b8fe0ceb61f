use crate::query::Verbosity;
use crate::runner::{OutputMode, RunReport, StepStatus};

/// clap value parser for `--format`.
pub fn parse_output_mode(s: &str) -> Result<OutputMode, String> {
    s.parse()
}

/// clap value parser for `--verbosity`.
pub fn parse_verbosity(s: &str) -> Result<Verbosity, String> {
    s.parse::<Verbosity>().map_err(|e| e.to_string())
}

/// One-line summary of a run for the log file.
#[must_use]
pub fn summarize(report: &RunReport) -> String {
    let completed = report.count(&StepStatus::Completed);
    let skipped = report.count(&StepStatus::Skipped);
    let writes = report.writes_applied();
    match report.failure() {
        Some((step, msg)) => format!(
            "{}: {completed} completed ({writes} writes), failed at {step} ({msg}), {skipped} skipped",
            report.namespace
        ),
        None => format!("{}: {completed} completed ({writes} writes)", report.namespace),
    }
}
