use super::Step;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: Step,
    #[serde(flatten)]
    pub status: StepStatus,
}

/// What happened during one run, step by step.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub namespace: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), started_at: Utc::now(), finished_at: None, steps: Vec::new() }
    }

    pub fn record(&mut self, step: Step, status: StepStatus) {
        self.steps.push(StepRecord { step, status });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    #[must_use]
    pub fn status_of(&self, step: Step) -> Option<&StepStatus> {
        self.steps.iter().find(|r| r.step == step).map(|r| &r.status)
    }

    /// The first failed step, if any.
    #[must_use]
    pub fn failure(&self) -> Option<(Step, &str)> {
        self.steps.iter().find_map(|r| match &r.status {
            StepStatus::Failed(m) => Some((r.step, m.as_str())),
            _ => None,
        })
    }

    #[must_use]
    pub fn count(&self, status: &StepStatus) -> usize {
        self.steps.iter().filter(|r| &r.status == status).count()
    }

    /// Completed steps that wrote to the collection.
    #[must_use]
    pub fn writes_applied(&self) -> usize {
        self.steps.iter().filter(|r| r.step.mutates() && r.status == StepStatus::Completed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_status_inline() {
        let mut r = RunReport::new("plp_bookstore.books");
        r.record(Step::Connect, StepStatus::Completed);
        r.record(Step::UpdatePrice, StepStatus::Failed("boom".into()));
        r.finish();
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["steps"][0], serde_json::json!({"step": "connect", "status": "completed"}));
        assert_eq!(
            v["steps"][1],
            serde_json::json!({"step": "update_price", "status": "failed", "message": "boom"})
        );
        assert_eq!(r.failure(), Some((Step::UpdatePrice, "boom")));
        assert!(r.finished_at.unwrap() >= r.started_at);
    }

    #[test]
    fn only_completed_writes_are_counted() {
        let mut r = RunReport::new("db.books");
        r.record(Step::PublishedAfter, StepStatus::Completed);
        r.record(Step::UpdatePrice, StepStatus::Completed);
        r.record(Step::DeleteByTitle, StepStatus::Failed("refused".into()));
        r.record(Step::TitleIndex, StepStatus::Skipped);
        assert_eq!(r.writes_applied(), 1);
        assert_eq!(Step::QUERIES.iter().filter(|s| s.mutates()).count(), 4);
        assert!(!Step::Connect.mutates() && !Step::Explain.mutates());
    }
}
