use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one workflow run, as reported by the Actions API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub status: String,
    pub conclusion: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "workflowName")]
    pub workflow_name: Option<String>,
    #[serde(rename = "displayTitle")]
    pub display_title: Option<String>,
    #[serde(rename = "htmlUrl")]
    pub html_url: Option<String>,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    pub fn is_successful(&self) -> bool {
        self.is_completed()
            && self
                .conclusion
                .as_deref()
                .is_some_and(|conclusion| conclusion.eq_ignore_ascii_case("success"))
    }
}

/// Picks the run to collect from.
///
/// Prefers the newest completed successful run, then the newest completed
/// run of any conclusion, then the newest run overall. Returns `None` for an
/// empty slice. Recency is decided by `created_at`, not response order.
pub fn select_preferred_run(runs: &[WorkflowRun]) -> Option<&WorkflowRun> {
    runs.iter()
        .filter(|run| run.is_successful())
        .max_by_key(|run| run.created_at)
        .or_else(|| {
            runs.iter()
                .filter(|run| run.is_completed())
                .max_by_key(|run| run.created_at)
        })
        .or_else(|| runs.iter().max_by_key(|run| run.created_at))
}
