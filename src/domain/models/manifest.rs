use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::run::WorkflowRun;
use super::target::Target;

/// Outcome of one repository in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    /// Every artifact of the selected run landed on disk
    Collected,
    /// Some artifacts landed, some failed
    Partial,
    /// A run was selected but no artifact could be downloaded
    Failed,
    /// Nothing was attempted, see `reason`
    Skipped,
}

/// An artifact that landed on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedArtifact {
    pub name: String,
    #[serde(rename = "sizeInBytes")]
    pub size_in_bytes: u64,
    /// Directory the artifact was unpacked into, relative to the output root
    pub path: String,
    /// Files inside `path`, sorted, relative to it
    pub files: Vec<String>,
}

/// An artifact that could not be collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedArtifact {
    pub name: String,
    pub error: String,
}

/// One repository's outcome.
///
/// Entries appear in the manifest in repository-list order regardless of
/// which finished first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Repository in `owner/name` form
    pub repo: String,
    pub status: CollectionStatus,
    /// Why the repository was skipped, `None` otherwise
    pub reason: Option<String>,
    /// The selected run, `None` when no run was resolved
    pub run: Option<WorkflowRun>,
    pub artifacts: Vec<CollectedArtifact>,
    #[serde(rename = "failedArtifacts")]
    pub failed_artifacts: Vec<FailedArtifact>,
    #[serde(rename = "collectedAt")]
    pub collected_at: DateTime<Utc>,
}

impl ManifestEntry {
    /// Entry for a repository that was skipped before any download.
    ///
    /// `run` is present when a run was resolved but had nothing to collect.
    pub fn skipped(target: &Target, reason: impl Into<String>, run: Option<WorkflowRun>) -> Self {
        Self {
            repo: target.full_name(),
            status: CollectionStatus::Skipped,
            reason: Some(reason.into()),
            run,
            artifacts: Vec::new(),
            failed_artifacts: Vec::new(),
            collected_at: Utc::now(),
        }
    }

    /// Entry for a repository whose artifacts were attempted.
    pub fn from_downloads(
        target: &Target,
        run: WorkflowRun,
        artifacts: Vec<CollectedArtifact>,
        failed_artifacts: Vec<FailedArtifact>,
    ) -> Self {
        let status = Self::status_for(&artifacts, &failed_artifacts);
        Self {
            repo: target.full_name(),
            status,
            reason: None,
            run: Some(run),
            artifacts,
            failed_artifacts,
            collected_at: Utc::now(),
        }
    }

    /// Moves a collected artifact into the failed list and recomputes status.
    ///
    /// Used when an artifact recorded as collected turns out to be missing or
    /// empty at manifest-write time. Unknown names are ignored.
    pub fn record_artifact_loss(&mut self, name: &str, error: impl Into<String>) {
        let Some(position) = self.artifacts.iter().position(|a| a.name == name) else {
            return;
        };
        let lost = self.artifacts.remove(position);
        self.failed_artifacts.push(FailedArtifact {
            name: lost.name,
            error: error.into(),
        });
        self.status = Self::status_for(&self.artifacts, &self.failed_artifacts);
    }

    fn status_for(artifacts: &[CollectedArtifact], failed: &[FailedArtifact]) -> CollectionStatus {
        if artifacts.is_empty() {
            CollectionStatus::Failed
        } else if failed.is_empty() {
            CollectionStatus::Collected
        } else {
            CollectionStatus::Partial
        }
    }
}

/// The JSON document describing everything one invocation collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "finishedAt")]
    pub finished_at: DateTime<Utc>,
    /// Path of the repository list this invocation read
    #[serde(rename = "reposFile")]
    pub repos_file: String,
    #[serde(rename = "workflowFilter")]
    pub workflow_filter: Option<String>,
    pub entries: Vec<ManifestEntry>,
}
