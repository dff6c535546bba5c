use crate::domain::errors::Result;
use crate::domain::models::manifest::{CollectedArtifact, Manifest};
use crate::domain::models::run::WorkflowRun;
use crate::domain::models::target::Target;
use std::path::PathBuf;

/// Where a stored artifact landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Directory the artifact was unpacked into, relative to the output root
    pub path: String,
    /// Files inside `path`, sorted, relative to it
    pub files: Vec<String>,
}

pub trait ReportStore {
    /// Unpacks one artifact archive under
    /// `<owner>__<name>/run_<id>/artifacts/<artifact>`.
    ///
    /// All-or-nothing: on error nothing of this artifact remains on disk,
    /// and artifacts already stored are untouched.
    fn store_artifact(
        &self,
        target: &Target,
        run_id: u64,
        name: &str,
        archive: &[u8],
    ) -> Result<StoredArtifact>;

    /// Writes the selected run's metadata next to its artifacts.
    fn write_run_meta(&self, target: &Target, run_id: u64, run: &WorkflowRun) -> Result<()>;

    /// True if every file the record references still exists and is non-empty.
    fn artifact_is_intact(&self, artifact: &CollectedArtifact) -> bool;

    /// Writes the manifest at the output root, returning its path.
    fn write_manifest(&self, manifest: &Manifest) -> Result<PathBuf>;

    /// Bundles the whole output tree into a zip next to the output root.
    ///
    /// The collected files themselves are never modified; a failed bundle is
    /// removed.
    fn archive_collection(&self, bundle_name: &str) -> Result<PathBuf>;
}
