use serde::{Deserialize, Serialize};

/// One downloadable artifact attached to a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunArtifact {
    pub id: u64,
    pub name: String,
    #[serde(rename = "sizeInBytes")]
    pub size_in_bytes: u64,
    /// Expired artifacts are listed by the API but no longer downloadable
    pub expired: bool,
}
