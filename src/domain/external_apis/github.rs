use crate::domain::errors::Result;
use crate::domain::models::artifact::RunArtifact;
use crate::domain::models::run::WorkflowRun;
use async_trait::async_trait;

#[async_trait]
pub trait GitHubApi {
    /// Lists recent workflow runs for a repository, newest first.
    ///
    /// `workflow` restricts the listing to one workflow, identified by file
    /// name (`ci.yml`) or numeric id. `limit` caps how many runs are fetched.
    async fn fetch_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow: Option<&str>,
        limit: u8,
    ) -> Result<Vec<WorkflowRun>>;

    /// Lists the artifacts attached to one run.
    async fn fetch_run_artifacts(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> Result<Vec<RunArtifact>>;

    /// Downloads one artifact as a zip archive.
    async fn download_artifact(&self, owner: &str, repo: &str, artifact_id: u64) -> Result<Vec<u8>>;
}
