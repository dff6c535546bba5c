use crate::domain::errors::{CollectError, Result};
use crate::domain::external_apis::github::GitHubApi;
use crate::domain::models::artifact::RunArtifact;
use crate::domain::models::run::WorkflowRun;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// APIリクエスト1回あたりのタイムアウト(接続と転送を含む)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// アーティファクト一覧の1ページあたりの取得件数
const ARTIFACT_PAGE_SIZE: u8 = 100;

/// Error bodies are clipped to this many characters before they reach logs
/// or the manifest.
const MAX_ERROR_BODY: usize = 500;

#[derive(Deserialize, Debug, Clone)]
struct GitHubWorkflowRunResponse {
    id: u64,
    name: Option<String>, // workflow name
    display_title: Option<String>,
    status: String,
    conclusion: Option<String>, // Refer to this when status is "completed"
    created_at: String,         // ISO 8601 format, parse during domain model conversion
    html_url: Option<String>,
}

// The response from the GitHub API's /actions/runs endpoint is
// wrapped in an object with the workflow_runs array as a key,
// so define a wrapper structure for it.
#[derive(Deserialize, Debug)]
struct GitHubWorkflowRunsApiResponse {
    workflow_runs: Vec<GitHubWorkflowRunResponse>,
}

#[derive(Deserialize, Debug, Clone)]
struct GitHubArtifactResponse {
    id: u64,
    name: String,
    size_in_bytes: u64,
    expired: bool,
}

// The /actions/runs/{run_id}/artifacts endpoint wraps its array the same way.
#[derive(Deserialize, Debug)]
struct GitHubArtifactsApiResponse {
    artifacts: Vec<GitHubArtifactResponse>,
}

impl GitHubWorkflowRunResponse {
    fn into_domain(self) -> Result<WorkflowRun> {
        // Parse ISO 8601 string to DateTime<Utc>
        let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| {
                CollectError::Parse(format!("created_at for run {}: {e}", self.id))
            })?
            .with_timezone(&chrono::Utc);

        Ok(WorkflowRun {
            id: self.id,
            status: self.status,
            conclusion: self.conclusion,
            created_at,
            workflow_name: self.name,
            display_title: self.display_title,
            html_url: self.html_url,
        })
    }
}

impl From<GitHubArtifactResponse> for RunArtifact {
    fn from(artifact_res: GitHubArtifactResponse) -> Self {
        Self {
            id: artifact_res.id,
            name: artifact_res.name,
            size_in_bytes: artifact_res.size_in_bytes,
            expired: artifact_res.expired,
        }
    }
}

fn runs_url(base_url: &str, owner: &str, repo: &str, workflow: Option<&str>, limit: u8) -> String {
    match workflow {
        Some(workflow) => format!(
            "{base_url}/repos/{owner}/{repo}/actions/workflows/{workflow}/runs?per_page={limit}"
        ),
        None => format!("{base_url}/repos/{owner}/{repo}/actions/runs?per_page={limit}"),
    }
}

fn artifacts_url(base_url: &str, owner: &str, repo: &str, run_id: u64) -> String {
    format!(
        "{base_url}/repos/{owner}/{repo}/actions/runs/{run_id}/artifacts?per_page={ARTIFACT_PAGE_SIZE}"
    )
}

fn artifact_zip_url(base_url: &str, owner: &str, repo: &str, artifact_id: u64) -> String {
    format!("{base_url}/repos/{owner}/{repo}/actions/artifacts/{artifact_id}/zip")
}

fn clip(message: &str) -> String {
    message.chars().take(MAX_ERROR_BODY).collect()
}

fn status_error(repo: &str, status: StatusCode, message: &str) -> CollectError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            CollectError::access(repo, format!("{status}: {}", clip(message)))
        }
        _ => CollectError::api_error(status.as_u16(), clip(message)),
    }
}

pub struct GitHubApiAdapter {
    client: Client,
    base_url: String,
    github_token: String,
}

impl GitHubApiAdapter {
    pub fn new(base_url: String, github_token: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            github_token,
        }
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.github_token))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "gha-collector-rust-app")
    }

    async fn check_status(repo: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(repo, status, &body))
    }
}

#[async_trait]
impl GitHubApi for GitHubApiAdapter {
    #[tracing::instrument(name = "GitHubApiAdapter::fetch_workflow_runs", skip(self))]
    async fn fetch_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow: Option<&str>,
        limit: u8,
    ) -> Result<Vec<WorkflowRun>> {
        let full_name = format!("{owner}/{repo}");
        let url = runs_url(&self.base_url, owner, repo, workflow, limit);

        let response = self.get(&url).send().await?;
        let response = Self::check_status(&full_name, response).await?;
        let api_response: GitHubWorkflowRunsApiResponse = response.json().await.map_err(|e| {
            CollectError::Parse(format!("workflow runs for {full_name}: {e}"))
        })?;

        let workflow_runs = api_response
            .workflow_runs
            .into_iter()
            .map(GitHubWorkflowRunResponse::into_domain)
            .collect::<Result<Vec<WorkflowRun>>>()?; // Early return if an error occurs

        Ok(workflow_runs)
    }

    #[tracing::instrument(name = "GitHubApiAdapter::fetch_run_artifacts", skip(self))]
    async fn fetch_run_artifacts(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> Result<Vec<RunArtifact>> {
        let full_name = format!("{owner}/{repo}");
        let url = artifacts_url(&self.base_url, owner, repo, run_id);

        let response = self.get(&url).send().await?;
        let response = Self::check_status(&full_name, response).await?;
        let api_response: GitHubArtifactsApiResponse = response.json().await.map_err(|e| {
            CollectError::Parse(format!("artifacts of run {run_id} for {full_name}: {e}"))
        })?;

        Ok(api_response
            .artifacts
            .into_iter()
            .map(RunArtifact::from)
            .collect())
    }

    #[tracing::instrument(name = "GitHubApiAdapter::download_artifact", skip(self))]
    async fn download_artifact(
        &self,
        owner: &str,
        repo: &str,
        artifact_id: u64,
    ) -> Result<Vec<u8>> {
        let full_name = format!("{owner}/{repo}");
        let url = artifact_zip_url(&self.base_url, owner, repo, artifact_id);

        // The API answers 302 to short-lived blob storage; reqwest follows the
        // redirect and drops the Authorization header on the cross-origin hop.
        let response = self.get(&url).send().await?;
        let response = Self::check_status(&full_name, response).await?;
        let bytes = response.bytes().await?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://api.github.com";

    #[test]
    fn runs_url_lists_all_workflows_by_default() {
        assert_eq!(
            runs_url(BASE, "acme", "api", None, 30),
            "https://api.github.com/repos/acme/api/actions/runs?per_page=30"
        );
    }

    #[test]
    fn runs_url_scopes_to_a_workflow_when_filtered() {
        assert_eq!(
            runs_url(BASE, "acme", "api", Some("ci.yml"), 5),
            "https://api.github.com/repos/acme/api/actions/workflows/ci.yml/runs?per_page=5"
        );
    }

    #[test]
    fn artifact_urls_follow_the_actions_api_shape() {
        assert_eq!(
            artifacts_url(BASE, "acme", "api", 42),
            "https://api.github.com/repos/acme/api/actions/runs/42/artifacts?per_page=100"
        );
        assert_eq!(
            artifact_zip_url(BASE, "acme", "api", 99),
            "https://api.github.com/repos/acme/api/actions/artifacts/99/zip"
        );
    }

    #[test]
    fn deserializes_a_run_listing_and_converts_it() -> anyhow::Result<()> {
        let body = r#"{
            "total_count": 1,
            "workflow_runs": [
                {
                    "id": 7,
                    "name": "CI",
                    "display_title": "Nightly build",
                    "status": "completed",
                    "conclusion": "success",
                    "created_at": "2026-08-20T12:00:00Z",
                    "html_url": "https://github.com/acme/api/actions/runs/7",
                    "run_number": 12,
                    "event": "push"
                }
            ]
        }"#;
        let api_response: GitHubWorkflowRunsApiResponse = serde_json::from_str(body)?;
        assert_eq!(api_response.workflow_runs.len(), 1);

        let run = api_response.workflow_runs[0].clone().into_domain()?;
        assert_eq!(run.id, 7);
        assert!(run.is_successful());
        assert_eq!(run.workflow_name.as_deref(), Some("CI"));
        assert_eq!(run.created_at.to_rfc3339(), "2026-08-20T12:00:00+00:00");
        Ok(())
    }

    #[test]
    fn rejects_an_unparseable_timestamp() {
        let run_res = GitHubWorkflowRunResponse {
            id: 7,
            name: None,
            display_title: None,
            status: "completed".to_string(),
            conclusion: Some("success".to_string()),
            created_at: "yesterday".to_string(),
            html_url: None,
        };
        assert!(matches!(
            run_res.into_domain(),
            Err(CollectError::Parse(_))
        ));
    }

    #[test]
    fn deserializes_an_artifact_listing() -> anyhow::Result<()> {
        let body = r#"{
            "total_count": 2,
            "artifacts": [
                {"id": 1, "name": "coverage.json", "size_in_bytes": 2048, "expired": false},
                {"id": 2, "name": "junit", "size_in_bytes": 512, "expired": true}
            ]
        }"#;
        let api_response: GitHubArtifactsApiResponse = serde_json::from_str(body)?;
        let artifacts: Vec<RunArtifact> = api_response
            .artifacts
            .into_iter()
            .map(RunArtifact::from)
            .collect();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].name, "coverage.json");
        assert!(!artifacts[0].expired);
        assert!(artifacts[1].expired);
        Ok(())
    }

    #[test]
    fn auth_and_missing_statuses_classify_as_access_errors() {
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
        ] {
            let error = status_error("acme/api", status, "denied");
            assert!(
                matches!(error, CollectError::Access { .. }),
                "{status} should map to an access error"
            );
        }
    }

    #[test]
    fn other_error_statuses_stay_api_errors() {
        let error = status_error("acme/api", StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(error, CollectError::Api { status: 500, .. }));
    }

    #[test]
    fn long_error_bodies_are_clipped() {
        let body = "x".repeat(10_000);
        let error = status_error("acme/api", StatusCode::INTERNAL_SERVER_ERROR, &body);
        if let CollectError::Api { message, .. } = error {
            assert_eq!(message.len(), MAX_ERROR_BODY);
        } else {
            panic!("expected an API error");
        }
    }
}
