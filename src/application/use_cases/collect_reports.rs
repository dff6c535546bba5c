use crate::domain::errors::{CollectError, Result};
use crate::domain::external_apis::github::GitHubApi;
use crate::domain::models::artifact::RunArtifact;
use crate::domain::models::manifest::{CollectedArtifact, FailedArtifact, Manifest, ManifestEntry};
use crate::domain::models::run::{WorkflowRun, select_preferred_run};
use crate::domain::models::target::Target;
use crate::domain::storage::report_store::{ReportStore, StoredArtifact};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::{StreamExt, stream};
use std::path::PathBuf;
use std::sync::Arc;

/// 1リポジトリあたりに調べるワークフローランの最大数
pub const DEFAULT_RUN_LIMIT: u8 = 30;

/// 同時に処理するリポジトリ数
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct CollectReportsUseCaseInput {
    pub targets: Vec<Target>,
    /// Path of the repository list, recorded in the manifest
    pub repos_file: String,
    pub workflow_filter: Option<String>,
    pub limit: u8,
    pub concurrency: usize,
    pub make_zip: bool,
}

#[derive(Debug)]
pub struct CollectReportsUseCaseOutput {
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
    /// Present when a bundle was requested and written
    pub archive_path: Option<PathBuf>,
    /// Present when a bundle was requested but failed
    pub archive_error: Option<String>,
}

#[async_trait]
pub trait CollectReportsUseCase {
    async fn execute(
        &self,
        input: CollectReportsUseCaseInput,
    ) -> Result<CollectReportsUseCaseOutput>;
}

/// Maps a per-repository error to the reason recorded in its manifest entry.
fn skip_reason(error: &CollectError) -> String {
    match error {
        CollectError::NotFound { message, .. } => message.clone(),
        CollectError::Access { message, .. } => format!("access denied: {message}"),
        other => other.to_string(),
    }
}

pub struct CollectReportsInteractor<
    G: GitHubApi + Send + Sync + 'static,
    S: ReportStore + Send + Sync + 'static,
> {
    github_api: Arc<G>,
    store: Arc<S>,
}

impl<G: GitHubApi + Send + Sync + 'static, S: ReportStore + Send + Sync + 'static>
    CollectReportsInteractor<G, S>
{
    pub fn new(github_api: Arc<G>, store: Arc<S>) -> Self {
        Self { github_api, store }
    }

    /// Collects one repository. Never fails the run: every outcome becomes a
    /// manifest entry.
    async fn collect_target(
        &self,
        target: &Target,
        workflow: Option<&str>,
        limit: u8,
    ) -> ManifestEntry {
        tracing::info!("Collecting {}", target);

        let run = match self.resolve_run(target, workflow, limit).await {
            Ok(run) => run,
            Err(e) => {
                let reason = skip_reason(&e);
                tracing::warn!("Skipping {}: {}", target, reason);
                return ManifestEntry::skipped(target, reason, None);
            }
        };
        tracing::debug!("Selected run {} for {} ({})", run.id, target, run.status);

        let artifacts = match self.list_artifacts(target, run.id).await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                let reason = skip_reason(&e);
                tracing::warn!("Skipping {} run {}: {}", target, run.id, reason);
                return ManifestEntry::skipped(target, reason, Some(run));
            }
        };

        // Metadata is advisory, a failed write must not block the downloads.
        if let Err(e) = self.store.write_run_meta(target, run.id, &run) {
            tracing::warn!("Writing run metadata for {} failed: {}", target, e);
        }

        let mut collected = Vec::new();
        let mut failed = Vec::new();
        for artifact in &artifacts {
            match self.fetch_artifact(target, run.id, artifact).await {
                Ok(stored) => {
                    tracing::debug!("Stored {} for {}", artifact.name, target);
                    collected.push(CollectedArtifact {
                        name: artifact.name.clone(),
                        size_in_bytes: artifact.size_in_bytes,
                        path: stored.path,
                        files: stored.files,
                    });
                }
                Err(e) => {
                    tracing::warn!("Artifact {} of {} failed: {}", artifact.name, target, e);
                    failed.push(FailedArtifact {
                        name: artifact.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Collected {}/{} artifacts for {}",
            collected.len(),
            artifacts.len(),
            target
        );
        ManifestEntry::from_downloads(target, run, collected, failed)
    }

    /// Resolves the run to collect from, or a `NotFound` error when the
    /// repository has no runs.
    async fn resolve_run(
        &self,
        target: &Target,
        workflow: Option<&str>,
        limit: u8,
    ) -> Result<WorkflowRun> {
        let runs = self
            .github_api
            .fetch_workflow_runs(&target.owner, &target.repo, workflow, limit)
            .await?;
        select_preferred_run(&runs)
            .cloned()
            .ok_or_else(|| CollectError::not_found(target.full_name(), "no runs found"))
    }

    /// Lists the selected run's artifacts, or a `NotFound` error when it has
    /// none.
    async fn list_artifacts(&self, target: &Target, run_id: u64) -> Result<Vec<RunArtifact>> {
        let artifacts = self
            .github_api
            .fetch_run_artifacts(&target.owner, &target.repo, run_id)
            .await?;
        if artifacts.is_empty() {
            return Err(CollectError::not_found(
                target.full_name(),
                "no artifacts found",
            ));
        }
        Ok(artifacts)
    }

    async fn fetch_artifact(
        &self,
        target: &Target,
        run_id: u64,
        artifact: &RunArtifact,
    ) -> Result<StoredArtifact> {
        if artifact.expired {
            return Err(CollectError::download(
                target.full_name(),
                &artifact.name,
                "artifact expired",
            ));
        }
        let archive = self
            .github_api
            .download_artifact(&target.owner, &target.repo, artifact.id)
            .await?;
        self.store
            .store_artifact(target, run_id, &artifact.name, &archive)
    }
}

#[async_trait]
impl<G: GitHubApi + Send + Sync + 'static, S: ReportStore + Send + Sync + 'static>
    CollectReportsUseCase for CollectReportsInteractor<G, S>
{
    async fn execute(
        &self,
        input: CollectReportsUseCaseInput,
    ) -> Result<CollectReportsUseCaseOutput> {
        let started_at = Utc::now();
        tracing::info!("Collecting reports from {} repositories", input.targets.len());

        let concurrency = input.concurrency.max(1);
        let mut entries: Vec<ManifestEntry> = stream::iter(&input.targets)
            .map(|target| {
                self.collect_target(target, input.workflow_filter.as_deref(), input.limit)
            })
            .buffered(concurrency)
            .collect()
            .await;

        // Re-check collected files just before the manifest is written;
        // anything missing or empty on disk is demoted to a failed artifact.
        for entry in &mut entries {
            let lost: Vec<String> = entry
                .artifacts
                .iter()
                .filter(|artifact| !self.store.artifact_is_intact(artifact))
                .map(|artifact| artifact.name.clone())
                .collect();
            for name in lost {
                tracing::warn!(
                    "Artifact {} of {} vanished before the manifest",
                    name,
                    entry.repo
                );
                entry.record_artifact_loss(&name, "missing or empty on disk");
            }
        }

        let manifest = Manifest {
            started_at,
            finished_at: Utc::now(),
            repos_file: input.repos_file,
            workflow_filter: input.workflow_filter,
            entries,
        };
        let manifest_path = self.store.write_manifest(&manifest)?;
        tracing::info!("Wrote manifest to {}", manifest_path.display());

        let (archive_path, archive_error) = if input.make_zip {
            let bundle_name =
                format!("all_reports_bundle_{}.zip", Utc::now().format("%Y%m%d_%H%M%S"));
            match self.store.archive_collection(&bundle_name) {
                Ok(path) => {
                    tracing::info!("Bundled the collection into {}", path.display());
                    (Some(path), None)
                }
                Err(e) => {
                    tracing::error!("Bundling the collection failed: {}", e);
                    (None, Some(e.to_string()))
                }
            }
        } else {
            (None, None)
        };

        Ok(CollectReportsUseCaseOutput {
            manifest,
            manifest_path,
            archive_path,
            archive_error,
        })
    }
}
