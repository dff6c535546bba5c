use crate::application::use_cases::collect_reports::{
    CollectReportsInteractor, CollectReportsUseCase, CollectReportsUseCaseInput,
    CollectReportsUseCaseOutput, DEFAULT_CONCURRENCY, DEFAULT_RUN_LIMIT,
};
use crate::domain::errors::CollectError;
use crate::domain::models::manifest::CollectionStatus;
use crate::domain::models::target::Target;
use crate::infrastructures::adapters::secondary::external_apis::github::GitHubApiAdapter;
use crate::infrastructures::adapters::secondary::storage::local::LocalReportStore;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Collects the latest workflow artifacts from a list of GitHub repositories.
#[derive(Parser, Debug)]
#[command(name = "gha-collector", version, about)]
pub struct Cli {
    /// Repository list file, one owner/name per line
    #[arg(long, value_name = "FILE")]
    pub repos_file: PathBuf,

    /// Directory the collected tree is written into
    #[arg(long, default_value = "_collected_reports", value_name = "DIR")]
    pub outdir: PathBuf,

    /// Only consider runs of this workflow, by file name (ci.yml) or id
    #[arg(long, value_name = "WORKFLOW")]
    pub workflow: Option<String>,

    /// Bundle the collected tree into a timestamped zip next to the outdir
    #[arg(long)]
    pub make_zip: bool,

    /// How many recent runs to inspect per repository
    #[arg(
        long,
        default_value_t = DEFAULT_RUN_LIMIT,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub limit: u8,

    /// How many repositories to process in parallel
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Personal access token used for the API and artifact downloads
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub github_token: String,

    /// Base URL of the GitHub REST API
    #[arg(
        long,
        env = "GITHUB_API_URL",
        default_value = "https://api.github.com",
        value_name = "URL"
    )]
    pub github_api_url: String,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let source = fs::read_to_string(&cli.repos_file).map_err(|e| {
        CollectError::config(format!(
            "cannot read repository list {}: {e}",
            cli.repos_file.display()
        ))
    })?;
    let targets = Target::parse_list(&source)?;
    if targets.is_empty() {
        tracing::warn!("Repository list {} has no entries", cli.repos_file.display());
    }
    tracing::info!(
        "Loaded {} repositories from {}",
        targets.len(),
        cli.repos_file.display()
    );

    let github_api = Arc::new(GitHubApiAdapter::new(
        cli.github_api_url.clone(),
        cli.github_token.clone(),
    ));
    let store = Arc::new(LocalReportStore::new(cli.outdir.clone())?);
    let use_case = CollectReportsInteractor::new(github_api, store);

    let output = use_case
        .execute(CollectReportsUseCaseInput {
            targets,
            repos_file: cli.repos_file.display().to_string(),
            workflow_filter: cli.workflow.clone(),
            limit: cli.limit,
            concurrency: cli.concurrency,
            make_zip: cli.make_zip,
        })
        .await?;

    summarize(&output);
    Ok(())
}

/// One line per repository, plus where the manifest and bundle landed.
fn summarize(output: &CollectReportsUseCaseOutput) {
    for entry in &output.manifest.entries {
        match entry.status {
            CollectionStatus::Collected => {
                tracing::info!("{}: collected {} artifact(s)", entry.repo, entry.artifacts.len());
            }
            CollectionStatus::Partial => {
                tracing::warn!(
                    "{}: collected {} artifact(s), {} failed",
                    entry.repo,
                    entry.artifacts.len(),
                    entry.failed_artifacts.len()
                );
            }
            CollectionStatus::Failed => {
                tracing::warn!(
                    "{}: all {} artifact(s) failed",
                    entry.repo,
                    entry.failed_artifacts.len()
                );
            }
            CollectionStatus::Skipped => {
                tracing::info!(
                    "{}: skipped ({})",
                    entry.repo,
                    entry.reason.as_deref().unwrap_or("no reason recorded")
                );
            }
        }
    }
    tracing::info!("Manifest written to {}", output.manifest_path.display());
    if let Some(path) = &output.archive_path {
        tracing::info!("Bundle written to {}", path.display());
    }
    if let Some(error) = &output.archive_error {
        tracing::warn!("Bundle was not created: {}", error);
    }
}
