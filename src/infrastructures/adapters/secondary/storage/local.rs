use crate::domain::errors::{CollectError, Result};
use crate::domain::models::manifest::{CollectedArtifact, Manifest};
use crate::domain::models::run::WorkflowRun;
use crate::domain::models::target::Target;
use crate::domain::storage::report_store::{ReportStore, StoredArtifact};
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Filesystem-backed report store rooted at the output directory.
///
/// Layout under the root:
///
/// ```text
/// <owner>__<name>/run_<id>/run_meta.json
/// <owner>__<name>/run_<id>/artifacts/<artifact>/...
/// manifest.json
/// ```
pub struct LocalReportStore {
    root: PathBuf,
}

impl LocalReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            CollectError::config(format!(
                "cannot create output directory {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, target: &Target, run_id: u64) -> PathBuf {
        self.root.join(target.dir_name()).join(format!("run_{run_id}"))
    }
}

/// Artifact names become directory names, so path separators and the dot
/// components are rejected outright.
fn is_safe_artifact_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Unpacks a zip archive into `dest`, returning the extracted file paths
/// relative to `dest`, sorted.
fn unpack_archive(archive: &[u8], dest: &Path) -> Result<Vec<String>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| CollectError::Parse(format!("invalid artifact archive: {e}")))?;
    fs::create_dir_all(dest)?;

    let mut files = Vec::new();
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| CollectError::Parse(format!("unreadable archive entry: {e}")))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(CollectError::Parse(format!(
                "archive entry escapes its directory: {}",
                entry.name()
            )));
        };
        let out_path = dest.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        files.push(relative.to_string_lossy().into_owned());
    }
    files.sort();
    Ok(files)
}

impl ReportStore for LocalReportStore {
    fn store_artifact(
        &self,
        target: &Target,
        run_id: u64,
        name: &str,
        archive: &[u8],
    ) -> Result<StoredArtifact> {
        if !is_safe_artifact_name(name) {
            return Err(CollectError::download(
                target.full_name(),
                name,
                "unsafe artifact name",
            ));
        }

        let artifacts_dir = self.run_dir(target, run_id).join("artifacts");
        let final_dir = artifacts_dir.join(name);
        let staging_dir = artifacts_dir.join(format!(".{name}.partial"));

        // Unpack into a hidden staging directory, then rename into place, so
        // a failed download never leaves a half-written artifact behind.
        let landed = (|| -> Result<Vec<String>> {
            fs::create_dir_all(&artifacts_dir)?;
            if staging_dir.exists() {
                fs::remove_dir_all(&staging_dir)?;
            }
            let files = unpack_archive(archive, &staging_dir)?;
            if files.is_empty() {
                return Err(CollectError::Parse("archive contained no files".to_string()));
            }
            if final_dir.exists() {
                fs::remove_dir_all(&final_dir)?;
            }
            fs::rename(&staging_dir, &final_dir)?;
            Ok(files)
        })();

        match landed {
            Ok(files) => Ok(StoredArtifact {
                path: format!("{}/run_{}/artifacts/{}", target.dir_name(), run_id, name),
                files,
            }),
            Err(e) => {
                let _ = fs::remove_dir_all(&staging_dir);
                Err(CollectError::download(
                    target.full_name(),
                    name,
                    e.to_string(),
                ))
            }
        }
    }

    fn write_run_meta(&self, target: &Target, run_id: u64, run: &WorkflowRun) -> Result<()> {
        let run_dir = self.run_dir(target, run_id);
        fs::create_dir_all(&run_dir)?;
        let json = serde_json::to_string_pretty(run)
            .map_err(|e| CollectError::Parse(e.to_string()))?;
        fs::write(run_dir.join("run_meta.json"), json)?;
        Ok(())
    }

    fn artifact_is_intact(&self, artifact: &CollectedArtifact) -> bool {
        let base = self.root.join(&artifact.path);
        if !base.is_dir() || artifact.files.is_empty() {
            return false;
        }
        artifact.files.iter().all(|file| {
            fs::metadata(base.join(file))
                .map(|meta| meta.is_file() && meta.len() > 0)
                .unwrap_or(false)
        })
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<PathBuf> {
        let path = self.root.join("manifest.json");
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| CollectError::Parse(e.to_string()))?;
        fs::write(&path, json)?;
        Ok(path)
    }

    fn archive_collection(&self, bundle_name: &str) -> Result<PathBuf> {
        // The bundle lands next to the output root, never inside it, so the
        // walk below cannot pick up the bundle itself.
        let parent = self
            .root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let bundle_path = parent.join(bundle_name);
        let root_name = self
            .root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "collection".to_string());

        let written = (|| -> Result<()> {
            if bundle_path.exists() {
                fs::remove_file(&bundle_path)?;
            }

            let mut files = Vec::new();
            for entry in WalkDir::new(&self.root) {
                let entry = entry.map_err(|e| CollectError::Archive(e.to_string()))?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            files.sort();

            let mut writer = ZipWriter::new(File::create(&bundle_path)?);
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for path in files {
                let relative = path
                    .strip_prefix(&self.root)
                    .map_err(|e| CollectError::Archive(e.to_string()))?;
                let entry_name = format!("{root_name}/{}", relative.to_string_lossy());
                writer
                    .start_file(entry_name, options)
                    .map_err(|e| CollectError::Archive(e.to_string()))?;
                let mut input = File::open(&path)?;
                io::copy(&mut input, &mut writer)?;
            }
            writer
                .finish()
                .map_err(|e| CollectError::Archive(e.to_string()))?;
            Ok(())
        })();

        match written {
            Ok(()) => Ok(bundle_path),
            Err(e) => {
                let _ = fs::remove_file(&bundle_path);
                Err(match e {
                    CollectError::Archive(_) => e,
                    other => CollectError::Archive(other.to_string()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::TempDir;

    fn target() -> Target {
        Target {
            owner: "acme".to_string(),
            repo: "api".to_string(),
        }
    }

    fn zip_bytes(entries: &[(&str, &[u8])]) -> anyhow::Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options)?;
            writer.write_all(data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    fn store_in(tmp: &TempDir) -> anyhow::Result<LocalReportStore> {
        Ok(LocalReportStore::new(tmp.path().join("_collected_reports"))?)
    }

    #[test]
    fn stores_an_artifact_under_the_run_directory() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp)?;
        let archive = zip_bytes(&[("coverage.json", br#"{"total": 93.0}"#)])?;

        let stored = store.store_artifact(&target(), 7, "coverage.json", &archive)?;

        assert_eq!(stored.path, "acme__api/run_7/artifacts/coverage.json");
        assert_eq!(stored.files, vec!["coverage.json"]);
        let on_disk = store.root().join(&stored.path).join("coverage.json");
        assert_eq!(fs::read_to_string(on_disk)?, r#"{"total": 93.0}"#);
        Ok(())
    }

    #[test]
    fn preserves_directories_inside_an_artifact() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp)?;
        let archive = zip_bytes(&[
            ("reports/unit.xml", b"<suite/>" as &[u8]),
            ("reports/e2e.xml", b"<suite/>"),
            ("summary.txt", b"2 suites"),
        ])?;

        let stored = store.store_artifact(&target(), 7, "junit", &archive)?;

        assert_eq!(
            stored.files,
            vec!["reports/e2e.xml", "reports/unit.xml", "summary.txt"]
        );
        for file in &stored.files {
            assert!(store.root().join(&stored.path).join(file).is_file());
        }
        Ok(())
    }

    #[test]
    fn corrupt_archive_leaves_nothing_behind() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp)?;

        let result = store.store_artifact(&target(), 7, "coverage.json", b"not a zip");

        assert!(matches!(result, Err(CollectError::Download { .. })));
        let artifacts_dir = store.root().join("acme__api/run_7/artifacts");
        assert!(!artifacts_dir.join("coverage.json").exists());
        assert!(!artifacts_dir.join(".coverage.json.partial").exists());
        Ok(())
    }

    #[test]
    fn empty_archive_is_rejected() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp)?;
        let archive = zip_bytes(&[])?;

        let result = store.store_artifact(&target(), 7, "empty", &archive);

        assert!(matches!(result, Err(CollectError::Download { .. })));
        assert!(!store.root().join("acme__api/run_7/artifacts/empty").exists());
        Ok(())
    }

    #[test]
    fn unsafe_artifact_names_are_rejected() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp)?;
        let archive = zip_bytes(&[("x", b"x" as &[u8])])?;

        for name in ["", ".", "..", "a/b", "a\\b"] {
            let result = store.store_artifact(&target(), 7, name, &archive);
            assert!(result.is_err(), "name {name:?} should be rejected");
        }
        Ok(())
    }

    #[test]
    fn storing_again_replaces_the_previous_copy() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp)?;

        let first = zip_bytes(&[("coverage.json", b"old" as &[u8]), ("extra.txt", b"x")])?;
        store.store_artifact(&target(), 7, "coverage.json", &first)?;
        let second = zip_bytes(&[("coverage.json", b"new" as &[u8])])?;
        let stored = store.store_artifact(&target(), 7, "coverage.json", &second)?;

        let base = store.root().join(&stored.path);
        assert_eq!(fs::read_to_string(base.join("coverage.json"))?, "new");
        assert!(!base.join("extra.txt").exists());
        Ok(())
    }

    #[test]
    fn intactness_requires_existing_non_empty_files() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp)?;
        let archive = zip_bytes(&[("coverage.json", b"93" as &[u8])])?;
        let stored = store.store_artifact(&target(), 7, "coverage.json", &archive)?;

        let record = CollectedArtifact {
            name: "coverage.json".to_string(),
            size_in_bytes: 2,
            path: stored.path.clone(),
            files: stored.files.clone(),
        };
        assert!(store.artifact_is_intact(&record));

        let file = store.root().join(&record.path).join("coverage.json");
        fs::write(&file, b"")?;
        assert!(!store.artifact_is_intact(&record));

        fs::remove_file(&file)?;
        assert!(!store.artifact_is_intact(&record));
        Ok(())
    }

    #[test]
    fn writes_run_meta_beside_the_artifacts() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp)?;
        let run = WorkflowRun {
            id: 7,
            status: "completed".to_string(),
            conclusion: Some("success".to_string()),
            created_at: Utc
                .with_ymd_and_hms(2026, 8, 20, 12, 0, 0)
                .single()
                .unwrap_or_default(),
            workflow_name: Some("ci".to_string()),
            display_title: None,
            html_url: None,
        };

        store.write_run_meta(&target(), 7, &run)?;

        let raw = fs::read_to_string(store.root().join("acme__api/run_7/run_meta.json"))?;
        let parsed: WorkflowRun = serde_json::from_str(&raw)?;
        assert_eq!(parsed, run);
        Ok(())
    }

    #[test]
    fn writes_the_manifest_at_the_output_root() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp)?;
        let manifest = Manifest {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            repos_file: "repos.txt".to_string(),
            workflow_filter: None,
            entries: vec![],
        };

        let path = store.write_manifest(&manifest)?;

        assert_eq!(path, store.root().join("manifest.json"));
        let parsed: Manifest = serde_json::from_str(&fs::read_to_string(path)?)?;
        assert_eq!(parsed.repos_file, "repos.txt");
        Ok(())
    }

    #[test]
    fn bundle_contains_every_collected_file() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp)?;
        let archive = zip_bytes(&[("coverage.json", b"93" as &[u8])])?;
        store.store_artifact(&target(), 7, "coverage.json", &archive)?;
        store.write_manifest(&Manifest {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            repos_file: "repos.txt".to_string(),
            workflow_filter: None,
            entries: vec![],
        })?;

        let bundle_path = store.archive_collection("all_reports_bundle_20260820_120000.zip")?;

        assert_eq!(
            bundle_path,
            tmp.path().join("all_reports_bundle_20260820_120000.zip")
        );
        let mut bundle = ZipArchive::new(File::open(&bundle_path)?)?;
        let names: Vec<String> = (0..bundle.len())
            .filter_map(|i| bundle.by_index(i).ok().map(|e| e.name().to_string()))
            .collect();
        assert!(names.contains(&"_collected_reports/manifest.json".to_string()));
        assert!(names.contains(
            &"_collected_reports/acme__api/run_7/artifacts/coverage.json/coverage.json"
                .to_string()
        ));
        assert_eq!(names.len(), 2);
        Ok(())
    }

    #[test]
    fn rearchiving_replaces_the_previous_bundle() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = store_in(&tmp)?;
        let archive = zip_bytes(&[("coverage.json", b"93" as &[u8])])?;
        store.store_artifact(&target(), 7, "coverage.json", &archive)?;

        let first = store.archive_collection("bundle.zip")?;
        let second = store.archive_collection("bundle.zip")?;

        assert_eq!(first, second);
        let bundle = ZipArchive::new(File::open(&second)?)?;
        assert_eq!(bundle.len(), 1);
        Ok(())
    }
}
