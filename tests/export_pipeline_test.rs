use anyhow::Result;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use ollama_export::adapters::NoProgress;
use ollama_export::core::packager::ArchiveMode;
use ollama_export::domain::model::{ExportStage, ModelOutcome};
use ollama_export::domain::ports::ModelLister;
use ollama_export::{ExportConfig, ExportError, ExportOrchestrator, ModelRef};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const AAA: &str = "aaa0000000000000000000000000000000000000000000000000000000000001";
const BBB: &str = "bbb0000000000000000000000000000000000000000000000000000000000002";
const CCC: &str = "ccc0000000000000000000000000000000000000000000000000000000000003";

const LIBRARY: &str = "manifests/registry.ollama.ai/library";

/// A fake Ollama store on disk.
struct SourceStore {
    dir: TempDir,
}

impl SourceStore {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(LIBRARY)).unwrap();
        fs::create_dir_all(dir.path().join("blobs")).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn add_manifest(&self, name: &str, tag: &str, digests: &[&str]) -> &Self {
        let layers: Vec<_> = digests
            .iter()
            .map(|d| {
                serde_json::json!({
                    "mediaType": "application/vnd.ollama.image.model",
                    "digest": format!("sha256:{d}"),
                    "size": d.len()
                })
            })
            .collect();
        let manifest = serde_json::json!({"schemaVersion": 2, "layers": layers});

        let dir = self.path().join(LIBRARY).join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(tag), manifest.to_string()).unwrap();
        self
    }

    fn add_blob(&self, digest: &str) -> &Self {
        fs::write(
            self.path().join("blobs").join(format!("sha256-{digest}")),
            format!("blob {digest}"),
        )
        .unwrap();
        self
    }
}

struct StaticLister(Vec<ModelRef>);

#[async_trait]
impl ModelLister for StaticLister {
    async fn list_models(&self) -> ollama_export::Result<Vec<ModelRef>> {
        Ok(self.0.clone())
    }
}

struct FailingLister;

#[async_trait]
impl ModelLister for FailingLister {
    async fn list_models(&self) -> ollama_export::Result<Vec<ModelRef>> {
        Err(ExportError::ModelListingError {
            message: "ollama not installed".to_string(),
        })
    }
}

fn orchestrator<L: ModelLister>(
    store: &SourceStore,
    out: &TempDir,
    lister: L,
) -> ExportOrchestrator<L, NoProgress> {
    let config = ExportConfig::new(store.path(), out.path());
    ExportOrchestrator::new(config, lister, NoProgress)
}

fn selectors(names: &[&str]) -> Vec<ModelRef> {
    names.iter().map(|n| n.parse().unwrap()).collect()
}

fn archive_paths(archive: &Path) -> Vec<PathBuf> {
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(archive).unwrap()));
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().into_owned())
        .collect()
}

fn exported(outcome: &ModelOutcome) -> &ollama_export::domain::model::ExportResult {
    match outcome {
        ModelOutcome::Exported(result) => result,
        other => panic!("expected an exported model, got {other:?}"),
    }
}

#[tokio::test]
async fn test_end_to_end_single_model() -> Result<()> {
    let store = SourceStore::new();
    store
        .add_manifest("demo", "latest", &[AAA, BBB])
        .add_blob(AAA)
        .add_blob(BBB);
    let out = TempDir::new()?;

    let summary = orchestrator(&store, &out, FailingLister)
        .run(selectors(&["demo"]))
        .await?;

    assert_eq!(summary.outcomes.len(), 1);
    let result = exported(&summary.outcomes[0]);
    assert_eq!(result.model_ref.to_string(), "demo:latest");
    assert_eq!(result.copied_count, 2);
    assert_eq!(result.failed_count, 0);
    assert!(result.manifest_copied);
    assert_eq!(summary.exit_code(), 0);
    assert!(!summary.blob_tree_empty);

    let models = out.path().join("models");
    assert!(models.join(LIBRARY).join("demo/latest").is_file());
    assert_eq!(fs::read_dir(models.join("blobs"))?.count(), 2);
    assert_eq!(
        fs::read_to_string(models.join("blobs").join(format!("sha256-{AAA}")))?,
        format!("blob {AAA}")
    );

    let archive = out.path().join("ollama-export-demo-latest.tar.gz");
    assert_eq!(summary.archives, vec![archive.clone()]);
    let paths = archive_paths(&archive);
    assert!(paths.contains(&PathBuf::from(format!("models/blobs/sha256-{BBB}"))));
    assert!(paths.contains(&PathBuf::from("models").join(LIBRARY).join("demo/latest")));
    assert!(paths.iter().all(|p| p.starts_with("models")));
    Ok(())
}

#[tokio::test]
async fn test_missing_blob_is_partial_export() -> Result<()> {
    let store = SourceStore::new();
    store.add_manifest("demo", "latest", &[AAA, BBB]).add_blob(AAA);
    let out = TempDir::new()?;

    let summary = orchestrator(&store, &out, FailingLister)
        .run(selectors(&["demo:latest"]))
        .await?;

    let result = exported(&summary.outcomes[0]);
    assert_eq!(result.copied_count, 1);
    assert_eq!(result.failed_count, 1);
    assert!(result.manifest_copied);
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(summary.archives.len(), 1);
    assert!(summary.archives[0].is_file());
    Ok(())
}

#[tokio::test]
async fn test_repeated_digests_are_copied_once() -> Result<()> {
    let store = SourceStore::new();
    store
        .add_manifest("demo", "latest", &[BBB, AAA, BBB, AAA])
        .add_blob(AAA)
        .add_blob(BBB);
    let out = TempDir::new()?;

    let summary = orchestrator(&store, &out, FailingLister)
        .run(selectors(&["demo"]))
        .await?;

    let result = exported(&summary.outcomes[0]);
    assert_eq!(result.copied_count + result.failed_count, 2);
    assert_eq!(result.copied_count, 2);
    Ok(())
}

#[tokio::test]
async fn test_rerun_is_idempotent() -> Result<()> {
    let store = SourceStore::new();
    store
        .add_manifest("demo", "latest", &[AAA, BBB])
        .add_blob(AAA)
        .add_blob(BBB);
    let out = TempDir::new()?;
    let orchestrator = orchestrator(&store, &out, FailingLister);

    let first = orchestrator.run(selectors(&["demo"])).await?;
    let second = orchestrator.run(selectors(&["demo"])).await?;

    assert_eq!(first.outcomes, second.outcomes);
    assert_eq!(fs::read_dir(out.path().join("models/blobs"))?.count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_empty_selectors_use_lister() -> Result<()> {
    let store = SourceStore::new();
    store
        .add_manifest("alpha", "latest", &[AAA])
        .add_manifest("beta", "7b", &[BBB])
        .add_blob(AAA)
        .add_blob(BBB);
    let out = TempDir::new()?;
    let lister = StaticLister(selectors(&["alpha:latest", "beta:7b"]));

    let summary = orchestrator(&store, &out, lister).run(Vec::new()).await?;

    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.total_copied(), 2);
    assert_eq!(
        summary.archives,
        vec![out.path().join("ollama-export.tar.gz")]
    );
    Ok(())
}

#[tokio::test]
async fn test_listing_failure_is_fatal() {
    let store = SourceStore::new();
    let out = TempDir::new().unwrap();

    let result = orchestrator(&store, &out, FailingLister).run(Vec::new()).await;
    assert!(matches!(result, Err(ExportError::ModelListingError { .. })));

    let result = orchestrator(&store, &out, StaticLister(Vec::new()))
        .run(Vec::new())
        .await;
    assert!(matches!(result, Err(ExportError::NoModelsError)));
}

#[tokio::test]
async fn test_missing_source_layout_is_fatal() {
    let store = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let config = ExportConfig::new(store.path(), out.path());

    let result = ExportOrchestrator::new(config, FailingLister, NoProgress)
        .run(selectors(&["demo"]))
        .await;

    match result {
        Err(ExportError::SourceLayoutError { path }) => assert!(path.ends_with("manifests")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_one_failing_model_does_not_abort_batch() -> Result<()> {
    let store = SourceStore::new();
    store.add_manifest("demo", "latest", &[AAA]).add_blob(AAA);
    let out = TempDir::new()?;

    let summary = orchestrator(&store, &out, FailingLister)
        .run(selectors(&["ghost", "demo", "demo:v9"]))
        .await?;

    assert_eq!(summary.outcomes.len(), 3);
    assert!(matches!(
        summary.outcomes[0],
        ModelOutcome::Failed {
            stage: ExportStage::Locate,
            ..
        }
    ));
    assert!(summary.outcomes[1].is_success());
    match &summary.outcomes[2] {
        ModelOutcome::Failed { stage, reason, .. } => {
            assert_eq!(*stage, ExportStage::Locate);
            assert!(reason.contains("v9"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(summary.exit_code(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unparsable_manifest_fails_that_model_only() -> Result<()> {
    let store = SourceStore::new();
    store.add_manifest("demo", "latest", &[AAA]).add_blob(AAA);
    let broken = store.path().join(LIBRARY).join("broken");
    fs::create_dir_all(&broken)?;
    fs::write(broken.join("latest"), "{\"layers\": []}")?;
    let out = TempDir::new()?;

    let summary = orchestrator(&store, &out, FailingLister)
        .run(selectors(&["broken", "demo"]))
        .await?;

    assert!(matches!(
        summary.outcomes[0],
        ModelOutcome::Failed {
            stage: ExportStage::ParseManifest,
            ..
        }
    ));
    assert!(summary.outcomes[1].is_success());
    Ok(())
}

#[tokio::test]
async fn test_nothing_exported_still_packages() -> Result<()> {
    let store = SourceStore::new();
    store.add_manifest("demo", "latest", &[AAA, BBB]);
    let out = TempDir::new()?;

    let summary = orchestrator(&store, &out, FailingLister)
        .run(selectors(&["demo"]))
        .await?;

    let result = exported(&summary.outcomes[0]);
    assert_eq!(result.copied_count, 0);
    assert_eq!(result.failed_count, 2);
    assert!(summary.blob_tree_empty);
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(summary.archives.len(), 1);
    assert!(summary.archives[0].is_file());
    Ok(())
}

#[tokio::test]
async fn test_per_model_archives_hold_only_their_blobs() -> Result<()> {
    let store = SourceStore::new();
    store
        .add_manifest("alpha", "latest", &[AAA, CCC])
        .add_manifest("beta", "7b", &[BBB, CCC])
        .add_blob(AAA)
        .add_blob(BBB)
        .add_blob(CCC);
    let out = TempDir::new()?;
    let mut config = ExportConfig::new(store.path(), out.path());
    config.archive.mode = ArchiveMode::PerModel;

    let summary = ExportOrchestrator::new(config, FailingLister, NoProgress)
        .run(selectors(&["alpha", "beta"]))
        .await?;

    assert_eq!(
        summary.archives,
        vec![
            out.path().join("ollama-export-alpha-latest.tar.gz"),
            out.path().join("ollama-export-beta-7b.tar.gz"),
        ]
    );
    let alpha = archive_paths(&summary.archives[0]);
    assert!(alpha.contains(&PathBuf::from(format!("models/blobs/sha256-{AAA}"))));
    assert!(alpha.contains(&PathBuf::from(format!("models/blobs/sha256-{CCC}"))));
    assert!(!alpha.contains(&PathBuf::from(format!("models/blobs/sha256-{BBB}"))));
    assert!(!alpha
        .iter()
        .any(|p| p.to_string_lossy().contains("library/beta")));
    assert!(!out.path().join("ollama-export.tar.gz").exists());
    Ok(())
}

#[tokio::test]
async fn test_dry_run_writes_nothing() -> Result<()> {
    let store = SourceStore::new();
    store.add_manifest("demo", "latest", &[AAA, BBB]).add_blob(AAA);
    let out = TempDir::new()?;
    let output_dir = out.path().join("export");
    let mut config = ExportConfig::new(store.path(), &output_dir);
    config.dry_run = true;

    let summary = ExportOrchestrator::new(config, FailingLister, NoProgress)
        .run(selectors(&["demo"]))
        .await?;

    assert_eq!(
        summary.outcomes,
        vec![ModelOutcome::Planned {
            model_ref: ModelRef::new("demo", Some("latest")),
            blobs: 2,
            missing: 1,
        }]
    );
    assert!(summary.archives.is_empty());
    assert!(!output_dir.exists());
    assert_eq!(summary.exit_code(), 0);
    Ok(())
}

#[tokio::test]
async fn test_archive_disabled_leaves_tree_only() -> Result<()> {
    let store = SourceStore::new();
    store.add_manifest("demo", "latest", &[AAA]).add_blob(AAA);
    let out = TempDir::new()?;
    let mut config = ExportConfig::new(store.path(), out.path());
    config.archive.enabled = false;

    let summary = ExportOrchestrator::new(config, FailingLister, NoProgress)
        .run(selectors(&["demo"]))
        .await?;

    assert!(summary.archives.is_empty());
    assert!(out
        .path()
        .join("models/blobs")
        .join(format!("sha256-{AAA}"))
        .is_file());
    Ok(())
}

#[tokio::test]
async fn test_manifest_copy_failure_is_a_failed_model() -> Result<()> {
    let store = SourceStore::new();
    store
        .add_manifest("demo", "latest", &[AAA])
        .add_manifest("other", "latest", &[BBB])
        .add_blob(AAA)
        .add_blob(BBB);
    let out = TempDir::new()?;
    // A file where the model's manifest directory should go.
    let library = out.path().join("models").join(LIBRARY);
    fs::create_dir_all(&library)?;
    fs::write(library.join("demo"), b"in the way")?;

    let summary = orchestrator(&store, &out, FailingLister)
        .run(selectors(&["demo", "other"]))
        .await?;

    match &summary.outcomes[0] {
        ModelOutcome::Failed {
            model_ref, stage, ..
        } => {
            assert_eq!(model_ref.to_string(), "demo:latest");
            assert_eq!(*stage, ExportStage::CopyManifest);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(summary.outcomes[1].is_success());
    assert!(!out
        .path()
        .join("models/blobs")
        .join(format!("sha256-{AAA}"))
        .exists());
    assert_eq!(summary.exit_code(), 2);
    Ok(())
}

#[tokio::test]
async fn test_failed_single_model_gets_generic_archive_name() -> Result<()> {
    let store = SourceStore::new();
    store.add_manifest("demo", "latest", &[AAA]).add_blob(AAA);
    let out = TempDir::new()?;

    let summary = orchestrator(&store, &out, FailingLister)
        .run(selectors(&["ghost"]))
        .await?;

    assert_eq!(summary.exit_code(), 1);
    assert_eq!(
        summary.archives,
        vec![out.path().join("ollama-export.tar.gz")]
    );
    assert!(!out.path().join("ollama-export-ghost.tar.gz").exists());
    Ok(())
}
