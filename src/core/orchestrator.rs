use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ExportConfig;
use crate::core::executor::ExportExecutor;
use crate::core::layout::StoreLayout;
use crate::core::locator::ManifestLocator;
use crate::core::manifest::ManifestParser;
use crate::core::packager::{archive_file_name, ArchiveMode, Packager};
use crate::core::planner::ExportPlanner;
use crate::domain::model::{ExportPlan, ExportStage, ModelOutcome, ModelRef, RunSummary};
use crate::domain::ports::{ModelLister, ProgressSink};
use crate::utils::error::{ExportError, Result};

/// The pipeline stages, built once per run.
struct Stages<'a> {
    locator: ManifestLocator,
    parser: ManifestParser,
    planner: ExportPlanner,
    executor: ExportExecutor<'a>,
    packager: Packager,
}

/// Drives the export over a list of selectors.
///
/// Per model: locate, parse, plan, copy. A model that fails at any step is
/// recorded and the batch moves on; only source/destination setup and model
/// enumeration errors abort the run.
pub struct ExportOrchestrator<L: ModelLister, P: ProgressSink> {
    config: ExportConfig,
    lister: L,
    progress: P,
    source: StoreLayout,
    destination: StoreLayout,
}

impl<L: ModelLister, P: ProgressSink> ExportOrchestrator<L, P> {
    pub fn new(config: ExportConfig, lister: L, progress: P) -> Self {
        let source = StoreLayout::source(&config.base_dir);
        let destination = StoreLayout::destination(&config.output_dir);
        Self {
            config,
            lister,
            progress,
            source,
            destination,
        }
    }

    pub async fn run(&self, selectors: Vec<ModelRef>) -> Result<RunSummary> {
        self.verify_source()?;
        let selectors = self.resolve_selectors(selectors).await?;
        if !self.config.dry_run {
            self.prepare_destination()?;
        }

        let stages = Stages {
            locator: ManifestLocator::new(&self.source, self.config.tag_strategy),
            parser: ManifestParser::new(self.config.digest_strategy),
            planner: ExportPlanner::new(&self.source, &self.destination),
            executor: ExportExecutor::new(&self.progress),
            packager: Packager::new(&self.config.archive),
        };

        let mut summary = RunSummary::default();
        for model in &selectors {
            self.process_model(model, &stages, &mut summary);
        }

        if self.config.dry_run {
            tracing::info!("🔍 Dry run complete, nothing was copied");
            return Ok(summary);
        }

        summary.blob_tree_empty = dir_is_empty(&self.destination.blobs_dir());
        if summary.blob_tree_empty {
            tracing::warn!(
                "⚠️ No blobs were exported to {}, the archive will only hold manifests",
                self.destination.blobs_dir().display()
            );
        }

        if self.config.archive.enabled && self.config.archive.mode == ArchiveMode::Combined {
            let single_model = match summary.outcomes.as_slice() {
                [only] if only.is_success() => Some(only.model_ref().clone()),
                _ => None,
            };
            let archive_path = self
                .config
                .output_dir
                .join(archive_file_name(single_model.as_ref()));

            self.progress.packaging_started(&archive_path);
            let packed = stages
                .packager
                .pack_tree(&self.config.output_dir, &archive_path)?;
            self.progress
                .packaging_finished(&packed.archive, packed.entries);
            summary.archives.push(packed.archive);
        }

        Ok(summary)
    }

    fn verify_source(&self) -> Result<()> {
        for dir in [self.source.manifests_dir(), self.source.blobs_dir()] {
            if !dir.is_dir() {
                return Err(ExportError::SourceLayoutError { path: dir });
            }
        }
        tracing::debug!("Source directories verified: {}", self.source.root().display());
        Ok(())
    }

    fn prepare_destination(&self) -> Result<()> {
        for dir in [self.destination.namespace_root(), self.destination.blobs_dir()] {
            fs::create_dir_all(&dir)
                .map_err(|source| ExportError::OutputDirError { path: dir, source })?;
        }
        Ok(())
    }

    async fn resolve_selectors(&self, selectors: Vec<ModelRef>) -> Result<Vec<ModelRef>> {
        if !selectors.is_empty() {
            return Ok(selectors);
        }

        tracing::info!("No models specified, exporting all installed models");
        let models = self.lister.list_models().await?;
        if models.is_empty() {
            return Err(ExportError::NoModelsError);
        }

        let names: Vec<String> = models.iter().map(ToString::to_string).collect();
        tracing::info!("Models to export: {}", names.join(" "));
        Ok(models)
    }

    fn process_model(&self, model: &ModelRef, stages: &Stages<'_>, summary: &mut RunSummary) {
        let plan = match self.plan_model(model, stages) {
            Ok(plan) => plan,
            Err((stage, e)) => {
                report_failure(model, stage, &e);
                summary.outcomes.push(ModelOutcome::Failed {
                    model_ref: model.clone(),
                    stage,
                    reason: e.to_string(),
                });
                return;
            }
        };

        if self.config.dry_run {
            let missing = plan.missing_blobs();
            tracing::info!(
                "🔍 {} -> {} ({} blobs, {} missing at source)",
                plan.model_ref,
                plan.manifest_dest.display(),
                plan.blobs.len(),
                missing
            );
            summary.outcomes.push(ModelOutcome::Planned {
                model_ref: plan.model_ref.clone(),
                blobs: plan.blobs.len(),
                missing,
            });
            return;
        }

        let result = stages.executor.execute(&plan);
        if !result.manifest_copied {
            let reason = result
                .abort_reason
                .clone()
                .unwrap_or_else(|| "manifest was not copied".to_string());
            tracing::error!(
                "❌ {} failed at {}: {} ({} blobs skipped)",
                result.model_ref,
                ExportStage::CopyManifest,
                reason,
                result.failed_count
            );
            summary.outcomes.push(ModelOutcome::Failed {
                model_ref: result.model_ref,
                stage: ExportStage::CopyManifest,
                reason,
            });
            return;
        }
        if result.failed_count > 0 {
            tracing::warn!("⚠️ Some blobs of {} were not copied", result.model_ref);
        }
        if result.is_exported() {
            tracing::info!("✅ Model {} exported", result.model_ref);
        } else {
            tracing::error!("❌ No blobs could be exported for {}", result.model_ref);
        }

        if result.is_exported()
            && self.config.archive.enabled
            && self.config.archive.mode == ArchiveMode::PerModel
        {
            match self.package_model(&plan, &stages.packager) {
                Ok(archive) => summary.archives.push(archive),
                Err(e) => {
                    report_failure(model, ExportStage::Package, &e);
                    summary.outcomes.push(ModelOutcome::Failed {
                        model_ref: result.model_ref.clone(),
                        stage: ExportStage::Package,
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }

        summary.outcomes.push(ModelOutcome::Exported(result));
    }

    fn plan_model(
        &self,
        model: &ModelRef,
        stages: &Stages<'_>,
    ) -> std::result::Result<ExportPlan, (ExportStage, ExportError)> {
        let handle = stages
            .locator
            .locate(model)
            .map_err(|e| (ExportStage::Locate, e))?;
        tracing::debug!("Manifest for {}: {}", model, handle.path.display());

        let manifest = fs::read(&handle.path)
            .map_err(|e| (ExportStage::ReadManifest, ExportError::from(e)))?;
        let digests = stages
            .parser
            .extract_digests(&manifest)
            .map_err(|e| (ExportStage::ParseManifest, e))?;

        Ok(stages.planner.plan(&handle, &digests))
    }

    fn package_model(&self, plan: &ExportPlan, packager: &Packager) -> Result<PathBuf> {
        let mut files = vec![plan.manifest_dest.clone()];
        files.extend(
            plan.blobs
                .iter()
                .filter(|b| b.dest_path.is_file())
                .map(|b| b.dest_path.clone()),
        );

        let archive_path = self
            .config
            .output_dir
            .join(archive_file_name(Some(&plan.model_ref)));
        self.progress.packaging_started(&archive_path);
        let packed = packager.pack_files(&self.config.output_dir, &files, &archive_path)?;
        self.progress
            .packaging_finished(&packed.archive, packed.entries);
        Ok(packed.archive)
    }
}

fn report_failure(model: &ModelRef, stage: ExportStage, error: &ExportError) {
    tracing::error!("❌ {} failed at {}: {}", model, stage, error);
    match error {
        ExportError::ModelNotFound { available, .. } => {
            tracing::info!("Available models:");
            for name in available {
                tracing::info!("  {}", name);
            }
        }
        ExportError::TagNotFound { available, .. } => {
            tracing::info!("Available tags:");
            for tag in available {
                tracing::info!("  {}", tag);
            }
        }
        _ => tracing::info!("💡 {}", error.recovery_suggestion()),
    }
}

fn dir_is_empty(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}
