use std::fs;
use std::io;

use crate::domain::model::{BlobPath, ExportPlan, ExportResult};
use crate::domain::ports::ProgressSink;
use crate::utils::error::{ExportError, Result};

/// Materializes an [`ExportPlan`] in the destination tree.
///
/// Blob failures are counted, never raised. A manifest that cannot be copied
/// aborts the model: its blobs are left alone and all counted as failed, so
/// `copied_count + failed_count == plan.blobs.len()` holds for every result.
/// Copies overwrite, which makes re-running a plan safe.
pub struct ExportExecutor<'a> {
    progress: &'a dyn ProgressSink,
}

impl<'a> ExportExecutor<'a> {
    pub fn new(progress: &'a dyn ProgressSink) -> Self {
        Self { progress }
    }

    pub fn execute(&self, plan: &ExportPlan) -> ExportResult {
        let mut result = ExportResult::new(plan.model_ref.clone());
        self.progress.model_started(&plan.model_ref, plan.blobs.len());

        if let Err(e) = copy_manifest(plan) {
            tracing::error!("❌ Failed to copy manifest for {}: {}", plan.model_ref, e);
            result.failed_count = plan.blobs.len();
            result.abort_reason = Some(e.to_string());
            self.progress.model_finished(&result);
            return result;
        }
        result.manifest_copied = true;
        tracing::debug!("Manifest copied to {}", plan.manifest_dest.display());

        for blob in &plan.blobs {
            tracing::debug!("Verifying blob: {}", blob.source_path.display());
            match copy_blob(blob) {
                Ok(bytes) => {
                    result.copied_count += 1;
                    result.bytes_copied += bytes;
                    self.progress.blob_copied(blob, bytes);
                }
                Err(e) => {
                    result.failed_count += 1;
                    tracing::warn!("⚠️ Blob {} not exported: {}", blob.digest, e);
                    self.progress.blob_failed(blob, &e.to_string());
                }
            }
        }

        self.progress.model_finished(&result);
        result
    }
}

fn copy_manifest(plan: &ExportPlan) -> Result<()> {
    if let Some(parent) = plan.manifest_dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&plan.manifest_src, &plan.manifest_dest)?;
    Ok(())
}

fn copy_blob(blob: &BlobPath) -> Result<u64> {
    if !blob.source_path.is_file() {
        return Err(ExportError::IoError(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is missing from the source store", blob.source_path.display()),
        )));
    }
    if let Some(parent) = blob.dest_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(fs::copy(&blob.source_path, &blob.dest_path)?)
}
