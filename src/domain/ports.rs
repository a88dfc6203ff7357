use crate::domain::model::{BlobPath, ExportResult, ModelRef};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Enumerates the models installed in the local Ollama instance.
#[async_trait]
pub trait ModelLister: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelRef>>;
}

/// Receives progress events for display. Implementations must not fail.
pub trait ProgressSink: Send + Sync {
    fn model_started(&self, model: &ModelRef, blob_count: usize);
    fn blob_copied(&self, blob: &BlobPath, bytes: u64);
    fn blob_failed(&self, blob: &BlobPath, reason: &str);
    fn model_finished(&self, result: &ExportResult);

    fn packaging_started(&self, _archive: &Path) {}
    fn packaging_finished(&self, _archive: &Path, _entries: usize) {}
}

#[async_trait]
impl<T: ModelLister + ?Sized> ModelLister for Box<T> {
    async fn list_models(&self) -> Result<Vec<ModelRef>> {
        (**self).list_models().await
    }
}

impl<T: ProgressSink + ?Sized> ProgressSink for Box<T> {
    fn model_started(&self, model: &ModelRef, blob_count: usize) {
        (**self).model_started(model, blob_count)
    }

    fn blob_copied(&self, blob: &BlobPath, bytes: u64) {
        (**self).blob_copied(blob, bytes)
    }

    fn blob_failed(&self, blob: &BlobPath, reason: &str) {
        (**self).blob_failed(blob, reason)
    }

    fn model_finished(&self, result: &ExportResult) {
        (**self).model_finished(result)
    }

    fn packaging_started(&self, archive: &Path) {
        (**self).packaging_started(archive)
    }

    fn packaging_finished(&self, archive: &Path, entries: usize) {
        (**self).packaging_finished(archive, entries)
    }
}
