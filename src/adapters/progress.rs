use std::path::Path;

use crate::domain::model::{BlobPath, ExportResult, ModelRef};
use crate::domain::ports::ProgressSink;

/// Reports progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn model_started(&self, model: &ModelRef, blob_count: usize) {
        tracing::info!("📦 Exporting {} ({} blobs)", model, blob_count);
    }

    fn blob_copied(&self, blob: &BlobPath, bytes: u64) {
        tracing::debug!("Copied {} ({} bytes)", blob.digest, bytes);
    }

    fn blob_failed(&self, blob: &BlobPath, reason: &str) {
        tracing::debug!("Failed {}: {}", blob.digest, reason);
    }

    fn model_finished(&self, result: &ExportResult) {
        tracing::info!(
            "Copied {} blobs, failed to copy {} blobs for {}",
            result.copied_count,
            result.failed_count,
            result.model_ref
        );
    }

    fn packaging_started(&self, archive: &Path) {
        tracing::info!("🗜️ Compressing into {}", archive.display());
    }

    fn packaging_finished(&self, archive: &Path, entries: usize) {
        tracing::info!("Archive {} written ({} entries)", archive.display(), entries);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn model_started(&self, _model: &ModelRef, _blob_count: usize) {}
    fn blob_copied(&self, _blob: &BlobPath, _bytes: u64) {}
    fn blob_failed(&self, _blob: &BlobPath, _reason: &str) {}
    fn model_finished(&self, _result: &ExportResult) {}
}

#[cfg(feature = "cli")]
pub use bar::BarProgress;

#[cfg(feature = "cli")]
mod bar {
    use super::*;
    use indicatif::{ProgressBar, ProgressStyle};
    use std::sync::Mutex;
    use std::time::Duration;

    const BAR_TEMPLATE: &str = "{spinner} {msg} [{bar:30}] {pos}/{len} blobs";

    /// Terminal progress bars: one per model, and a spinner while compressing.
    #[derive(Default)]
    pub struct BarProgress {
        current: Mutex<Option<ProgressBar>>,
    }

    impl BarProgress {
        pub fn new() -> Self {
            Self::default()
        }

        fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
            if let Ok(current) = self.current.lock() {
                if let Some(bar) = current.as_ref() {
                    f(bar);
                }
            }
        }

        fn replace(&self, bar: Option<ProgressBar>) {
            if let Ok(mut current) = self.current.lock() {
                if let Some(previous) = current.take() {
                    previous.finish_and_clear();
                }
                *current = bar;
            }
        }
    }

    impl ProgressSink for BarProgress {
        fn model_started(&self, model: &ModelRef, blob_count: usize) {
            let bar = ProgressBar::new(blob_count as u64);
            if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
                bar.set_style(style.progress_chars("=> "));
            }
            bar.set_message(model.to_string());
            self.replace(Some(bar));
        }

        fn blob_copied(&self, _blob: &BlobPath, _bytes: u64) {
            self.with_bar(|bar| bar.inc(1));
        }

        fn blob_failed(&self, blob: &BlobPath, reason: &str) {
            self.with_bar(|bar| {
                bar.println(format!("  ⚠️ {}: {}", blob.digest, reason));
                bar.inc(1);
            });
        }

        fn model_finished(&self, result: &ExportResult) {
            self.with_bar(|bar| {
                bar.finish_with_message(format!(
                    "{}: {} copied, {} failed",
                    result.model_ref, result.copied_count, result.failed_count
                ))
            });
            if let Ok(mut current) = self.current.lock() {
                current.take();
            }
        }

        fn packaging_started(&self, archive: &Path) {
            let spinner = ProgressBar::new_spinner();
            spinner.set_message(format!("Compressing {}...", archive.display()));
            spinner.enable_steady_tick(Duration::from_millis(100));
            self.replace(Some(spinner));
        }

        fn packaging_finished(&self, archive: &Path, entries: usize) {
            self.with_bar(|bar| {
                bar.finish_with_message(format!(
                    "Compressed {} entries into {}",
                    entries,
                    archive.display()
                ))
            });
            if let Ok(mut current) = self.current.lock() {
                current.take();
            }
        }
    }
}
