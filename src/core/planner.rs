use crate::core::blob::BlobResolver;
use crate::core::layout::StoreLayout;
use crate::domain::model::{Digest, ExportPlan, ManifestHandle};

/// Builds per-model export plans. Pure: no filesystem access.
pub struct ExportPlanner {
    destination: StoreLayout,
    resolver: BlobResolver,
}

impl ExportPlanner {
    pub fn new(source: &StoreLayout, destination: &StoreLayout) -> Self {
        Self {
            destination: destination.clone(),
            resolver: BlobResolver::new(source, destination),
        }
    }

    pub fn plan(&self, handle: &ManifestHandle, digests: &[Digest]) -> ExportPlan {
        ExportPlan {
            model_ref: handle.model_ref.clone(),
            manifest_src: handle.path.clone(),
            manifest_dest: self
                .destination
                .manifest_path(&handle.relative_dir, handle.tag()),
            blobs: digests.iter().map(|d| self.resolver.resolve(d)).collect(),
        }
    }
}
