use std::path::PathBuf;

use crate::core::layout::StoreLayout;
use crate::domain::model::{BlobPath, Digest};

/// Maps digests to blob paths in the source and destination stores.
/// Existence is checked later, when the blob is copied.
pub struct BlobResolver {
    source_blobs: PathBuf,
    dest_blobs: PathBuf,
}

impl BlobResolver {
    pub fn new(source: &StoreLayout, destination: &StoreLayout) -> Self {
        Self {
            source_blobs: source.blobs_dir(),
            dest_blobs: destination.blobs_dir(),
        }
    }

    pub fn resolve(&self, digest: &Digest) -> BlobPath {
        let file_name = digest.blob_file_name();
        BlobPath {
            digest: digest.clone(),
            source_path: self.source_blobs.join(&file_name),
            dest_path: self.dest_blobs.join(file_name),
        }
    }
}
