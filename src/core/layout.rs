use std::path::{Path, PathBuf};

use crate::domain::model::Digest;

pub const REGISTRY_HOST: &str = "registry.ollama.ai";
pub const LIBRARY_NAMESPACE: &str = "library";
pub const MANIFESTS_DIR: &str = "manifests";
pub const BLOBS_DIR: &str = "blobs";
/// Destination trees nest the store under `<output>/models`.
pub const EXPORT_ROOT_DIR: &str = "models";

/// On-disk layout of an Ollama model store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn source(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: base_dir.into(),
        }
    }

    pub fn destination(output_dir: impl AsRef<Path>) -> Self {
        Self {
            root: output_dir.as_ref().join(EXPORT_ROOT_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifests_dir(&self) -> PathBuf {
        self.root.join(MANIFESTS_DIR)
    }

    /// `manifests/registry.ollama.ai/library`
    pub fn namespace_root(&self) -> PathBuf {
        self.manifests_dir()
            .join(REGISTRY_HOST)
            .join(LIBRARY_NAMESPACE)
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join(BLOBS_DIR)
    }

    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.blobs_dir().join(digest.blob_file_name())
    }

    pub fn manifest_path(&self, relative_dir: &Path, tag: &str) -> PathBuf {
        self.namespace_root().join(relative_dir).join(tag)
    }
}
