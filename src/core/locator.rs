use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::core::layout::StoreLayout;
use crate::domain::model::{ManifestHandle, ModelRef, TagEntry};
use crate::utils::error::{ExportError, Result};

/// How a tag is picked when the selector does not name one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum TagStrategy {
    /// Lexicographically last tag file. Approximates "latest" for tags that sort by date.
    #[default]
    Lexicographic,
    /// Most recently modified tag file.
    ModifiedTime,
}

/// Finds manifest files under `manifests/registry.ollama.ai/library`.
///
/// Model directories are matched by substring on their path relative to the
/// namespace root, so `llama` matches both `llama2` and `llama3`. All matches
/// are sorted and the first one wins; callers get a warning listing the rest.
pub struct ManifestLocator {
    namespace_root: PathBuf,
    strategy: TagStrategy,
}

impl ManifestLocator {
    pub fn new(layout: &StoreLayout, strategy: TagStrategy) -> Self {
        Self {
            namespace_root: layout.namespace_root(),
            strategy,
        }
    }

    pub fn locate(&self, model_ref: &ModelRef) -> Result<ManifestHandle> {
        let candidates = self.find_candidates(&model_ref.name)?;

        let Some((model_name, model_dir)) = candidates.first() else {
            return Err(ExportError::ModelNotFound {
                name: model_ref.name.clone(),
                available: self.available_models()?,
            });
        };

        if candidates.len() > 1 {
            let names: Vec<&str> = candidates.iter().map(|(name, _)| name.as_str()).collect();
            tracing::warn!(
                "⚠️ Selector '{}' matches {} model directories ({}), using '{}'",
                model_ref.name,
                candidates.len(),
                names.join(", "),
                model_name
            );
        }
        tracing::debug!("Model directory found: {}", model_dir.display());

        let tags = list_tags(model_dir)?;
        let tag = match &model_ref.tag {
            Some(tag) => tag.clone(),
            None => {
                let latest = self
                    .pick_tag(&tags)
                    .ok_or_else(|| ExportError::NoTagsError {
                        model: model_name.clone(),
                    })?;
                tracing::debug!("No tag given for {}, resolved to '{}'", model_name, latest);
                latest
            }
        };

        let path = model_dir.join(&tag);
        if tag.contains(['/', '\\']) || !path.is_file() {
            return Err(ExportError::TagNotFound {
                model: model_name.clone(),
                tag,
                available: tags,
            });
        }

        let relative_dir = model_dir
            .strip_prefix(&self.namespace_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| model_dir.clone());

        Ok(ManifestHandle {
            model_ref: ModelRef::new(model_name.clone(), Some(&tag)),
            path,
            relative_dir,
        })
    }

    /// Model directories (those holding at least one tag file), relative to the namespace root.
    pub fn available_models(&self) -> Result<Vec<String>> {
        if !self.namespace_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut models = Vec::new();
        for entry in WalkDir::new(&self.namespace_root)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if entry.file_type().is_dir() && has_tag_files(entry.path())? {
                models.push(relative_name(&self.namespace_root, entry.path()));
            }
        }
        models.sort();
        Ok(models)
    }

    fn find_candidates(&self, name: &str) -> Result<Vec<(String, PathBuf)>> {
        if !self.namespace_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for entry in WalkDir::new(&self.namespace_root)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let relative = relative_name(&self.namespace_root, entry.path());
            if relative.contains(name) {
                candidates.push((relative, entry.into_path()));
            }
        }
        candidates.sort();
        Ok(candidates)
    }

    fn pick_tag(&self, tags: &[TagEntry]) -> Option<String> {
        let picked = match self.strategy {
            TagStrategy::Lexicographic => tags.iter().max_by(|a, b| a.name.cmp(&b.name)),
            TagStrategy::ModifiedTime => tags
                .iter()
                .max_by(|a, b| a.modified.cmp(&b.modified).then(a.name.cmp(&b.name))),
        };
        picked.map(|t| t.name.clone())
    }
}

/// Tag files of a model directory, sorted by name.
pub fn list_tags(model_dir: &Path) -> Result<Vec<TagEntry>> {
    let mut tags = Vec::new();
    for entry in fs::read_dir(model_dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        tags.push(TagEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        });
    }
    tags.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(tags)
}

fn has_tag_files(dir: &Path) -> Result<bool> {
    for entry in fs::read_dir(dir)? {
        if entry?.file_type()?.is_file() {
            return Ok(true);
        }
    }
    Ok(false)
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
