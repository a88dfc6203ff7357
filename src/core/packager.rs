use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, HeaderMode};
use walkdir::WalkDir;

use crate::core::layout::EXPORT_ROOT_DIR;
use crate::domain::model::ModelRef;
use crate::utils::error::{ExportError, Result};

pub const ARCHIVE_PREFIX: &str = "ollama-export";
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveMode {
    /// One archive holding every exported model.
    #[default]
    Combined,
    /// One archive per exported model.
    PerModel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub mode: ArchiveMode,
    pub compression_level: u32,
    /// Zero out mtimes and ownership so identical trees give identical archives.
    pub deterministic: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ArchiveMode::Combined,
            compression_level: 6,
            deterministic: false,
        }
    }
}

/// `ollama-export.tar.gz`, or `ollama-export-<model>.tar.gz` for a single model.
pub fn archive_file_name(model: Option<&ModelRef>) -> String {
    match model {
        Some(model) => format!("{}-{}.{}", ARCHIVE_PREFIX, model.file_stem(), ARCHIVE_EXTENSION),
        None => format!("{}.{}", ARCHIVE_PREFIX, ARCHIVE_EXTENSION),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub archive: PathBuf,
    pub entries: usize,
}

/// Writes gzip-compressed tar archives of a destination tree.
///
/// Entry names are relative to the destination root (`models/...`) and
/// appear in sorted path order, directories before their contents. File
/// bodies are streamed from disk.
pub struct Packager {
    compression_level: u32,
    deterministic: bool,
}

impl Packager {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            compression_level: config.compression_level,
            deterministic: config.deterministic,
        }
    }

    /// Archives everything under `<dest_root>/models`.
    pub fn pack_tree(&self, dest_root: &Path, archive_path: &Path) -> Result<PackSummary> {
        let tree_root = dest_root.join(EXPORT_ROOT_DIR);
        let mut entries = Vec::new();
        if tree_root.is_dir() {
            for entry in WalkDir::new(&tree_root).sort_by_file_name() {
                entries.push(entry?.into_path());
            }
        }
        self.write_archive(dest_root, &entries, archive_path)
    }

    /// Archives only `files` (absolute paths inside `dest_root`) plus their parent directories.
    pub fn pack_files(
        &self,
        dest_root: &Path,
        files: &[PathBuf],
        archive_path: &Path,
    ) -> Result<PackSummary> {
        let mut entries = BTreeSet::new();
        for file in files {
            let relative = relative_to(dest_root, file)?;
            for ancestor in relative.ancestors().skip(1) {
                if !ancestor.as_os_str().is_empty() {
                    entries.insert(dest_root.join(ancestor));
                }
            }
            entries.insert(file.clone());
        }
        let entries: Vec<PathBuf> = entries.into_iter().collect();
        self.write_archive(dest_root, &entries, archive_path)
    }

    fn write_archive(
        &self,
        dest_root: &Path,
        entries: &[PathBuf],
        archive_path: &Path,
    ) -> Result<PackSummary> {
        if let Some(parent) = archive_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(archive_path)?;
        let encoder = GzEncoder::new(
            BufWriter::new(file),
            Compression::new(self.compression_level),
        );
        let mut builder = Builder::new(encoder);
        if self.deterministic {
            builder.mode(HeaderMode::Deterministic);
        }

        for path in entries {
            let name = relative_to(dest_root, path)?;
            if path.is_dir() {
                builder.append_dir(name, path)?;
            } else {
                builder.append_path_with_name(path, name)?;
            }
        }

        let encoder = builder.into_inner()?;
        let mut writer = encoder.finish()?;
        writer.flush()?;

        tracing::debug!(
            "Wrote {} entries to {}",
            entries.len(),
            archive_path.display()
        );
        Ok(PackSummary {
            archive: archive_path.to_path_buf(),
            entries: entries.len(),
        })
    }
}

fn relative_to<'p>(root: &Path, path: &'p Path) -> Result<&'p Path> {
    path.strip_prefix(root).map_err(|_| {
        ExportError::IoError(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is outside {}", path.display(), root.display()),
        ))
    })
}
