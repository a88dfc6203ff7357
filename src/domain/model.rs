use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::utils::error::ExportError;

/// A `name[:tag]` selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    pub name: String,
    pub tag: Option<String>,
}

impl ModelRef {
    pub fn new(name: impl Into<String>, tag: Option<&str>) -> Self {
        Self {
            name: name.into(),
            tag: tag.filter(|t| !t.is_empty()).map(str::to_string),
        }
    }

    /// File-name friendly form, used for per-model archive names.
    pub fn file_stem(&self) -> String {
        self.to_string().replace([':', '/'], "-")
    }
}

impl FromStr for ModelRef {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selector = s.trim();
        let (name, tag) = match selector.split_once(':') {
            Some((name, tag)) => (name, Some(tag)),
            None => (selector, None),
        };

        if name.is_empty() {
            return Err(ExportError::InvalidSelector {
                selector: s.to_string(),
                reason: "model name cannot be empty".to_string(),
            });
        }
        if tag.is_some_and(|t| t.contains(':')) {
            return Err(ExportError::InvalidSelector {
                selector: s.to_string(),
                reason: "expected at most one ':' between name and tag".to_string(),
            });
        }

        Ok(ModelRef::new(name, tag))
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{}", self.name, tag),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A manifest found on the source store. The tag of `model_ref` is always resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestHandle {
    pub model_ref: ModelRef,
    pub path: PathBuf,
    /// Model directory relative to the namespace root (`library/`).
    pub relative_dir: PathBuf,
}

impl ManifestHandle {
    pub fn tag(&self) -> &str {
        self.model_ref.tag.as_deref().unwrap_or_default()
    }
}

/// Content address of a blob, e.g. `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest {
    pub algorithm: String,
    pub hex: String,
}

impl Digest {
    pub fn new(algorithm: impl Into<String>, hex: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            hex: hex.into(),
        }
    }

    /// Blob store file name: `<algorithm>-<hex>`.
    pub fn blob_file_name(&self) -> String {
        format!("{}-{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((algorithm, hex))
                if is_algorithm_name(algorithm)
                    && !hex.is_empty()
                    && hex.chars().all(|c| c.is_ascii_hexdigit()) =>
            {
                Ok(Digest::new(algorithm, hex.to_ascii_lowercase()))
            }
            _ => Err(ExportError::ManifestParseError {
                message: format!("invalid digest '{}'", s),
            }),
        }
    }
}

/// Algorithm names end up in blob file names, so only `[a-z0-9]+` is accepted.
fn is_algorithm_name(algorithm: &str) -> bool {
    !algorithm.is_empty()
        && algorithm
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobPath {
    pub digest: Digest,
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPlan {
    pub model_ref: ModelRef,
    pub manifest_src: PathBuf,
    pub manifest_dest: PathBuf,
    pub blobs: Vec<BlobPath>,
}

impl ExportPlan {
    pub fn missing_blobs(&self) -> usize {
        self.blobs.iter().filter(|b| !b.source_path.is_file()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportResult {
    pub model_ref: ModelRef,
    pub copied_count: usize,
    pub failed_count: usize,
    pub manifest_copied: bool,
    pub bytes_copied: u64,
    pub abort_reason: Option<String>,
}

impl ExportResult {
    pub fn new(model_ref: ModelRef) -> Self {
        Self {
            model_ref,
            copied_count: 0,
            failed_count: 0,
            manifest_copied: false,
            bytes_copied: 0,
            abort_reason: None,
        }
    }

    /// A model counts as exported once its manifest and at least one blob landed.
    pub fn is_exported(&self) -> bool {
        self.manifest_copied && self.copied_count > 0
    }
}

/// A tag file as shown when a requested tag is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagEntry {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl fmt::Display for TagEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modified {
            Some(ts) => write!(
                f,
                "{:<24} {:>8} bytes  {}",
                self.name,
                self.size,
                ts.format("%Y-%m-%d %H:%M")
            ),
            None => write!(f, "{:<24} {:>8} bytes", self.name, self.size),
        }
    }
}

/// Where a model's export stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportStage {
    Locate,
    ReadManifest,
    ParseManifest,
    CopyManifest,
    Package,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportStage::Locate => "locate",
            ExportStage::ReadManifest => "read manifest",
            ExportStage::ParseManifest => "parse manifest",
            ExportStage::CopyManifest => "copy manifest",
            ExportStage::Package => "package",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ModelOutcome {
    Exported(ExportResult),
    Planned {
        model_ref: ModelRef,
        blobs: usize,
        missing: usize,
    },
    Failed {
        model_ref: ModelRef,
        stage: ExportStage,
        reason: String,
    },
}

impl ModelOutcome {
    pub fn model_ref(&self) -> &ModelRef {
        match self {
            ModelOutcome::Exported(result) => &result.model_ref,
            ModelOutcome::Planned { model_ref, .. } | ModelOutcome::Failed { model_ref, .. } => {
                model_ref
            }
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            ModelOutcome::Exported(result) => result.is_exported(),
            ModelOutcome::Planned { .. } => true,
            ModelOutcome::Failed { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<ModelOutcome>,
    pub archives: Vec<PathBuf>,
    pub blob_tree_empty: bool,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn total_copied(&self) -> usize {
        self.exported_results().map(|r| r.copied_count).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.exported_results().map(|r| r.failed_count).sum()
    }

    pub fn exported_results(&self) -> impl Iterator<Item = &ExportResult> {
        self.outcomes.iter().filter_map(|o| match o {
            ModelOutcome::Exported(result) => Some(result),
            _ => None,
        })
    }

    /// 0 when every model succeeded, 2 when only some did, 1 when none did.
    pub fn exit_code(&self) -> i32 {
        let succeeded = self.succeeded();
        if succeeded == 0 {
            1
        } else if succeeded == self.outcomes.len() {
            0
        } else {
            2
        }
    }
}
