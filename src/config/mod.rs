#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::locator::TagStrategy;
use crate::core::manifest::DigestStrategy;
use crate::core::packager::ArchiveConfig;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_url, Validate,
};

pub const DEFAULT_BASE_DIR: &str = "/var/lib/ollama";
pub const DEFAULT_OUTPUT_DIR: &str = "./ollama-export";
pub const DEFAULT_OLLAMA_PROGRAM: &str = "ollama";
pub const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1:11434";

/// Where the list of installed models comes from when no selector is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ListingSource {
    /// Run `ollama ls`.
    #[default]
    Cli,
    /// Query the Ollama HTTP API (`/api/tags`).
    Api,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub source: ListingSource,
    pub program: String,
    pub host: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            source: ListingSource::Cli,
            program: DEFAULT_OLLAMA_PROGRAM.to_string(),
            host: DEFAULT_OLLAMA_HOST.to_string(),
        }
    }
}

/// Settings for one export run. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub base_dir: PathBuf,
    pub output_dir: PathBuf,
    pub tag_strategy: TagStrategy,
    pub digest_strategy: DigestStrategy,
    pub archive: ArchiveConfig,
    pub listing: ListingConfig,
    pub dry_run: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            tag_strategy: TagStrategy::default(),
            digest_strategy: DigestStrategy::default(),
            archive: ArchiveConfig::default(),
            listing: ListingConfig::default(),
            dry_run: false,
        }
    }
}

impl ExportConfig {
    pub fn new(base_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }
}

impl Validate for ExportConfig {
    fn validate(&self) -> Result<()> {
        validate_path("base_dir", &self.base_dir.to_string_lossy())?;
        validate_path("output_dir", &self.output_dir.to_string_lossy())?;
        validate_range(
            "archive.compression_level",
            self.archive.compression_level,
            0,
            9,
        )?;

        match self.listing.source {
            ListingSource::Cli => validate_non_empty_string("listing.program", &self.listing.program),
            ListingSource::Api => validate_url("listing.host", &self.listing.host),
        }
    }
}
