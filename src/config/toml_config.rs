use crate::config::{ExportConfig, ListingSource};
use crate::core::locator::TagStrategy;
use crate::core::manifest::DigestStrategy;
use crate::core::packager::ArchiveMode;
use crate::domain::model::ModelRef;
use crate::utils::error::{ExportError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// On-disk configuration file. Every field is optional; unset fields keep
/// the built-in defaults and command line flags override what is set here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub source: Option<SourceSection>,
    pub output: Option<OutputSection>,
    pub archive: Option<ArchiveSection>,
    pub listing: Option<ListingSection>,
    pub export: Option<ExportSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    pub base_dir: Option<PathBuf>,
    pub tag_strategy: Option<TagStrategy>,
    pub digest_strategy: Option<DigestStrategy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveSection {
    pub enabled: Option<bool>,
    pub mode: Option<ArchiveMode>,
    pub compression_level: Option<u32>,
    pub deterministic: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListingSection {
    pub source: Option<ListingSource>,
    pub program: Option<String>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportSection {
    /// Default selectors, used when none are given on the command line.
    pub models: Option<Vec<String>>,
    pub dry_run: Option<bool>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ExportError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ExportError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the value of the environment variable; unknown variables stay as-is.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn apply_to(&self, config: &mut ExportConfig) {
        if let Some(source) = &self.source {
            if let Some(base_dir) = &source.base_dir {
                config.base_dir = base_dir.clone();
            }
            if let Some(strategy) = source.tag_strategy {
                config.tag_strategy = strategy;
            }
            if let Some(strategy) = source.digest_strategy {
                config.digest_strategy = strategy;
            }
        }

        if let Some(dir) = self.output.as_ref().and_then(|o| o.dir.clone()) {
            config.output_dir = dir;
        }

        if let Some(archive) = &self.archive {
            if let Some(enabled) = archive.enabled {
                config.archive.enabled = enabled;
            }
            if let Some(mode) = archive.mode {
                config.archive.mode = mode;
            }
            if let Some(level) = archive.compression_level {
                config.archive.compression_level = level;
            }
            if let Some(deterministic) = archive.deterministic {
                config.archive.deterministic = deterministic;
            }
        }

        if let Some(listing) = &self.listing {
            if let Some(source) = listing.source {
                config.listing.source = source;
            }
            if let Some(program) = &listing.program {
                config.listing.program = program.clone();
            }
            if let Some(host) = &listing.host {
                config.listing.host = host.clone();
            }
        }

        if let Some(dry_run) = self.export.as_ref().and_then(|e| e.dry_run) {
            config.dry_run = dry_run;
        }
    }

    pub fn to_export_config(&self) -> ExportConfig {
        let mut config = ExportConfig::default();
        self.apply_to(&mut config);
        config
    }

    pub fn selectors(&self) -> Result<Vec<ModelRef>> {
        self.export
            .as_ref()
            .and_then(|e| e.models.as_ref())
            .map(|models| models.iter().map(|m| m.parse()).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
