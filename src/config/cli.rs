use crate::config::toml_config::TomlConfig;
use crate::config::{ExportConfig, ListingSource};
use crate::core::locator::TagStrategy;
use crate::core::manifest::DigestStrategy;
use crate::core::packager::ArchiveMode;
use crate::domain::model::ModelRef;
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "ollama-export")]
#[command(about = "Export installed Ollama models into a portable tar.gz archive")]
pub struct CliConfig {
    /// Models to export as name[:tag]; exports every installed model when empty
    #[arg(value_name = "MODEL[:TAG]")]
    pub models: Vec<String>,

    /// Ollama models directory (default: /var/lib/ollama)
    #[arg(short = 'o', long = "ollama-dir")]
    pub ollama_dir: Option<PathBuf>,

    /// Destination directory for the export (default: ./ollama-export)
    #[arg(short = 'd', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// How to pick a tag when none is given
    #[arg(long, value_enum)]
    pub tag_strategy: Option<TagStrategy>,

    /// How to find blob digests in a manifest
    #[arg(long, value_enum)]
    pub digest_strategy: Option<DigestStrategy>,

    /// One archive for all models, or one per model
    #[arg(long, value_enum)]
    pub archive_mode: Option<ArchiveMode>,

    /// Only build the export directory, skip the archive
    #[arg(long)]
    pub no_archive: bool,

    /// Gzip level, 0-9
    #[arg(long)]
    pub compression_level: Option<u32>,

    /// Reproducible archive headers (fixed mtime and ownership)
    #[arg(long)]
    pub deterministic: bool,

    /// Where to list installed models from
    #[arg(long, value_enum)]
    pub list_from: Option<ListingSource>,

    /// ollama executable used for listing
    #[arg(long)]
    pub ollama_bin: Option<String>,

    /// Ollama API address used for listing
    #[arg(long)]
    pub ollama_host: Option<String>,

    /// Resolve and plan the export without copying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long, visible_alias = "debug")]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

impl CliConfig {
    /// Defaults, then the TOML file (if any), then command line flags.
    pub fn resolve(&self) -> Result<(ExportConfig, Vec<ModelRef>)> {
        let toml = match &self.config {
            Some(path) => Some(TomlConfig::from_file(path)?),
            None => None,
        };

        let mut config = ExportConfig::default();
        if let Some(toml) = &toml {
            toml.apply_to(&mut config);
        }
        self.apply_to(&mut config);

        let selectors = if self.models.is_empty() {
            match &toml {
                Some(toml) => toml.selectors()?,
                None => Vec::new(),
            }
        } else {
            self.models
                .iter()
                .map(|m| m.parse())
                .collect::<Result<Vec<ModelRef>>>()?
        };

        Ok((config, selectors))
    }

    fn apply_to(&self, config: &mut ExportConfig) {
        if let Some(dir) = &self.ollama_dir {
            config.base_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(strategy) = self.tag_strategy {
            config.tag_strategy = strategy;
        }
        if let Some(strategy) = self.digest_strategy {
            config.digest_strategy = strategy;
        }
        if let Some(mode) = self.archive_mode {
            config.archive.mode = mode;
        }
        if self.no_archive {
            config.archive.enabled = false;
        }
        if let Some(level) = self.compression_level {
            config.archive.compression_level = level;
        }
        if self.deterministic {
            config.archive.deterministic = true;
        }
        if let Some(source) = self.list_from {
            config.listing.source = source;
        }
        if let Some(program) = &self.ollama_bin {
            config.listing.program = program.clone();
        }
        if let Some(host) = &self.ollama_host {
            config.listing.host = host.clone();
        }
        if self.dry_run {
            config.dry_run = true;
        }
    }
}
