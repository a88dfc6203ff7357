pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::cli::CliConfig;
pub use crate::config::{ExportConfig, ListingSource};

pub use crate::core::orchestrator::ExportOrchestrator;
pub use crate::domain::model::{ModelRef, RunSummary};
pub use crate::utils::error::{ExportError, Result};
