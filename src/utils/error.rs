use std::path::PathBuf;
use thiserror::Error;

use crate::domain::model::TagEntry;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Directory walk failed: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid model selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Source store is missing {}", path.display())]
    SourceLayoutError { path: PathBuf },

    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputDirError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No model found matching '{name}'")]
    ModelNotFound { name: String, available: Vec<String> },

    #[error("No tag found for model '{model}'")]
    NoTagsError { model: String },

    #[error("Tag '{tag}' for model '{model}' does not exist")]
    TagNotFound {
        model: String,
        tag: String,
        available: Vec<TagEntry>,
    },

    #[error("Manifest parse error: {message}")]
    ManifestParseError { message: String },

    #[error("Model listing failed: {message}")]
    ModelListingError { message: String },

    #[error("No installed models to export")]
    NoModelsError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    SourceStore,
    Model,
    Manifest,
    Listing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ExportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ExportError::ConfigError { .. }
            | ExportError::InvalidConfigValueError { .. }
            | ExportError::InvalidSelector { .. } => ErrorCategory::Configuration,
            ExportError::SourceLayoutError { .. } => ErrorCategory::SourceStore,
            ExportError::ModelNotFound { .. }
            | ExportError::NoTagsError { .. }
            | ExportError::TagNotFound { .. } => ErrorCategory::Model,
            ExportError::ManifestParseError { .. } => ErrorCategory::Manifest,
            ExportError::ModelListingError { .. }
            | ExportError::NoModelsError
            | ExportError::ApiError(_) => ErrorCategory::Listing,
            ExportError::IoError(_)
            | ExportError::WalkError(_)
            | ExportError::OutputDirError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Model | ErrorCategory::Manifest => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Listing => ErrorSeverity::High,
            ErrorCategory::SourceStore | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Fatal errors stop the whole run; everything else is scoped to one model.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::Model | ErrorCategory::Manifest
        )
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ExportError::SourceLayoutError { .. } => {
                "Point --ollama-dir at the directory holding 'manifests' and 'blobs'".to_string()
            }
            ExportError::OutputDirError { .. } => {
                "Check that the output directory is writable".to_string()
            }
            ExportError::ModelNotFound { available, .. } if !available.is_empty() => {
                format!("Available models: {}", available.join(", "))
            }
            ExportError::ModelNotFound { .. } => {
                "Run 'ollama ls' to see the installed models".to_string()
            }
            ExportError::TagNotFound { available, .. } => {
                let names: Vec<&str> = available.iter().map(|t| t.name.as_str()).collect();
                format!("Available tags: {}", names.join(", "))
            }
            ExportError::NoTagsError { .. } => {
                "Re-pull the model or pass an explicit tag".to_string()
            }
            ExportError::ManifestParseError { .. } => {
                "Try --digest-strategy pattern-scan for manifests with unusual layouts".to_string()
            }
            ExportError::ModelListingError { .. } | ExportError::ApiError(_) => {
                "Make sure ollama is installed and running, or name the models explicitly"
                    .to_string()
            }
            ExportError::NoModelsError => "Pull a model first or name one explicitly".to_string(),
            ExportError::ConfigError { .. }
            | ExportError::InvalidConfigValueError { .. }
            | ExportError::InvalidSelector { .. } => {
                "Check the command line arguments and configuration file".to_string()
            }
            ExportError::IoError(_) | ExportError::WalkError(_) => {
                "Check file permissions and available disk space".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::SourceStore => format!("Ollama store not usable: {}", self),
            ErrorCategory::Model => format!("Model lookup failed: {}", self),
            ErrorCategory::Manifest => format!("Manifest unreadable: {}", self),
            ErrorCategory::Listing => format!("Could not enumerate models: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
