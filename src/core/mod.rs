pub mod blob;
pub mod executor;
pub mod layout;
pub mod locator;
pub mod manifest;
pub mod orchestrator;
pub mod packager;
pub mod planner;

pub use crate::domain::model::{
    BlobPath, Digest, ExportPlan, ExportResult, ManifestHandle, ModelOutcome, ModelRef, RunSummary,
};
pub use crate::domain::ports::{ModelLister, ProgressSink};
pub use crate::utils::error::Result;
