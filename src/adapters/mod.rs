// Adapters layer: concrete implementations of the domain ports.

pub mod listing;
pub mod progress;

pub use listing::{OllamaApiLister, OllamaCliLister};
#[cfg(feature = "cli")]
pub use progress::BarProgress;
pub use progress::{LogProgress, NoProgress};
