// resmerge - incremental write-back of merged Android resources
//
// This is the library crate containing the merge writer and its supporting services.
// The binary crate (main.rs) replays merge plans from the command line.

pub mod config;
pub mod logging;
pub mod merge;
pub mod metrics;
pub mod models;
pub mod plan;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use merge::{ConsumerError, InterruptHandle, MergeConsumer, MergedResourceWriter, WriteError};
pub use metrics::WriteMetrics;
pub use models::{FileKind, MergeSettings, ResourceFile, ResourceItem, ResourceType, ValueNode};
pub use plan::{MergePlan, ReplaySummary, ResolvedPlan};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
