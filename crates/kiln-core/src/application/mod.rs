//! Application layer for Kiln.
//!
//! This layer contains:
//! - **Pipeline**: the generation use case (`GenerationPipeline`)
//! - **Ports**: interface definitions (traits) for external dependencies
//! - **Errors**: application-specific error types
//!
//! The application layer coordinates the domain layer but contains no
//! composition logic itself. All composition rules live in `crate::domain`.

pub mod error;
pub mod pipeline;
pub mod ports;

pub use pipeline::{
    CacheStatus, GenerationPipeline, GenerationResult, PipelineConfig, PipelineMetrics,
    RunMetrics, Stage,
};

// Re-export port traits (for adapter implementation)
pub use ports::{CACHE_SCHEMA_VERSION, CacheEntry, CacheStore, Filesystem};

pub use error::ApplicationError;
