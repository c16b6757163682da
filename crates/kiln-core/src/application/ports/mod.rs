//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `kiln-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by the pipeline, implemented by infrastructure
//!   - `Filesystem`: materializing the generated project
//!   - `CacheStore`: persisted generation results keyed by fingerprint
//!
//! - **Driving (Input) Ports**: `GenerationPipeline::run`, called by the CLI

pub mod output;

pub use output::{CACHE_SCHEMA_VERSION, CacheEntry, CacheStore, Filesystem};

#[cfg(test)]
pub use output::{MockCacheStore, MockFilesystem};
