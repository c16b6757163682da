//! Infrastructure adapters for Kiln.
//!
//! This crate implements the ports defined in `kiln-core::application::ports`
//! and provides the module sources the CLI registers at startup.
//! It contains all external dependencies and I/O operations.

pub mod builtin_modules;
pub mod cache_store;
pub mod filesystem;
mod io;
pub mod module_loader;

// Re-export commonly used adapters
pub use cache_store::{FsCacheStore, MemoryCacheStore};
pub use filesystem::{LocalFilesystem, MemoryFilesystem};
pub use module_loader::{FilesystemModuleLoader, LoadError};
