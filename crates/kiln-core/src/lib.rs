//! Kiln Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for Kiln, a
//! composition engine that builds projects out of independently-authored
//! feature modules.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             kiln-cli (CLI)              │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │          GenerationPipeline             │
//! │  validate → resolve → instantiate →     │
//! │  finalize (cache, dedup, retry, budget) │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Application Ports (Traits)         │
//! │        (Filesystem, CacheStore)         │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      kiln-adapters (Infrastructure)     │
//! └─────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │  Registry, Resolver, Instantiation      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kiln_core::prelude::*;
//!
//! let registry = Arc::new(ModuleRegistry::from_descriptors(descriptors)?);
//! let pipeline = GenerationPipeline::new(registry, cache, filesystem, PipelineConfig::default());
//!
//! let request = GenerationRequest::builder("shop")
//!     .archetype(Archetype::Business)
//!     .modules(["auth-jwt", "payment-stripe"])
//!     .build();
//! let result = pipeline.run(request).await;
//! ```

pub mod application;
pub mod domain;
pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        CacheStatus, GenerationPipeline, GenerationResult, PipelineConfig, PipelineMetrics,
        ports::{CacheEntry, CacheStore, Filesystem},
    };
    pub use crate::domain::{
        Archetype, Category, FileContribution, FileMap, Framework, GenerationOptions,
        GenerationRequest, Manifest, MergeStrategy, ModuleDescriptor, ModuleId, ModuleRegistry,
        Strictness, Target, TargetSupport, Warning,
    };
    pub use crate::error::{KilnError, KilnResult};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
