//! Core domain layer for Kiln.
//!
//! Pure composition logic: module descriptors, the registry, dependency
//! resolution, and instantiation (render + merge). Nothing here performs I/O,
//! spawns tasks or logs; those concerns live in the application layer and
//! the adapters.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: resolution and instantiation are synchronous and pure
//! - **No I/O**: no filesystem, network, or clock access
//! - **Immutable descriptors**: registered modules are shared via `Arc`
//! - **Deterministic**: every map that reaches output is ordered

pub mod entities;
pub mod error;
pub mod instantiation;
pub mod registry;
pub mod render;
pub mod resolver;
pub mod validation;
pub mod value_objects;
pub mod version;
pub mod warning;

pub use entities::{
    common::{FileFormat, RelativePath},
    module::{
        ConflictRule, DependencySpec, FileContribution, MergeStrategy, ModuleDescriptor,
        ModuleDescriptorBuilder,
    },
    module_config::{AuthStrategy, ConfigIssue, ModuleConfig},
    output::{FileMap, Instantiation, Manifest, ManifestEntry},
    request::{GenerationOptions, GenerationRequest, GenerationRequestBuilder},
    resolved::{ModuleRef, ResolvedModuleSet},
    target::{Target, TargetMatcher, TargetMatcherBuilder, TargetSupport},
};

pub use error::{DomainError, ErrorCategory};
pub use instantiation::{RenderedFile, RenderedModule};
pub use registry::ModuleRegistry;
pub use render::RenderContext;
pub use resolver::{Resolver, resolve};
pub use validation::DomainValidator;
pub use value_objects::{Archetype, Category, Framework, ModuleId, Strictness};
pub use version::{Version, VersionRange};
pub use warning::Warning;
