pub mod common;
pub mod module;
pub mod module_config;
pub mod output;
pub mod request;
pub mod resolved;
pub mod target;

pub use crate::domain::DomainError;
pub use module::{ModuleDescriptor, ModuleDescriptorBuilder};
pub use request::{GenerationOptions, GenerationRequest};
pub use resolved::{ModuleRef, ResolvedModuleSet};
pub use target::Target;
