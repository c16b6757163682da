use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::entities::module::ModuleDescriptor;
use crate::domain::entities::target::Target;
use crate::domain::value_objects::ModuleId;
use crate::domain::version::Version;
use crate::domain::warning::Warning;

/// Lightweight `id@version` reference, used in results and cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleRef {
    pub id: ModuleId,
    pub version: Version,
}

impl From<&ModuleDescriptor> for ModuleRef {
    fn from(d: &ModuleDescriptor) -> Self {
        Self {
            id: d.id.clone(),
            version: d.version,
        }
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// Output of the resolver: a dependency-complete module list in topological
/// order (dependencies first), plus the warnings resolution produced.
///
/// Descriptors are shared with the registry, never copied.
#[derive(Debug, Clone)]
pub struct ResolvedModuleSet {
    target: Target,
    modules: Vec<Arc<ModuleDescriptor>>,
    warnings: Vec<Warning>,
}

impl ResolvedModuleSet {
    pub fn new(target: Target, modules: Vec<Arc<ModuleDescriptor>>, warnings: Vec<Warning>) -> Self {
        Self {
            target,
            modules,
            warnings,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn modules(&self) -> &[Arc<ModuleDescriptor>] {
        &self.modules
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.modules.iter().map(AsRef::as_ref)
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.iter().any(|m| m.id.as_str() == id)
    }

    /// Index of `id` in resolution order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.id.as_str() == id)
    }

    pub fn refs(&self) -> Vec<ModuleRef> {
        self.modules.iter().map(|m| ModuleRef::from(m.as_ref())).collect()
    }
}
