//! The module catalog.
//!
//! The registry is populated once (built-ins, then any module directories)
//! and is read-only afterwards; the pipeline shares it behind an `Arc`.
//! Registration checks each descriptor in isolation. Whether dependency ids
//! exist is only known once every module is in, so that check belongs to the
//! resolver.

use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::domain::entities::module::ModuleDescriptor;
use crate::domain::entities::target::Target;
use crate::domain::error::DomainError;
use crate::domain::value_objects::{Category, ModuleId};

#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<ModuleId, Arc<ModuleDescriptor>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from descriptors, failing on the first bad one.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ModuleDescriptor>,
    ) -> Result<Self, DomainError> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Add a descriptor.
    ///
    /// # Errors
    ///
    /// - `DuplicateModule` if the id is taken
    /// - `InvalidDescriptor` listing every invariant the descriptor breaks
    pub fn register(&mut self, descriptor: ModuleDescriptor) -> Result<(), DomainError> {
        if self.modules.contains_key(&descriptor.id) {
            return Err(DomainError::DuplicateModule {
                id: descriptor.id.to_string(),
            });
        }
        descriptor.validate()?;
        self.modules.insert(descriptor.id.clone(), Arc::new(descriptor));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Arc<ModuleDescriptor>, DomainError> {
        ModuleId::parse(id)
            .ok()
            .and_then(|key| self.modules.get(&key))
            .cloned()
            .ok_or_else(|| DomainError::ModuleNotFound {
                id: id.to_string(),
                requested_by: "registry lookup".into(),
            })
    }

    pub fn find(&self, id: &ModuleId) -> Option<&Arc<ModuleDescriptor>> {
        self.modules.get(id)
    }

    /// Descriptors matching every given filter, in ascending id order.
    pub fn query(
        &self,
        category: Option<&Category>,
        target: Option<&Target>,
    ) -> Vec<Arc<ModuleDescriptor>> {
        self.modules
            .values()
            .filter(|m| category.is_none_or(|c| m.category.as_ref() == Some(c)))
            .filter(|m| target.is_none_or(|t| m.supports(t)))
            .cloned()
            .collect()
    }

    /// Baseline scaffold modules for a target, in ascending id order.
    pub fn baselines_for(&self, target: &Target) -> Vec<Arc<ModuleDescriptor>> {
        self.modules
            .values()
            .filter(|m| m.baseline && m.supports(target))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.modules.values()
    }

    /// Hex SHA-256 over every registered descriptor, in id order.
    ///
    /// Covers the whole descriptor, so editing a template, manifest entry,
    /// default or dependency changes it even when the version is not bumped.
    pub fn revision(&self) -> String {
        let mut hasher = Sha256::new();
        for module in self.modules.values() {
            let body = serde_json::to_vec(module.as_ref())
                .unwrap_or_else(|_| format!("{module:?}").into_bytes());
            hasher.update(module.key().as_bytes());
            hasher.update((body.len() as u64).to_le_bytes());
            hasher.update(&body);
        }
        hex::encode(hasher.finalize())
    }
}
