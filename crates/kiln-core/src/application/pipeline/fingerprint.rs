//! Cache keys.

use sha2::{Digest, Sha256};

use crate::application::ports::CACHE_SCHEMA_VERSION;
use crate::domain::{GenerationRequest, ModuleId};

/// SHA-256 over everything that can change the generated artifact.
///
/// Ids are hashed in request order: the roots' order sets the resolved
/// order, which decides override winners, appended section order and auto
/// conflict winners. Output location and execution knobs (parallelism,
/// retries, dry run) do not affect the artifact and are left out.
pub fn fingerprint(request: &GenerationRequest, ids: &[ModuleId], registry_revision: &str) -> String {
    let mut hasher = Sha256::new();
    let mut field = |name: &str, value: &str| {
        hasher.update(name.as_bytes());
        hasher.update([0]);
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    };

    field("schema", &CACHE_SCHEMA_VERSION.to_string());
    field("registry", registry_revision);
    field("project", request.project_name());
    field("framework", request.framework().as_str());
    field("archetype", request.archetype().as_str());
    field("strictness", request.options().strictness.as_str());
    for id in ids {
        field("id", id.as_str());
    }

    for (name, value) in request.variables() {
        field("var", name);
        field("value", value);
    }

    hex::encode(hasher.finalize())
}
