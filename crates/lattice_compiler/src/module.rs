//! One source file's compiled unit.

use lattice_common::ContentHash;
use lattice_meta::ComponentMeta;
use serde::{Deserialize, Serialize};

/// The compiled record of one source file.
///
/// Created on first parse and updated on every re-transform. Modules are
/// never removed from the module map within a process lifetime; a deleted
/// source file leaves its module behind marked stale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Module {
    /// Absolute, normalized path of the source file.
    pub path: String,
    /// Hash of the source text this record was extracted from.
    pub source_hash: ContentHash,
    /// Components declared in this file.
    pub cmps: Vec<ComponentMeta>,
    /// Whether this module came from an already-compiled collection
    /// rather than project source.
    pub is_collection_dependency: bool,
    /// Other files whose changes invalidate this module's cached
    /// transform (e.g. external style files it references).
    pub transform_deps: Vec<String>,
    /// Set when the source file was deleted; the record stays for
    /// reporting but is excluded from outputs.
    pub is_stale: bool,
}

impl Module {
    /// Creates a fresh module record for a parsed source file.
    pub fn new(path: impl Into<String>, source_hash: ContentHash) -> Self {
        Self {
            path: path.into(),
            source_hash,
            cmps: Vec::new(),
            is_collection_dependency: false,
            transform_deps: Vec::new(),
            is_stale: false,
        }
    }

    /// Whether any of this module's transform dependencies is in the
    /// given changed set.
    pub fn depends_on_changed(&self, changed_files: &std::collections::BTreeSet<String>) -> bool {
        self.transform_deps
            .iter()
            .any(|dep| changed_files.contains(dep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn transform_dep_intersection() {
        let mut module = Module::new("/src/a.tsx", ContentHash::from_bytes(b"a"));
        module.transform_deps.push("/src/a.css".to_string());

        let mut changed = BTreeSet::new();
        assert!(!module.depends_on_changed(&changed));
        changed.insert("/src/a.css".to_string());
        assert!(module.depends_on_changed(&changed));
    }
}
