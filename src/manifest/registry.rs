use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::foundation::error::{FxError, FxResult, ValidationError, ValidationIssue};
use crate::manifest::model::FeatureManifest;

type Snapshot = Arc<BTreeMap<String, Arc<FeatureManifest>>>;

/// Concurrency-safe store of validated feature manifests.
///
/// A single-writer store: installation happens once at startup (or on an
/// explicit reload), after which reads take a copy-on-write snapshot and never
/// hold a lock across work. The handle is passed explicitly to compiler and
/// executor calls; there is no ambient global registry.
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    inner: RwLock<Snapshot>,
}

impl FeatureRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current read snapshot. Cheap (`Arc` clone); safe to hold while working.
    pub fn snapshot(&self) -> Snapshot {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Install a validated batch atomically, failing if any id is already
    /// registered. On failure the registry is unchanged.
    pub fn install(&self, batch: Vec<Arc<FeatureManifest>>) -> FxResult<()> {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut issues = Vec::new();
        for manifest in &batch {
            if guard.contains_key(&manifest.id) {
                issues.push(ValidationIssue::DuplicateId {
                    id: manifest.id.clone(),
                    first_source: "registry".to_string(),
                    second_source: "install batch".to_string(),
                });
            }
        }
        if !issues.is_empty() {
            return Err(FxError::Validation(ValidationError::new(issues)));
        }

        let mut next = (**guard).clone();
        for manifest in batch {
            next.insert(manifest.id.clone(), manifest);
        }
        *guard = Arc::new(next);
        Ok(())
    }

    /// Replace the whole registry contents (explicit reload).
    pub fn replace_all(&self, batch: Vec<Arc<FeatureManifest>>) {
        let next: BTreeMap<String, Arc<FeatureManifest>> = batch
            .into_iter()
            .map(|manifest| (manifest.id.clone(), manifest))
            .collect();
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(next);
    }

    /// Look up a manifest by id.
    pub fn lookup(&self, id: &str) -> Option<Arc<FeatureManifest>> {
        self.snapshot().get(id).cloned()
    }

    /// All manifests in a category, in id order.
    pub fn list_by_category(&self, category: &str) -> Vec<Arc<FeatureManifest>> {
        self.snapshot()
            .values()
            .filter(|manifest| manifest.category == category)
            .cloned()
            .collect()
    }

    /// Number of registered manifests.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/manifest/registry.rs"]
mod tests;
