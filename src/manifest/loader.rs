use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::compile::schedule::schedule_passes;
use crate::foundation::error::{FxError, FxResult, ValidationError, ValidationIssue};
use crate::kernel::registry::KernelRegistry;
use crate::manifest::model::FeatureManifest;

/// One named manifest source inside a bundle.
#[derive(Clone, Debug)]
pub struct ManifestSource {
    /// Source label used in diagnostics (file name or caller-provided).
    pub name: String,
    /// Raw JSON text.
    pub json: String,
}

/// A batch of manifest sources loaded and validated together.
#[derive(Clone, Debug, Default)]
pub struct ManifestBundle {
    sources: Vec<ManifestSource>,
}

impl ManifestBundle {
    /// Build a bundle from in-memory sources.
    pub fn from_sources(sources: Vec<ManifestSource>) -> Self {
        Self { sources }
    }

    /// Add one source.
    pub fn push(&mut self, name: impl Into<String>, json: impl Into<String>) {
        self.sources.push(ManifestSource {
            name: name.into(),
            json: json.into(),
        });
    }

    /// Read every `*.json` file under `dir` (non-recursive), in file-name
    /// order so diagnostics are reproducible.
    pub fn from_dir(dir: impl AsRef<Path>) -> FxResult<Self> {
        let dir = dir.as_ref();
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("reading manifest bundle dir {}", dir.display()))?
        {
            let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                names.push(path);
            }
        }
        names.sort();

        let mut bundle = Self::default();
        for path in names {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading manifest {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            bundle.push(name, json);
        }
        Ok(bundle)
    }

    /// Sources in this bundle.
    pub fn sources(&self) -> &[ManifestSource] {
        &self.sources
    }
}

/// Decode and validate a whole bundle against a kernel registry.
///
/// All-or-nothing: any validation failure aborts the batch, and the returned
/// [`ValidationError`] enumerates every violation found: duplicate ids (with
/// both colliding sources), unresolved kernels, illegal clip ports, malformed
/// pass graphs, not just the first. On success the manifests are returned as
/// shared, immutable values ready for [`FeatureRegistry::install`].
///
/// [`FeatureRegistry::install`]: crate::manifest::registry::FeatureRegistry::install
#[tracing::instrument(skip_all, fields(sources = bundle.sources().len()))]
pub fn load_manifests(
    bundle: &ManifestBundle,
    kernels: &KernelRegistry,
) -> FxResult<Vec<Arc<FeatureManifest>>> {
    let mut issues = Vec::new();
    let mut decoded: Vec<(String, FeatureManifest)> = Vec::new();

    for source in bundle.sources() {
        match serde_json::from_str::<FeatureManifest>(&source.json) {
            Ok(manifest) => decoded.push((source.name.clone(), manifest)),
            Err(err) => issues.push(ValidationIssue::Decode {
                source_name: source.name.clone(),
                message: err.to_string(),
            }),
        }
    }

    // Duplicate ids are a hard failure naming both contributors; first-seen
    // wins is not acceptable.
    let mut first_source_by_id: BTreeMap<&str, &str> = BTreeMap::new();
    for (source, manifest) in &decoded {
        if manifest.id.trim().is_empty() {
            continue;
        }
        match first_source_by_id.get(manifest.id.as_str()) {
            Some(first) => issues.push(ValidationIssue::DuplicateId {
                id: manifest.id.clone(),
                first_source: (*first).to_string(),
                second_source: source.clone(),
            }),
            None => {
                first_source_by_id.insert(manifest.id.as_str(), source.as_str());
            }
        }
    }

    let kernel_snapshot = kernels.snapshot();
    for (source, manifest) in &decoded {
        let structural = manifest.structural_issues(source);
        let structurally_sound = structural.is_empty();
        issues.extend(structural);

        for kernel in manifest.kernel_names() {
            if !kernel_snapshot.contains_key(kernel) {
                issues.push(ValidationIssue::UnresolvedKernel {
                    manifest: manifest.id.clone(),
                    kernel: kernel.to_string(),
                });
            }
        }

        // Only schedule structurally sound pass lists; a malformed list has
        // already been reported once.
        if structurally_sound
            && let Err(err) = schedule_passes(&manifest.id, &manifest.effective_passes())
        {
            issues.push(ValidationIssue::BadPassGraph {
                manifest: manifest.id.clone(),
                message: err.to_string(),
            });
        }
    }

    if !issues.is_empty() {
        tracing::warn!(count = issues.len(), "manifest bundle rejected");
        return Err(FxError::Validation(ValidationError::new(issues)));
    }

    Ok(decoded
        .into_iter()
        .map(|(_, manifest)| Arc::new(manifest))
        .collect())
}

#[cfg(test)]
#[path = "../../tests/unit/manifest/loader.rs"]
mod tests;
