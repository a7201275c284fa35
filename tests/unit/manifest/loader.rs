use super::*;
use crate::kernel::registry::{DispatchArgs, KernelKind, KernelRegistry, KernelSpec};

fn kernels(names: &[&str]) -> KernelRegistry {
    let registry = KernelRegistry::new();
    for name in names {
        registry.register(KernelSpec::new(
            *name,
            KernelKind::Filter,
            Arc::new(|_args: &mut DispatchArgs<'_>| Ok(())),
        ));
    }
    registry
}

fn bundle(sources: &[(&str, &str)]) -> ManifestBundle {
    let mut bundle = ManifestBundle::default();
    for (name, json) in sources {
        bundle.push(*name, *json);
    }
    bundle
}

const GLOW: &str = r#"{
    "id": "glow",
    "domain": "clip",
    "inputs": [{"name": "source", "kind": "image"}],
    "kernelFunction": "glow_main"
}"#;

#[test]
fn valid_bundle_loads_all_manifests() {
    let registry = kernels(&["glow_main"]);
    let loaded = load_manifests(&bundle(&[("glow.json", GLOW)]), &registry).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, "glow");
}

#[test]
fn duplicate_id_names_both_sources() {
    let registry = kernels(&["glow_main"]);
    let err = load_manifests(
        &bundle(&[("first.json", GLOW), ("second.json", GLOW)]),
        &registry,
    )
    .unwrap_err();

    let FxError::Validation(validation) = err else {
        panic!("expected validation error");
    };
    assert!(validation.issues.iter().any(|issue| matches!(
        issue,
        ValidationIssue::DuplicateId { id, first_source, second_source }
            if id == "glow" && first_source == "first.json" && second_source == "second.json"
    )));
}

#[test]
fn unresolved_kernel_names_the_manifest() {
    let registry = kernels(&[]);
    let err = load_manifests(&bundle(&[("glow.json", GLOW)]), &registry).unwrap_err();

    let FxError::Validation(validation) = err else {
        panic!("expected validation error");
    };
    assert!(validation.issues.iter().any(|issue| matches!(
        issue,
        ValidationIssue::UnresolvedKernel { manifest, kernel }
            if manifest == "glow" && kernel == "glow_main"
    )));
}

#[test]
fn every_violation_is_reported_in_one_pass() {
    let registry = kernels(&["glow_main"]);
    let broken_clip = r#"{
        "id": "warp-clip",
        "domain": "clip",
        "inputs": [{"name": "reference", "kind": "image"}],
        "kernelFunction": "missing_kernel"
    }"#;
    let undecodable = r#"{"id": 42}"#;

    let err = load_manifests(
        &bundle(&[
            ("glow.json", GLOW),
            ("glow2.json", GLOW),
            ("warp.json", broken_clip),
            ("junk.json", undecodable),
        ]),
        &registry,
    )
    .unwrap_err();

    let FxError::Validation(validation) = err else {
        panic!("expected validation error");
    };
    // One duplicate id, one illegal clip port, one unresolved kernel, one
    // decode failure: all enumerated together.
    assert!(validation.issues.iter().any(|i| matches!(i, ValidationIssue::DuplicateId { .. })));
    assert!(validation.issues.iter().any(|i| matches!(i, ValidationIssue::IllegalClipPort { .. })));
    assert!(validation.issues.iter().any(|i| matches!(i, ValidationIssue::UnresolvedKernel { .. })));
    assert!(validation.issues.iter().any(|i| matches!(i, ValidationIssue::Decode { .. })));
}

#[test]
fn cyclic_pass_graph_is_rejected_at_load() {
    let registry = kernels(&["ka", "kb"]);
    let cyclic = r#"{
        "id": "loop",
        "domain": "scene",
        "passes": [
            {"logicalName": "a", "kernelFunction": "ka", "inputs": ["out_b"], "outputName": "out_a"},
            {"logicalName": "b", "kernelFunction": "kb", "inputs": ["out_a"], "outputName": "out_b"}
        ]
    }"#;

    let err = load_manifests(&bundle(&[("loop.json", cyclic)]), &registry).unwrap_err();
    let FxError::Validation(validation) = err else {
        panic!("expected validation error");
    };
    assert!(validation.issues.iter().any(|issue| matches!(
        issue,
        ValidationIssue::BadPassGraph { manifest, .. } if manifest == "loop"
    )));
}
