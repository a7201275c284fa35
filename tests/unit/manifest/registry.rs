use super::*;
use crate::manifest::model::FeatureDomain;

fn manifest(id: &str, category: &str) -> Arc<FeatureManifest> {
    Arc::new(FeatureManifest {
        schema_version: 1,
        id: id.to_string(),
        version: "1.0".to_string(),
        name: id.to_string(),
        category: category.to_string(),
        domain: FeatureDomain::Scene,
        inputs: vec![],
        parameters: vec![],
        kernel_function: Some("k".to_string()),
        passes: vec![],
    })
}

#[test]
fn install_then_lookup_and_list() {
    let registry = FeatureRegistry::new();
    registry
        .install(vec![manifest("a", "blur"), manifest("b", "blur"), manifest("c", "color")])
        .unwrap();

    assert_eq!(registry.len(), 3);
    assert_eq!(registry.lookup("b").unwrap().category, "blur");
    assert!(registry.lookup("missing").is_none());

    let blurs = registry.list_by_category("blur");
    let ids: Vec<&str> = blurs.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn install_collision_leaves_registry_unchanged() {
    let registry = FeatureRegistry::new();
    registry.install(vec![manifest("a", "blur")]).unwrap();

    let err = registry
        .install(vec![manifest("b", "blur"), manifest("a", "color")])
        .unwrap_err();
    match err {
        FxError::Validation(v) => assert_eq!(v.issues.len(), 1),
        other => panic!("unexpected error: {other}"),
    }

    // The failed batch must not have been partially applied.
    assert_eq!(registry.len(), 1);
    assert!(registry.lookup("b").is_none());
}

#[test]
fn replace_all_swaps_contents() {
    let registry = FeatureRegistry::new();
    registry.install(vec![manifest("a", "blur")]).unwrap();
    registry.replace_all(vec![manifest("z", "color")]);

    assert!(registry.lookup("a").is_none());
    assert_eq!(registry.lookup("z").unwrap().category, "color");
}

#[test]
fn snapshots_are_stable_across_later_installs() {
    let registry = FeatureRegistry::new();
    registry.install(vec![manifest("a", "blur")]).unwrap();
    let snapshot = registry.snapshot();
    registry.install(vec![manifest("b", "blur")]).unwrap();

    assert_eq!(snapshot.len(), 1);
    assert_eq!(registry.len(), 2);
}
