use super::*;
use crate::foundation::error::FxError;
use crate::manifest::model::{FeatureDomain, PortDefinition, PortKind};

fn blur_manifest() -> FeatureManifest {
    serde_json::from_str(
        r#"{
            "id": "blurH+blurV",
            "domain": "clip",
            "inputs": [{"name": "source", "kind": "image"}],
            "parameters": [
                {"name": "radius", "type": "float", "min": 0.0, "max": 64.0, "default": 2.0}
            ],
            "passes": [
                {"logicalName": "horizontal", "kernelFunction": "blur_h", "inputs": ["source"], "outputName": "tmp"},
                {"logicalName": "vertical", "kernelFunction": "blur_v", "inputs": ["tmp"], "outputName": "out"}
            ]
        }"#,
    )
    .unwrap()
}

fn external(entries: &[(&str, NodeId)]) -> BTreeMap<String, NodeId> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn two_pass_chain_wires_intermediate_and_roots_at_last_pass() {
    let manifest = blur_manifest();
    let ids = NodeIdGen::new();
    let node_a = ids.next_id();

    let overrides = BTreeMap::from([("radius".to_string(), ParamValue::Float(8.0))]);
    let fragment = compile_feature(
        &manifest,
        &external(&[("source", node_a)]),
        &overrides,
        &ids,
    )
    .unwrap();

    assert_eq!(fragment.nodes.len(), 2);
    let first = &fragment.nodes[0];
    let second = &fragment.nodes[1];

    assert_eq!(first.kernel_function, "blur_h");
    assert_eq!(first.input("source"), Some(node_a));
    assert_eq!(second.kernel_function, "blur_v");
    assert_eq!(second.input("tmp"), Some(first.id));
    assert_eq!(fragment.root, second.id);

    // Both nodes carry the fully resolved parameter map.
    assert_eq!(first.params.get("radius"), Some(&ParamValue::Float(8.0)));
    assert_eq!(second.params.get("radius"), Some(&ParamValue::Float(8.0)));
}

#[test]
fn unbound_port_fails_before_any_node_is_emitted() {
    let manifest = blur_manifest();
    let ids = NodeIdGen::new();
    let err = compile_feature(&manifest, &BTreeMap::new(), &BTreeMap::new(), &ids).unwrap_err();
    match err {
        FxError::Compile(CompileError::UnboundInput { feature, input }) => {
            assert_eq!(feature, "blurH+blurV");
            assert_eq!(input, "source");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn out_of_range_override_is_an_error_not_a_clamp() {
    let manifest = blur_manifest();
    let ids = NodeIdGen::new();
    let overrides = BTreeMap::from([("radius".to_string(), ParamValue::Float(65.0))]);
    let err = compile_feature(
        &manifest,
        &external(&[("source", ids.next_id())]),
        &overrides,
        &ids,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        FxError::Compile(CompileError::ParameterOutOfRange { value, max, .. })
            if value == 65.0 && max == 64.0
    ));
}

#[test]
fn unknown_override_is_rejected() {
    let manifest = blur_manifest();
    let ids = NodeIdGen::new();
    let overrides = BTreeMap::from([("sigma".to_string(), ParamValue::Float(1.0))]);
    let err = compile_feature(
        &manifest,
        &external(&[("source", ids.next_id())]),
        &overrides,
        &ids,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        FxError::Compile(CompileError::UnknownParameter { name, .. }) if name == "sigma"
    ));
}

#[test]
fn type_mismatch_is_rejected() {
    let manifest = blur_manifest();
    let ids = NodeIdGen::new();
    let overrides = BTreeMap::from([("radius".to_string(), ParamValue::Bool(true))]);
    let err = compile_feature(
        &manifest,
        &external(&[("source", ids.next_id())]),
        &overrides,
        &ids,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        FxError::Compile(CompileError::ParameterType { name, .. }) if name == "radius"
    ));
}

#[test]
fn shorthand_manifest_compiles_to_one_node_with_ports_in_order() {
    let manifest = FeatureManifest {
        schema_version: 1,
        id: "tint".to_string(),
        version: String::new(),
        name: String::new(),
        category: String::new(),
        domain: FeatureDomain::Clip,
        inputs: vec![
            PortDefinition {
                name: "source".to_string(),
                kind: PortKind::Image,
            },
            PortDefinition {
                name: "faceMask".to_string(),
                kind: PortKind::Mask,
            },
        ],
        parameters: vec![],
        kernel_function: Some("tint_main".to_string()),
        passes: vec![],
    };

    let ids = NodeIdGen::new();
    let source = ids.next_id();
    let mask = ids.next_id();
    let fragment = compile_feature(
        &manifest,
        &external(&[("source", source), ("faceMask", mask)]),
        &BTreeMap::new(),
        &ids,
    )
    .unwrap();

    assert_eq!(fragment.nodes.len(), 1);
    let node = &fragment.nodes[0];
    let names: Vec<&str> = node.inputs.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["source", "faceMask"]);
    assert_eq!(node.input("source"), Some(source));
    assert_eq!(node.input("faceMask"), Some(mask));
}

#[test]
fn parallel_compilation_yields_collision_free_fragments() {
    let manifest = Arc::new(blur_manifest());
    let ids = NodeIdGen::new();
    let upstream = ids.next_id();

    let requests: Vec<CompileRequest> = (0..8)
        .map(|_| CompileRequest {
            manifest: manifest.clone(),
            external_inputs: external(&[("source", upstream)]),
            overrides: BTreeMap::new(),
        })
        .collect();

    let fragments = compile_features(&requests, &ids).unwrap();
    assert_eq!(fragments.len(), 8);

    let mut seen = std::collections::BTreeSet::new();
    for fragment in &fragments {
        assert_eq!(fragment.nodes.len(), 2);
        for node in &fragment.nodes {
            assert!(seen.insert(node.id), "node id {} reused", node.id);
        }
    }
}
