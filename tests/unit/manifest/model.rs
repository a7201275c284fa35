use super::*;

fn decode(json: &str) -> FeatureManifest {
    serde_json::from_str(json).unwrap()
}

#[test]
fn schema_version_defaults_to_one_and_unknown_fields_are_ignored() {
    let manifest = decode(
        r#"{
            "id": "glow",
            "domain": "clip",
            "kernelFunction": "glow_main",
            "futureField": {"nested": true}
        }"#,
    );
    assert_eq!(manifest.schema_version, 1);
    assert_eq!(manifest.id, "glow");
    assert_eq!(manifest.kernel_function.as_deref(), Some("glow_main"));
}

#[test]
fn unknown_parameter_type_is_rejected_not_defaulted() {
    let err = serde_json::from_str::<FeatureManifest>(
        r#"{
            "id": "x",
            "domain": "scene",
            "kernelFunction": "k",
            "parameters": [{"name": "p", "type": "quaternion", "default": 0}]
        }"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("quaternion") || err.to_string().contains("unknown variant"));
}

#[test]
fn single_kernel_shorthand_desugars_to_one_pass_over_declared_ports() {
    let manifest = decode(
        r#"{
            "id": "tint",
            "domain": "clip",
            "inputs": [
                {"name": "source", "kind": "image"},
                {"name": "faceMask", "kind": "mask"}
            ],
            "kernelFunction": "tint_main"
        }"#,
    );
    let passes = manifest.effective_passes();
    assert_eq!(passes.len(), 1);
    assert_eq!(passes[0].kernel_function, "tint_main");
    assert_eq!(passes[0].inputs, vec!["source".to_string(), "faceMask".to_string()]);
}

#[test]
fn explicit_passes_win_over_shorthand() {
    let manifest = decode(
        r#"{
            "id": "two",
            "domain": "scene",
            "passes": [
                {"logicalName": "a", "kernelFunction": "ka", "inputs": [], "outputName": "out_a"},
                {"logicalName": "b", "kernelFunction": "kb", "inputs": ["out_a"], "outputName": "out_b"}
            ]
        }"#,
    );
    assert_eq!(manifest.effective_passes().len(), 2);
    assert_eq!(manifest.kernel_names(), vec!["ka", "kb"]);
}

#[test]
fn clip_domain_flags_ports_outside_the_clip_contract() {
    let manifest = decode(
        r#"{
            "id": "bad-clip",
            "domain": "clip",
            "inputs": [
                {"name": "source", "kind": "image"},
                {"name": "background", "kind": "image"}
            ],
            "kernelFunction": "k"
        }"#,
    );
    assert_eq!(manifest.illegal_clip_ports(), vec!["background"]);

    let issues = manifest.structural_issues("bad-clip.json");
    assert!(issues.iter().any(|issue| matches!(
        issue,
        ValidationIssue::IllegalClipPort { manifest, port }
            if manifest == "bad-clip" && port == "background"
    )));
}

#[test]
fn unresolvable_pass_input_is_a_structural_issue() {
    let manifest = decode(
        r#"{
            "id": "dangling",
            "domain": "scene",
            "passes": [
                {"logicalName": "a", "kernelFunction": "k", "inputs": ["nowhere"], "outputName": "out"}
            ]
        }"#,
    );
    let issues = manifest.structural_issues("dangling.json");
    assert_eq!(issues.len(), 1);
    assert!(matches!(&issues[0], ValidationIssue::BadPassGraph { manifest, .. } if manifest == "dangling"));
}

#[test]
fn default_params_carry_declared_defaults() {
    let manifest = decode(
        r#"{
            "id": "p",
            "domain": "scene",
            "kernelFunction": "k",
            "parameters": [
                {"name": "radius", "type": "float", "min": 0.0, "max": 64.0, "default": 4.0},
                {"name": "enabled", "type": "bool", "default": true},
                {"name": "mode", "type": "enum", "choices": ["soft", "hard"], "default": "soft"}
            ]
        }"#,
    );
    let params = manifest.default_params();
    assert_eq!(params.get("radius"), Some(&ParamValue::Float(4.0)));
    assert_eq!(params.get("enabled"), Some(&ParamValue::Bool(true)));
    assert_eq!(params.get("mode"), Some(&ParamValue::Choice("soft".to_string())));
}
