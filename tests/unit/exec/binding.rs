use super::*;
use std::collections::BTreeMap;

use crate::graph::model::{InputBinding, NodeId};

fn node_with_inputs(names: &[&str]) -> RenderNode {
    RenderNode {
        id: NodeId(1),
        kernel_function: "k".to_string(),
        inputs: names
            .iter()
            .enumerate()
            .map(|(index, name)| InputBinding {
                name: name.to_string(),
                producer: NodeId(100 + index as u64),
            })
            .collect(),
        params: BTreeMap::new(),
        output_spec: None,
    }
}

fn slots(plan: &BindingPlan, node: &RenderNode) -> Vec<(u32, String)> {
    plan.inputs
        .iter()
        .map(|binding| (binding.slot, node.inputs[binding.input_index].name.clone()))
        .collect()
}

#[test]
fn filter_binds_primary_to_slot_0_and_output_to_slot_1() {
    let node = node_with_inputs(&["input"]);
    let plan = plan_bindings(&node, KernelKind::Filter);
    assert_eq!(slots(&plan, &node), vec![(0, "input".to_string())]);
    assert_eq!(plan.output_slot, 1);
}

#[test]
fn generator_output_takes_slot_0() {
    let node = node_with_inputs(&[]);
    let plan = plan_bindings(&node, KernelKind::Generator);
    assert!(plan.inputs.is_empty());
    assert_eq!(plan.output_slot, 0);
}

#[test]
fn compositor_primaries_precede_output_slot() {
    let node = node_with_inputs(&["backdrop", "overlay", "mask"]);
    let plan = plan_bindings(&node, KernelKind::Compositor { arity: 2 });
    assert_eq!(
        slots(&plan, &node),
        vec![
            (0, "backdrop".to_string()),
            (1, "overlay".to_string()),
            (3, "mask".to_string()),
        ]
    );
    assert_eq!(plan.output_slot, 2);
}

#[test]
fn extras_bind_reserved_names_first_then_lexicographic() {
    // Declared deliberately out of final order.
    let node = node_with_inputs(&["input", "zebra", "faceMask", "alpha_ramp", "mask"]);
    let plan = plan_bindings(&node, KernelKind::Filter);
    assert_eq!(
        slots(&plan, &node),
        vec![
            (0, "input".to_string()),
            (2, "mask".to_string()),
            (3, "faceMask".to_string()),
            (4, "alpha_ramp".to_string()),
            (5, "zebra".to_string()),
        ]
    );
}

#[test]
fn plan_is_a_pure_function_of_node_shape() {
    let node = node_with_inputs(&["input", "mask", "ramp"]);
    let first = plan_bindings(&node, KernelKind::Filter);
    for _ in 0..16 {
        assert_eq!(plan_bindings(&node, KernelKind::Filter), first);
    }
}
