use crate::graph::model::RenderNode;
use crate::kernel::registry::KernelKind;

/// Extra-input names with reserved slot precedence, in binding order.
///
/// Extras beyond a kernel's primary inputs bind reserved names first, then
/// everything else lexicographically. Downstream kernel argument lists are
/// generated against this order, so it is a stable contract.
pub const RESERVED_EXTRA_INPUTS: &[&str] = &["mask", "faceMask"];

/// One input assigned to a physical slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotBinding {
    /// Physical slot index.
    pub slot: u32,
    /// Index into the node's declared input list.
    pub input_index: usize,
}

/// The full physical layout for one node dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingPlan {
    /// Input assignments in ascending slot order.
    pub inputs: Vec<SlotBinding>,
    /// Slot the output binds to.
    pub output_slot: u32,
}

/// Assign physical slots for a node, as a pure function of node structure.
///
/// The convention: a kernel of arity N binds the node's first N declared
/// inputs to slots `0..N` and its output to slot N (so a plain filter reads
/// slot 0 and writes slot 1, and a generator writes slot 0). Any further
/// named inputs bind from slot N+1 in a stable order: reserved names first
/// ([`RESERVED_EXTRA_INPUTS`]), then the rest sorted lexicographically. The
/// result is identical across runs for a given node shape; nothing here
/// depends on map iteration order.
pub fn plan_bindings(node: &RenderNode, kind: KernelKind) -> BindingPlan {
    let arity = kind.primary_arity();
    let primary_count = (arity as usize).min(node.inputs.len());

    let mut inputs = Vec::with_capacity(node.inputs.len());
    for (index, _) in node.inputs.iter().take(primary_count).enumerate() {
        inputs.push(SlotBinding {
            slot: index as u32,
            input_index: index,
        });
    }

    let mut extras: Vec<usize> = (primary_count..node.inputs.len()).collect();
    extras.sort_by(|&a, &b| {
        let ka = (extra_rank(&node.inputs[a].name), node.inputs[a].name.as_str());
        let kb = (extra_rank(&node.inputs[b].name), node.inputs[b].name.as_str());
        ka.cmp(&kb)
    });

    let output_slot = arity;
    let mut next_slot = output_slot + 1;
    for input_index in extras {
        inputs.push(SlotBinding {
            slot: next_slot,
            input_index,
        });
        next_slot += 1;
    }

    BindingPlan { inputs, output_slot }
}

fn extra_rank(name: &str) -> usize {
    RESERVED_EXTRA_INPUTS
        .iter()
        .position(|reserved| *reserved == name)
        .unwrap_or(RESERVED_EXTRA_INPUTS.len())
}

#[cfg(test)]
#[path = "../../tests/unit/exec/binding.rs"]
mod tests;
