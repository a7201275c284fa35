use std::collections::{BTreeMap, BTreeSet};

use crate::foundation::error::CompileError;
use crate::manifest::model::FeaturePass;

/// Topologically order a feature's passes into a deterministic execution
/// sequence.
///
/// Pass P depends on pass Q when any of P's inputs equals Q's output name;
/// inputs naming a port or external context value are in-degree zero with
/// respect to the pass graph. Ties break by declaration index, never by
/// name, so the result matches the declared manifest order whenever no
/// dependency forces reordering.
///
/// Returns indices into `passes` in execution order, or
/// [`CompileError::CycleDetected`] with no partial result.
pub fn schedule_passes(
    feature: &str,
    passes: &[FeaturePass],
) -> Result<Vec<usize>, CompileError> {
    let mut producer_of: BTreeMap<&str, usize> = BTreeMap::new();
    for (index, pass) in passes.iter().enumerate() {
        if producer_of.insert(pass.output_name.as_str(), index).is_some() {
            return Err(CompileError::DuplicatePassOutput {
                feature: feature.to_string(),
                output: pass.output_name.clone(),
            });
        }
    }

    let mut in_degree = vec![0usize; passes.len()];
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); passes.len()];
    for (index, pass) in passes.iter().enumerate() {
        for input in &pass.inputs {
            if let Some(&producer) = producer_of.get(input.as_str()) {
                in_degree[index] += 1;
                consumers[producer].push(index);
            }
        }
    }

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(index, _)| index)
        .collect();

    let mut order = Vec::with_capacity(passes.len());
    while let Some(&index) = ready.first() {
        ready.remove(&index);
        order.push(index);
        for &consumer in &consumers[index] {
            in_degree[consumer] -= 1;
            if in_degree[consumer] == 0 {
                ready.insert(consumer);
            }
        }
    }

    if order.len() < passes.len() {
        let scheduled: BTreeSet<usize> = order.iter().copied().collect();
        let stuck = passes
            .iter()
            .enumerate()
            .filter(|(index, _)| !scheduled.contains(index))
            .map(|(_, pass)| pass.logical_name.clone())
            .collect();
        return Err(CompileError::CycleDetected {
            feature: feature.to_string(),
            stuck,
        });
    }

    Ok(order)
}

#[cfg(test)]
#[path = "../../tests/unit/compile/schedule.rs"]
mod tests;
