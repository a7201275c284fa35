use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::compile::schedule::schedule_passes;
use crate::foundation::error::{CompileError, FxResult};
use crate::graph::model::{InputBinding, NodeFragment, NodeId, NodeIdGen, RenderNode};
use crate::manifest::model::{FeatureManifest, ParamSpec, ParamValue};

/// Overlay `overrides` on the manifest's declared defaults, type-checking
/// every override against its parameter declaration.
///
/// Out-of-range floats are rejected with
/// [`CompileError::ParameterOutOfRange`], never silently clamped: clamping is
/// a caller decision.
pub fn resolve_params(
    manifest: &FeatureManifest,
    overrides: &BTreeMap<String, ParamValue>,
) -> Result<BTreeMap<String, ParamValue>, CompileError> {
    let mut params = manifest.default_params();

    for (name, value) in overrides {
        let Some(definition) = manifest.parameters.iter().find(|p| &p.name == name) else {
            return Err(CompileError::UnknownParameter {
                feature: manifest.id.clone(),
                name: name.clone(),
            });
        };

        match (&definition.spec, value) {
            (ParamSpec::Float { min, max, .. }, ParamValue::Float(v)) => {
                if !v.is_finite() {
                    return Err(CompileError::ParameterType {
                        feature: manifest.id.clone(),
                        name: name.clone(),
                        expected: "a finite float".to_string(),
                    });
                }
                if v < min || v > max {
                    return Err(CompileError::ParameterOutOfRange {
                        feature: manifest.id.clone(),
                        name: name.clone(),
                        value: *v,
                        min: *min,
                        max: *max,
                    });
                }
            }
            (ParamSpec::Bool { .. }, ParamValue::Bool(_)) => {}
            (ParamSpec::Color { .. }, ParamValue::Color(c)) => {
                if c.iter().any(|channel| !channel.is_finite()) {
                    return Err(CompileError::ParameterType {
                        feature: manifest.id.clone(),
                        name: name.clone(),
                        expected: "a color with finite channels".to_string(),
                    });
                }
            }
            (ParamSpec::Enum { choices, .. }, ParamValue::Choice(choice)) => {
                if !choices.contains(choice) {
                    return Err(CompileError::ParameterType {
                        feature: manifest.id.clone(),
                        name: name.clone(),
                        expected: format!("one of {choices:?}"),
                    });
                }
            }
            (spec, _) => {
                return Err(CompileError::ParameterType {
                    feature: manifest.id.clone(),
                    name: name.clone(),
                    expected: spec.kind_name().to_string(),
                });
            }
        }

        params.insert(name.clone(), value.clone());
    }

    Ok(params)
}

/// Expand one feature into a wired fragment of render nodes.
///
/// Passes are emitted in scheduled order, one node per pass; each pass input
/// resolves to the external binding for a declared port, the node emitted for
/// an earlier pass sharing that output name, or an external context binding,
/// in that precedence. Unresolvable inputs fail with
/// [`CompileError::UnboundInput`] before any node is emitted; there are no
/// partial fragments. Every node carries the fully resolved parameter map.
#[tracing::instrument(skip_all, fields(feature = %manifest.id))]
pub fn compile_feature(
    manifest: &FeatureManifest,
    external_inputs: &BTreeMap<String, NodeId>,
    overrides: &BTreeMap<String, ParamValue>,
    ids: &NodeIdGen,
) -> FxResult<NodeFragment> {
    let params = resolve_params(manifest, overrides)?;
    let passes = manifest.effective_passes();
    if passes.is_empty() {
        return Err(CompileError::Empty {
            feature: manifest.id.clone(),
        }
        .into());
    }
    let order = schedule_passes(&manifest.id, &passes)?;

    let unbound = |input: &str| CompileError::UnboundInput {
        feature: manifest.id.clone(),
        input: input.to_string(),
    };

    // Resolve every input before emitting anything.
    for pass in &passes {
        for input in &pass.inputs {
            if manifest.find_port(input).is_some() {
                if !external_inputs.contains_key(input) {
                    return Err(unbound(input).into());
                }
            } else {
                let is_pass_output = passes.iter().any(|p| &p.output_name == input);
                if !is_pass_output && !external_inputs.contains_key(input) {
                    return Err(unbound(input).into());
                }
            }
        }
    }

    let mut produced: BTreeMap<&str, NodeId> = BTreeMap::new();
    let mut nodes = Vec::with_capacity(passes.len());
    let mut root = None;

    for &index in &order {
        let pass = &passes[index];

        let mut inputs = Vec::with_capacity(pass.inputs.len());
        for input in &pass.inputs {
            let producer = if manifest.find_port(input).is_some() {
                external_inputs.get(input).copied()
            } else {
                produced
                    .get(input.as_str())
                    .copied()
                    .or_else(|| external_inputs.get(input).copied())
            };
            let producer = producer.ok_or_else(|| unbound(input))?;
            inputs.push(InputBinding {
                name: input.clone(),
                producer,
            });
        }

        let id = ids.next_id();
        nodes.push(RenderNode {
            id,
            kernel_function: pass.kernel_function.clone(),
            inputs,
            params: params.clone(),
            output_spec: None,
        });
        produced.insert(pass.output_name.as_str(), id);
        root = Some(id);
    }

    let root = root.ok_or_else(|| CompileError::Empty {
        feature: manifest.id.clone(),
    })?;
    Ok(NodeFragment { nodes, root })
}

/// One feature compilation request for [`compile_features`].
#[derive(Clone, Debug)]
pub struct CompileRequest {
    /// The validated manifest to expand.
    pub manifest: Arc<FeatureManifest>,
    /// Port/context name to producer bindings.
    pub external_inputs: BTreeMap<String, NodeId>,
    /// Parameter overrides layered over manifest defaults.
    pub overrides: BTreeMap<String, ParamValue>,
}

/// Compile independent features in parallel.
///
/// Compilation is a pure function of its inputs, so requests fan out across
/// the rayon pool; results come back in request order. The shared id
/// allocator keeps fragments collision-free.
pub fn compile_features(
    requests: &[CompileRequest],
    ids: &NodeIdGen,
) -> FxResult<Vec<NodeFragment>> {
    requests
        .par_iter()
        .map(|request| {
            compile_feature(
                &request.manifest,
                &request.external_inputs,
                &request.overrides,
                ids,
            )
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/compile/feature.rs"]
mod tests;
