use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::core::{PixelFormat, TargetSize};
use crate::foundation::error::{FxResult, RenderError};
use crate::manifest::model::ParamValue;

/// Opaque identifier of one render node within a frame.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic node-id allocator.
///
/// Shared (by reference) between a graph assembler and every feature
/// compilation feeding it, so fragments compiled in parallel never collide.
#[derive(Debug)]
pub struct NodeIdGen {
    next: AtomicU64,
}

impl Default for NodeIdGen {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl NodeIdGen {
    /// Fresh allocator starting at id 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> NodeId {
        NodeId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// One named input edge of a render node.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InputBinding {
    /// Logical input name.
    pub name: String,
    /// Producer node id.
    pub producer: NodeId,
}

/// Declared output size class of a node relative to the frame target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResolutionTier {
    /// The frame's target resolution.
    Full,
    /// Half the target resolution.
    Half,
    /// A quarter of the target resolution.
    Quarter,
    /// A fixed pixel size independent of the target.
    Fixed {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
}

impl ResolutionTier {
    /// Resolve the tier against a concrete target size.
    pub fn resolve(self, target: TargetSize) -> TargetSize {
        match self {
            ResolutionTier::Full => target,
            ResolutionTier::Half => target.half(),
            ResolutionTier::Quarter => target.quarter(),
            ResolutionTier::Fixed { width, height } => {
                TargetSize::new(width.max(1), height.max(1))
            }
        }
    }
}

/// Optional output declaration on a node.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutputSpec {
    /// Output size class.
    pub tier: ResolutionTier,
    /// Output pixel format.
    pub format: PixelFormat,
}

impl OutputSpec {
    /// Full-resolution output in the given format.
    pub fn full(format: PixelFormat) -> Self {
        Self {
            tier: ResolutionTier::Full,
            format,
        }
    }
}

/// How the executor treats producer/consumer size mismatches on an edge.
///
/// Request-scoped configuration, not persisted state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EdgePolicy {
    /// Transparently insert a bilinear resize on mismatched edges.
    #[default]
    AutoResizeBilinear,
    /// Bind as-is and record a warning; consumers sampling in normalized
    /// coordinates tolerate the mismatch (masks commonly do).
    RequireExplicitAdapters,
}

/// One scheduled dispatch in a per-frame graph.
///
/// Created by the feature compiler or a graph assembler, owned by the graph
/// that contains it, and never mutated after insertion; a new compilation
/// produces new nodes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderNode {
    /// Node identity within the frame.
    pub id: NodeId,
    /// Kernel dispatched by this node.
    pub kernel_function: String,
    /// Named input edges, in declaration order. Order is load-bearing: the
    /// physical binding convention derives from it.
    pub inputs: Vec<InputBinding>,
    /// Fully resolved parameter values.
    pub params: BTreeMap<String, ParamValue>,
    /// Optional output size/format declaration.
    pub output_spec: Option<OutputSpec>,
}

impl RenderNode {
    /// Producer bound to input `name`, if any.
    pub fn input(&self, name: &str) -> Option<NodeId> {
        self.inputs
            .iter()
            .find(|binding| binding.name == name)
            .map(|binding| binding.producer)
    }

    /// The first declared input, if any.
    pub fn primary_input(&self) -> Option<&InputBinding> {
        self.inputs.first()
    }
}

/// A compiled fragment of render nodes with a designated root, produced by
/// one feature compilation and spliced into a frame graph by the assembler.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct NodeFragment {
    /// Nodes in scheduled order.
    pub nodes: Vec<RenderNode>,
    /// The node whose output represents the whole feature.
    pub root: NodeId,
}

/// The full per-frame DAG of render nodes.
#[derive(Clone, Debug, serde::Serialize)]
pub struct RenderGraph {
    nodes: BTreeMap<NodeId, RenderNode>,
    root: NodeId,
}

impl RenderGraph {
    /// Assemble a graph without validation.
    ///
    /// Prefer [`GraphBuilder::build`], which checks the graph invariants.
    /// Duplicate ids in `nodes` are rejected here because they would silently
    /// alias; everything else is the caller's responsibility.
    pub fn from_parts(nodes: Vec<RenderNode>, root: NodeId) -> FxResult<Self> {
        let mut map = BTreeMap::new();
        for node in nodes {
            let id = node.id;
            if map.insert(id, node).is_some() {
                return Err(RenderError::DuplicateNode { node: id }.into());
            }
        }
        Ok(Self { nodes: map, root })
    }

    /// Build a graph from a single compiled fragment.
    pub fn from_fragment(fragment: NodeFragment) -> FxResult<Self> {
        let graph = Self::from_parts(fragment.nodes, fragment.root)?;
        graph.validate()?;
        Ok(graph)
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node.
    pub fn get(&self, id: NodeId) -> Option<&RenderNode> {
        self.nodes.get(&id)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &RenderNode> {
        self.nodes.values()
    }

    /// Check the full graph invariants: root present, every input reference
    /// resolving to a node in the set, and acyclicity.
    pub fn validate(&self) -> FxResult<()> {
        if !self.nodes.contains_key(&self.root) {
            return Err(RenderError::MissingNode { node: self.root }.into());
        }
        for node in self.nodes.values() {
            for binding in &node.inputs {
                if !self.nodes.contains_key(&binding.producer) {
                    return Err(RenderError::UnboundInput {
                        node: node.id,
                        input: binding.name.clone(),
                    }
                    .into());
                }
            }
        }
        self.check_acyclic()?;
        Ok(())
    }

    /// The executability subset of [`Self::validate`]: root present and no
    /// cycles. Dangling producers are left for edge-level handling so the
    /// executor can apply its generator fallback.
    pub(crate) fn check_executable(&self) -> Result<(), RenderError> {
        if !self.nodes.contains_key(&self.root) {
            return Err(RenderError::MissingNode { node: self.root });
        }
        self.check_acyclic()
    }

    fn check_acyclic(&self) -> Result<(), RenderError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InStack,
            Done,
        }

        let mut marks: BTreeMap<NodeId, Mark> = BTreeMap::new();
        for &start in self.nodes.keys() {
            if marks.contains_key(&start) {
                continue;
            }
            // Explicit stack: (node, next input edge index to follow).
            let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
            marks.insert(start, Mark::InStack);

            while let Some((id, edge)) = stack.pop() {
                let Some(node) = self.nodes.get(&id) else {
                    continue;
                };
                if edge < node.inputs.len() {
                    stack.push((id, edge + 1));
                    let next = node.inputs[edge].producer;
                    match marks.get(&next) {
                        Some(Mark::InStack) => {
                            return Err(RenderError::CyclicGraph { node: next });
                        }
                        Some(Mark::Done) => {}
                        None => {
                            if self.nodes.contains_key(&next) {
                                marks.insert(next, Mark::InStack);
                                stack.push((next, 0));
                            }
                        }
                    }
                } else {
                    marks.insert(id, Mark::Done);
                }
            }
        }
        Ok(())
    }
}

/// Incremental assembler for a frame graph.
///
/// Owns the id allocator so directly added compositing/color nodes and
/// compiled feature fragments draw from one id space.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<RenderNode>,
    ids: NodeIdGen,
}

impl GraphBuilder {
    /// Empty builder with a fresh id space.
    pub fn new() -> Self {
        Self::default()
    }

    /// The id allocator, for passing into feature compilations.
    pub fn ids(&self) -> &NodeIdGen {
        &self.ids
    }

    /// Add a node with the given kernel, inputs, and parameters.
    pub fn add(
        &mut self,
        kernel: impl Into<String>,
        inputs: Vec<(&str, NodeId)>,
        params: BTreeMap<String, ParamValue>,
    ) -> NodeId {
        self.add_with_spec(kernel, inputs, params, None)
    }

    /// Add a node with an explicit output declaration.
    pub fn add_with_spec(
        &mut self,
        kernel: impl Into<String>,
        inputs: Vec<(&str, NodeId)>,
        params: BTreeMap<String, ParamValue>,
        output_spec: Option<OutputSpec>,
    ) -> NodeId {
        let id = self.ids.next_id();
        self.nodes.push(RenderNode {
            id,
            kernel_function: kernel.into(),
            inputs: inputs
                .into_iter()
                .map(|(name, producer)| InputBinding {
                    name: name.to_string(),
                    producer,
                })
                .collect(),
            params,
            output_spec,
        });
        id
    }

    /// Splice a compiled fragment in, returning its root id.
    pub fn merge(&mut self, fragment: NodeFragment) -> NodeId {
        let root = fragment.root;
        self.nodes.extend(fragment.nodes);
        root
    }

    /// Finish the graph with `root` as the frame output, checking all graph
    /// invariants.
    pub fn build(self, root: NodeId) -> FxResult<RenderGraph> {
        let graph = RenderGraph::from_parts(self.nodes, root)?;
        graph.validate()?;
        Ok(graph)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/model.rs"]
mod tests;
