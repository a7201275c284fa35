use crate::exec::pool::TextureDesc;
use crate::graph::model::NodeId;

/// Convenience result type used across fxgraph.
pub type FxResult<T> = Result<T, FxError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum FxError {
    /// Bundle load failed; carries every violation found, not just the first.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A single feature failed to compile into render nodes.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A frame render failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Batch validation failure produced by the manifest loader.
///
/// Loading is all-or-nothing: any issue aborts the batch, and `issues` holds
/// every violation found across the whole bundle so integration failures are
/// diagnosable in one pass.
#[derive(thiserror::Error, Debug)]
#[error("manifest bundle validation failed with {} issue(s)", .issues.len())]
pub struct ValidationError {
    /// Every violation found across the bundle.
    pub issues: Vec<ValidationIssue>,
}

/// One violation found while validating a manifest bundle.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Two manifests in the bundle declared the same id.
    #[error("duplicate manifest id '{id}' declared by both '{first_source}' and '{second_source}'")]
    DuplicateId {
        /// The colliding manifest id.
        id: String,
        /// Source that declared the id first.
        first_source: String,
        /// Source that declared it again.
        second_source: String,
    },

    /// A manifest references a kernel the registry does not know.
    #[error("manifest '{manifest}' references unresolved kernel '{kernel}'")]
    UnresolvedKernel {
        /// The offending manifest id.
        manifest: String,
        /// The unresolved kernel name.
        kernel: String,
    },

    /// A clip-domain manifest declares a port the clip context cannot supply.
    #[error("clip manifest '{manifest}' declares port '{port}', which the clip compilation context cannot supply")]
    IllegalClipPort {
        /// The offending manifest id.
        manifest: String,
        /// The port name not available to clip compilation.
        port: String,
    },

    /// A manifest source failed structural decoding.
    #[error("source '{source_name}' failed to decode: {message}")]
    Decode {
        /// The source name (file name or caller-provided label).
        source_name: String,
        /// Decoder message.
        message: String,
    },

    /// A manifest's internal pass list is not a well-formed DAG.
    #[error("manifest '{manifest}' has an invalid pass graph: {message}")]
    BadPassGraph {
        /// The offending manifest id.
        manifest: String,
        /// Description of the defect.
        message: String,
    },
}

/// Failure while compiling one feature into render nodes.
///
/// Fatal to that feature only; the caller may drop the effect from the frame
/// graph and continue.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A pass input resolves to neither an external binding nor a prior pass output.
    #[error("feature '{feature}': input '{input}' is bound to neither an external producer nor a prior pass output")]
    UnboundInput {
        /// The feature being compiled.
        feature: String,
        /// The unresolvable input name.
        input: String,
    },

    /// A parameter override names a parameter the manifest does not declare.
    #[error("feature '{feature}': unknown parameter '{name}'")]
    UnknownParameter {
        /// The feature being compiled.
        feature: String,
        /// The unknown parameter name.
        name: String,
    },

    /// A parameter override has the wrong type for its declaration.
    #[error("feature '{feature}': parameter '{name}' expects {expected}")]
    ParameterType {
        /// The feature being compiled.
        feature: String,
        /// The parameter name.
        name: String,
        /// Human-readable description of the expected value.
        expected: String,
    },

    /// A float override lies outside its declared range.
    ///
    /// Out-of-range values are rejected, not clamped; clamping is a caller
    /// decision.
    #[error("feature '{feature}': parameter '{name}' = {value} outside [{min}, {max}]")]
    ParameterOutOfRange {
        /// The feature being compiled.
        feature: String,
        /// The parameter name.
        name: String,
        /// The rejected value.
        value: f64,
        /// Declared minimum.
        min: f64,
        /// Declared maximum.
        max: f64,
    },

    /// The feature's pass list contains a dependency cycle.
    ///
    /// Never silently broken by edge removal; indicates a manifest authoring
    /// bug.
    #[error("feature '{feature}': pass dependency cycle through {stuck:?}")]
    CycleDetected {
        /// The feature being compiled.
        feature: String,
        /// Logical names of the passes that could not be scheduled.
        stuck: Vec<String>,
    },

    /// The manifest declares neither a kernel function nor any passes.
    #[error("feature '{feature}': manifest declares neither kernelFunction nor passes")]
    Empty {
        /// The feature being compiled.
        feature: String,
    },

    /// Two passes share one output name, making input references ambiguous.
    #[error("feature '{feature}': duplicate pass output name '{output}'")]
    DuplicatePassOutput {
        /// The feature being compiled.
        feature: String,
        /// The duplicated output name.
        output: String,
    },
}

/// Failure while executing a render graph for one frame.
///
/// Fatal to that frame; nothing is retried inside the core.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A node's declared input has no producer in the graph.
    #[error("node {node}: input '{input}' has no producer in the graph")]
    UnboundInput {
        /// The consuming node.
        node: NodeId,
        /// The unbound input name.
        input: String,
    },

    /// A node's kernel function is not registered.
    #[error("unresolved kernel '{kernel}'")]
    UnresolvedKernel {
        /// The unresolved kernel name.
        kernel: String,
    },

    /// The resource pool could not satisfy an acquisition.
    #[error("texture allocation failed for {desc:?}")]
    AllocationFailed {
        /// The descriptor that could not be satisfied.
        desc: TextureDesc,
    },

    /// The graph's declared root is not present in the node set.
    #[error("root node {node} is not present in the graph")]
    MissingNode {
        /// The missing node id.
        node: NodeId,
    },

    /// The graph contains a dependency cycle and cannot be evaluated.
    #[error("render graph contains a cycle through node {node}")]
    CyclicGraph {
        /// A node on the detected cycle.
        node: NodeId,
    },

    /// Two nodes with the same id were inserted into one graph.
    #[error("duplicate node id {node} in graph")]
    DuplicateNode {
        /// The colliding node id.
        node: NodeId,
    },

    /// The render was cancelled before completion.
    #[error("render cancelled")]
    Cancelled,

    /// A kernel reported a dispatch failure.
    #[error("kernel '{kernel}' failed: {message}")]
    Kernel {
        /// The kernel that failed.
        kernel: String,
        /// Kernel-provided message.
        message: String,
    },
}

impl ValidationError {
    /// Build a validation error from collected issues.
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }
}
