use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::exec::context::RenderCtx;
use crate::exec::pool::Texture;
use crate::foundation::error::RenderError;
use crate::manifest::model::ParamValue;

/// Shape of a kernel, which fixes its physical binding layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelKind {
    /// One primary image input (slot 0), output at slot 1.
    Filter,
    /// `arity` primary inputs at slots `0..arity`, output at slot `arity`.
    Compositor {
        /// Number of primary inputs.
        arity: u32,
    },
    /// No primary input; output at slot 0.
    Generator,
    /// Rewrites the temporal context for its single input subgraph; the
    /// executor handles it structurally and the entry point is never
    /// dispatched.
    TimeWarp,
}

impl KernelKind {
    /// Number of primary inputs for this kind.
    pub fn primary_arity(self) -> u32 {
        match self {
            KernelKind::Filter => 1,
            KernelKind::Compositor { arity } => arity,
            KernelKind::Generator => 0,
            KernelKind::TimeWarp => 1,
        }
    }
}

/// One input bound to a physical slot for a dispatch.
#[derive(Debug)]
pub struct BoundInput<'a> {
    /// Physical slot index.
    pub slot: u32,
    /// Logical input name.
    pub name: &'a str,
    /// The producer's output texture.
    pub texture: &'a Texture,
}

/// Everything a kernel entry point sees for one dispatch.
pub struct DispatchArgs<'a> {
    /// Evaluation context (time, target size, quality, assets).
    pub ctx: &'a RenderCtx<'a>,
    /// The logical kernel name being dispatched.
    pub kernel: &'a str,
    /// Fully resolved parameter values for the node.
    pub params: &'a BTreeMap<String, ParamValue>,
    /// Bound inputs in ascending slot order.
    pub inputs: &'a [BoundInput<'a>],
    /// Output texture, acquired from the pool for this dispatch.
    pub output: &'a mut Texture,
}

impl<'a> DispatchArgs<'a> {
    /// Float parameter or `default` when absent or not a float.
    pub fn param_f64(&self, name: &str, default: f64) -> f64 {
        self.params.get(name).and_then(ParamValue::as_f64).unwrap_or(default)
    }

    /// Bool parameter or `default` when absent or not a bool.
    pub fn param_bool(&self, name: &str, default: bool) -> bool {
        self.params.get(name).and_then(ParamValue::as_bool).unwrap_or(default)
    }

    /// Color parameter or `default` when absent or not a color.
    pub fn param_color(&self, name: &str, default: [f32; 4]) -> [f32; 4] {
        self.params.get(name).and_then(ParamValue::as_color).unwrap_or(default)
    }

    /// Enum-choice parameter, if present.
    pub fn param_choice(&self, name: &str) -> Option<&'a str> {
        self.params.get(name).and_then(ParamValue::as_choice)
    }

    /// The input bound at physical slot `slot`, failing with a kernel error
    /// when the slot is unbound. The returned borrow is independent of `self`
    /// so kernels can read inputs while writing their output.
    pub fn input_at(&self, slot: u32) -> Result<&'a Texture, RenderError> {
        self.inputs
            .iter()
            .find(|input| input.slot == slot)
            .map(|input| input.texture)
            .ok_or_else(|| RenderError::Kernel {
                kernel: self.kernel.to_string(),
                message: format!("no input bound at slot {slot}"),
            })
    }
}

/// A kernel entry point. Errors surface as [`RenderError::Kernel`] or any
/// other [`RenderError`] the kernel chooses to raise.
pub type KernelFn =
    Arc<dyn for<'a, 'b> Fn(&'a mut DispatchArgs<'b>) -> Result<(), RenderError> + Send + Sync>;

/// A registered kernel: logical name, shape, and entry point.
#[derive(Clone)]
pub struct KernelSpec {
    /// Logical name manifests and nodes dispatch by.
    pub name: String,
    /// Binding shape.
    pub kind: KernelKind,
    /// Callable entry point.
    pub entry: KernelFn,
}

impl std::fmt::Debug for KernelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl KernelSpec {
    /// Construct a spec.
    pub fn new(name: impl Into<String>, kind: KernelKind, entry: KernelFn) -> Self {
        Self {
            name: name.into(),
            kind,
            entry,
        }
    }
}

type Snapshot = Arc<HashMap<String, Arc<KernelSpec>>>;

/// Lookup table from logical kernel name to entry point.
///
/// Populated once at startup from the shipped kernel set and read-mostly
/// thereafter; reads take a copy-on-write snapshot. Its correctness gates both
/// loader validation and executor dispatch.
#[derive(Debug, Default)]
pub struct KernelRegistry {
    inner: RwLock<Snapshot>,
}

impl KernelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current read snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Register a kernel, returning the previously registered spec when the
    /// name was already taken.
    pub fn register(&self, spec: KernelSpec) -> Option<Arc<KernelSpec>> {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = (**guard).clone();
        let previous = next.insert(spec.name.clone(), Arc::new(spec));
        *guard = Arc::new(next);
        previous
    }

    /// Resolve a logical name.
    pub fn resolve(&self, name: &str) -> Option<Arc<KernelSpec>> {
        self.snapshot().get(name).cloned()
    }

    /// Resolve a logical name, failing loudly when unregistered.
    pub fn resolve_or_err(&self, name: &str) -> Result<Arc<KernelSpec>, RenderError> {
        self.resolve(name).ok_or_else(|| RenderError::UnresolvedKernel {
            kernel: name.to_string(),
        })
    }

    /// Whether a kernel name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains_key(name)
    }
}
