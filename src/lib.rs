//! Fxgraph is a declarative effect compilation and render-graph execution core.
//!
//! Fxgraph turns a library of declaratively-described visual effects ("features")
//! into per-frame render graphs and executes those graphs deterministically under
//! real-time constraints. It is the engine core behind a timeline compositor: the
//! timeline compiler expands each active effect into node fragments, assembles one
//! [`RenderGraph`] per output frame, and hands it to the [`GraphExecutor`].
//!
//! # Pipeline overview
//!
//! 1. **Load**: `ManifestBundle -> [FeatureManifest]` (decode + validate, all-or-nothing)
//! 2. **Compile**: `FeatureManifest + inputs + overrides -> NodeFragment` (scheduled passes)
//! 3. **Assemble**: fragments + compositing nodes -> `RenderGraph` (external caller)
//! 4. **Execute**: `RenderGraph + time -> RenderedFrame` (memoized walk, pooled resources)
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic-by-default**: scheduling, compilation, and physical slot
//!   binding are pure functions of their inputs, never of map iteration order.
//! - **No hidden state**: evaluation context (time, target size, quality) is a
//!   value threaded through the walk; registries are passed as explicit handles.
//! - **Typed failures**: every abstracted failure surfaces as a typed error,
//!   never as a silently substituted default.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod compile;
mod exec;
mod foundation;
mod graph;
mod kernel;
mod manifest;

pub use compile::feature::{CompileRequest, compile_feature, compile_features, resolve_params};
pub use compile::schedule::schedule_passes;
pub use exec::binding::{BindingPlan, RESERVED_EXTRA_INPUTS, SlotBinding, plan_bindings};
pub use exec::context::{AssetProvider, CancelToken, NoAssets, RenderCtx};
pub use exec::executor::{GraphExecutor, RenderOptions, RenderedFrame};
pub use exec::pool::{PoolStats, ResourcePool, Texture, TextureDesc, TextureUsage};
pub use foundation::core::{PixelFormat, Quality, TargetSize, TimeSec};
pub use foundation::error::{
    CompileError, FxError, FxResult, RenderError, ValidationError, ValidationIssue,
};
pub use graph::model::{
    EdgePolicy, GraphBuilder, InputBinding, NodeFragment, NodeId, NodeIdGen, OutputSpec,
    RenderGraph, RenderNode, ResolutionTier,
};
pub use kernel::intrinsics::{
    RESIZE_KERNEL, TIME_WARP_KERNEL, TIME_WARP_OFFSET_PARAM, TIME_WARP_RATE_PARAM,
    register_intrinsics,
};
pub use kernel::registry::{BoundInput, DispatchArgs, KernelFn, KernelKind, KernelRegistry, KernelSpec};
pub use manifest::loader::{ManifestBundle, ManifestSource, load_manifests};
pub use manifest::model::{
    EXTERNAL_CONTEXT_INPUTS, FeatureDomain, FeatureManifest, FeaturePass, ParamSpec, ParamValue,
    ParameterDefinition, PortDefinition, PortKind,
};
pub use manifest::registry::FeatureRegistry;
