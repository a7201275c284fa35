use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::exec::binding::plan_bindings;
use crate::exec::context::{AssetProvider, CancelToken, NoAssets, RenderCtx};
use crate::exec::pool::{ResourcePool, Texture, TextureDesc, TextureUsage};
use crate::foundation::core::{PixelFormat, Quality, TargetSize, TimeSec};
use crate::foundation::error::{FxResult, RenderError};
use crate::graph::model::{EdgePolicy, NodeId, RenderGraph, RenderNode};
use crate::kernel::intrinsics::{RESIZE_KERNEL, TIME_WARP_OFFSET_PARAM, TIME_WARP_RATE_PARAM};
use crate::kernel::registry::{BoundInput, DispatchArgs, KernelKind, KernelRegistry, KernelSpec};
use crate::manifest::model::ParamValue;

static NO_ASSETS: NoAssets = NoAssets;

/// Per-call configuration for [`GraphExecutor::render`].
#[derive(Clone, Copy)]
pub struct RenderOptions<'a> {
    /// How producer/consumer size mismatches are handled.
    pub edge_policy: EdgePolicy,
    /// Requested quality, threaded through the evaluation context.
    pub quality: Quality,
    /// Frame target size; resolution tiers resolve against it.
    pub target: TargetSize,
    /// Source imagery provider for generator kernels.
    pub assets: &'a dyn AssetProvider,
    /// Opt-in neutral substitution for generator nodes with a missing image
    /// input. Every substitution is logged as a warning.
    pub generator_fallback: bool,
    /// Cooperative cancellation handle.
    pub cancel: Option<&'a CancelToken>,
}

impl<'a> RenderOptions<'a> {
    /// Defaults: auto-resize edges, full quality, no assets, no fallback.
    pub fn new(target: TargetSize) -> Self {
        Self {
            edge_policy: EdgePolicy::default(),
            quality: Quality::default(),
            target,
            assets: &NO_ASSETS,
            generator_fallback: false,
            cancel: None,
        }
    }

    /// Replace the asset provider.
    pub fn with_assets(self, assets: &'a dyn AssetProvider) -> Self {
        Self { assets, ..self }
    }
}

/// A finished frame read back from the root node's output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format of `pixels`.
    pub format: PixelFormat,
    /// Raw pixel bytes, row-major.
    pub pixels: Vec<u8>,
}

impl RenderedFrame {
    /// Convert an RGBA8 frame into an [`image::RgbaImage`].
    pub fn into_rgba_image(self) -> FxResult<image::RgbaImage> {
        if self.format != PixelFormat::Rgba8 {
            return Err(anyhow::anyhow!(
                "cannot convert {:?} frame to RgbaImage",
                self.format
            )
            .into());
        }
        image::RgbaImage::from_raw(self.width, self.height, self.pixels)
            .ok_or_else(|| anyhow::anyhow!("frame byte length does not match dimensions").into())
    }
}

type CtxKey = (NodeId, u64);

#[derive(Clone, Copy, Debug)]
enum ResultRef {
    /// Produced texture parked in the store.
    Slot(usize),
    /// Pass-through result of another evaluation (time-warp nodes).
    Alias(CtxKey),
}

#[derive(Clone, Copy)]
enum Phase {
    Visit,
    Dispatch,
}

/// Resolves a render graph plus a point in time into dispatched work.
///
/// Evaluation is an explicit worklist walk memoized per render call: a node
/// reachable from two consumers in one frame is evaluated once per distinct
/// context and its output reused. Context (time, target size, quality) is
/// threaded as a value, so a time-warp node rewrites the clock for exactly
/// its upstream subgraph. Output textures come from the pool immediately
/// before dispatch and return to it when the last consumer finishes; branches
/// unreachable from the root never allocate. Dependent dispatches run in
/// graph order; the backend queue provides ordering for anything offloaded.
pub struct GraphExecutor {
    kernels: Arc<KernelRegistry>,
    pool: ResourcePool,
}

impl GraphExecutor {
    /// Executor with an unbounded pool.
    pub fn new(kernels: Arc<KernelRegistry>) -> Self {
        Self {
            kernels,
            pool: ResourcePool::new(),
        }
    }

    /// Executor reusing an existing pool (for pool limits or shared budgets).
    pub fn with_pool(kernels: Arc<KernelRegistry>, pool: ResourcePool) -> Self {
        Self { kernels, pool }
    }

    /// The pool, for stats and trimming.
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    /// Mutable pool access.
    pub fn pool_mut(&mut self) -> &mut ResourcePool {
        &mut self.pool
    }

    /// Render one frame of `graph` at `time`.
    ///
    /// Hard failures (`UnboundInput`, `UnresolvedKernel`, `AllocationFailed`,
    /// cancellation) propagate without local retry; the caller decides whether
    /// to degrade, substitute, or fail the render. Every texture acquired
    /// during the call is returned to the pool on all exit paths.
    #[tracing::instrument(skip(self, graph, opts), fields(nodes = graph.len(), time = time.0))]
    pub fn render(
        &mut self,
        graph: &RenderGraph,
        time: TimeSec,
        opts: &RenderOptions<'_>,
    ) -> FxResult<RenderedFrame> {
        graph.check_executable()?;

        let kernels = self.kernels.snapshot();
        let base = RenderCtx {
            time,
            target: opts.target,
            quality: opts.quality,
            generator_fallback: opts.generator_fallback,
            assets: opts.assets,
        };

        let mut counts = count_consumers(graph, &kernels, &base)?;
        let mut store: Vec<Option<Texture>> = Vec::new();
        let mut results: HashMap<CtxKey, ResultRef> = HashMap::new();

        let outcome = eval_graph(
            graph,
            &kernels,
            &base,
            opts,
            &mut self.pool,
            &mut store,
            &mut results,
            &mut counts,
        );

        // Every remaining texture goes back to the pool, success or not; a
        // cancelled or failed evaluation must not leak pooled resources.
        for slot in store.iter_mut() {
            if let Some(texture) = slot.take() {
                self.pool.release(texture);
            }
        }

        outcome
    }
}

fn time_warped(node: &RenderNode, time: TimeSec) -> TimeSec {
    let rate = node
        .params
        .get(TIME_WARP_RATE_PARAM)
        .and_then(ParamValue::as_f64)
        .unwrap_or(1.0);
    let offset = node
        .params
        .get(TIME_WARP_OFFSET_PARAM)
        .and_then(ParamValue::as_f64)
        .unwrap_or(0.0);
    TimeSec(time.0 * rate + offset)
}

fn resolve_kernel<'k>(
    kernels: &'k HashMap<String, Arc<KernelSpec>>,
    node: &RenderNode,
) -> Result<&'k Arc<KernelSpec>, RenderError> {
    kernels
        .get(&node.kernel_function)
        .ok_or_else(|| RenderError::UnresolvedKernel {
            kernel: node.kernel_function.clone(),
        })
}

/// Pre-pass: how many consumers each `(node, context)` evaluation has in this
/// frame, mirroring the walk the evaluator will perform. The root carries one
/// extra count for the caller. Needed so a shared producer's texture is
/// released only after its last consumer, never before a sibling branch
/// reaches it.
fn count_consumers(
    graph: &RenderGraph,
    kernels: &HashMap<String, Arc<KernelSpec>>,
    base: &RenderCtx<'_>,
) -> FxResult<HashMap<CtxKey, usize>> {
    let mut counts: HashMap<CtxKey, usize> = HashMap::new();
    let mut visited: HashSet<CtxKey> = HashSet::new();
    let mut stack: Vec<(NodeId, TimeSec)> = vec![(graph.root(), base.time)];

    *counts.entry((graph.root(), base.fingerprint())).or_default() += 1;

    while let Some((id, time)) = stack.pop() {
        let ctx = base.with_time(time);
        if !visited.insert((id, ctx.fingerprint())) {
            continue;
        }
        let Some(node) = graph.get(id) else {
            continue;
        };
        let spec = resolve_kernel(kernels, node)?;

        if spec.kind == KernelKind::TimeWarp {
            if let Some(first) = node.inputs.first() {
                let warped = base.with_time(time_warped(node, time));
                *counts
                    .entry((first.producer, warped.fingerprint()))
                    .or_default() += 1;
                if graph.get(first.producer).is_some() {
                    stack.push((first.producer, warped.time));
                }
            }
        } else {
            for binding in &node.inputs {
                *counts
                    .entry((binding.producer, ctx.fingerprint()))
                    .or_default() += 1;
                if graph.get(binding.producer).is_some() {
                    stack.push((binding.producer, time));
                }
            }
        }
    }

    Ok(counts)
}

fn resolve_slot(results: &HashMap<CtxKey, ResultRef>, key: CtxKey) -> Option<usize> {
    let mut key = key;
    loop {
        match results.get(&key) {
            Some(ResultRef::Slot(slot)) => return Some(*slot),
            Some(ResultRef::Alias(target)) => key = *target,
            None => return None,
        }
    }
}

/// Decrement a producer's consumer count, releasing its texture at zero.
/// Time-warp aliases cascade a single decrement to their underlying result.
fn release_ref(
    key: CtxKey,
    counts: &mut HashMap<CtxKey, usize>,
    results: &HashMap<CtxKey, ResultRef>,
    store: &mut [Option<Texture>],
    pool: &mut ResourcePool,
) {
    let mut key = key;
    loop {
        let Some(count) = counts.get_mut(&key) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count > 0 {
            return;
        }
        counts.remove(&key);

        match results.get(&key) {
            Some(ResultRef::Alias(target)) => key = *target,
            Some(ResultRef::Slot(slot)) => {
                if let Some(texture) = store.get_mut(*slot).and_then(Option::take) {
                    pool.release(texture);
                }
                return;
            }
            None => return,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn eval_graph(
    graph: &RenderGraph,
    kernels: &HashMap<String, Arc<KernelSpec>>,
    base: &RenderCtx<'_>,
    opts: &RenderOptions<'_>,
    pool: &mut ResourcePool,
    store: &mut Vec<Option<Texture>>,
    results: &mut HashMap<CtxKey, ResultRef>,
    counts: &mut HashMap<CtxKey, usize>,
) -> FxResult<RenderedFrame> {
    let mut stack: Vec<(NodeId, TimeSec, Phase)> = vec![(graph.root(), base.time, Phase::Visit)];

    while let Some((id, time, phase)) = stack.pop() {
        if opts.cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(RenderError::Cancelled.into());
        }

        let ctx = base.with_time(time);
        let key = (id, ctx.fingerprint());
        if results.contains_key(&key) {
            continue;
        }

        let node = graph
            .get(id)
            .ok_or(RenderError::MissingNode { node: id })?;
        let spec = resolve_kernel(kernels, node)?;

        match phase {
            Phase::Visit => {
                stack.push((id, time, Phase::Dispatch));
                if spec.kind == KernelKind::TimeWarp {
                    if let Some(first) = node.inputs.first()
                        && graph.get(first.producer).is_some()
                    {
                        stack.push((first.producer, time_warped(node, time), Phase::Visit));
                    }
                } else {
                    for binding in node.inputs.iter().rev() {
                        if graph.get(binding.producer).is_some() {
                            stack.push((binding.producer, time, Phase::Visit));
                        }
                    }
                }
            }
            Phase::Dispatch => {
                if spec.kind == KernelKind::TimeWarp {
                    let first = node.inputs.first().ok_or_else(|| RenderError::UnboundInput {
                        node: id,
                        input: "input".to_string(),
                    })?;
                    let warped = base.with_time(time_warped(node, time));
                    let child_key = (first.producer, warped.fingerprint());
                    if resolve_slot(results, child_key).is_none() {
                        return Err(RenderError::UnboundInput {
                            node: id,
                            input: first.name.clone(),
                        }
                        .into());
                    }
                    results.insert(key, ResultRef::Alias(child_key));
                } else {
                    dispatch_node(
                        graph, kernels, node, spec, &ctx, key, opts, pool, store, results, counts,
                    )?;
                }
            }
        }
    }

    let root_key = (graph.root(), base.fingerprint());
    let slot = resolve_slot(results, root_key).ok_or(RenderError::MissingNode {
        node: graph.root(),
    })?;
    let texture = store
        .get(slot)
        .and_then(Option::as_ref)
        .ok_or(RenderError::MissingNode {
            node: graph.root(),
        })?;

    // Readback copies the pixels so the root texture can rejoin the pool.
    Ok(RenderedFrame {
        width: texture.desc.width,
        height: texture.desc.height,
        format: texture.desc.format,
        pixels: texture.data.clone(),
    })
}

enum BoundSource {
    /// A memoized producer result.
    Slot(usize),
    /// A synthesized texture (resize adapter or neutral substitute) parked in
    /// the store and released right after this dispatch.
    Temp(usize),
}

#[allow(clippy::too_many_arguments)]
fn dispatch_node(
    graph: &RenderGraph,
    kernels: &HashMap<String, Arc<KernelSpec>>,
    node: &RenderNode,
    spec: &Arc<KernelSpec>,
    ctx: &RenderCtx<'_>,
    key: CtxKey,
    opts: &RenderOptions<'_>,
    pool: &mut ResourcePool,
    store: &mut Vec<Option<Texture>>,
    results: &mut HashMap<CtxKey, ResultRef>,
    counts: &mut HashMap<CtxKey, usize>,
) -> FxResult<()> {
    let format = node.output_spec.map(|s| s.format).unwrap_or_default();
    let size = node
        .output_spec
        .map(|s| s.tier.resolve(ctx.target))
        .unwrap_or(ctx.target);
    let out_desc = TextureDesc {
        width: size.width,
        height: size.height,
        format,
        usage: TextureUsage::default(),
    };

    let plan = plan_bindings(node, spec.kind);
    let mut sources: Vec<(u32, usize, BoundSource)> = Vec::with_capacity(plan.inputs.len());
    let mut consumed: Vec<CtxKey> = Vec::new();
    let mut temp_slots: Vec<usize> = Vec::new();

    for slot_binding in &plan.inputs {
        let binding = &node.inputs[slot_binding.input_index];

        if graph.get(binding.producer).is_none() {
            // The one deliberate, documented exception to hard failure:
            // generator nodes may substitute a neutral input, opt-in only.
            if spec.kind == KernelKind::Generator && ctx.generator_fallback {
                tracing::warn!(
                    node = %node.id,
                    input = %binding.name,
                    "substituting neutral image for missing generator input"
                );
                let mut neutral = pool.acquire(out_desc)?;
                neutral.clear();
                let temp = park(store, neutral);
                temp_slots.push(temp);
                sources.push((slot_binding.slot, slot_binding.input_index, BoundSource::Temp(temp)));
                continue;
            }
            return Err(RenderError::UnboundInput {
                node: node.id,
                input: binding.name.clone(),
            }
            .into());
        }

        let producer_key = (binding.producer, ctx.fingerprint());
        let producer_slot =
            resolve_slot(results, producer_key).ok_or_else(|| RenderError::UnboundInput {
                node: node.id,
                input: binding.name.clone(),
            })?;
        consumed.push(producer_key);

        let producer_desc = store
            .get(producer_slot)
            .and_then(Option::as_ref)
            .map(|texture| texture.desc)
            .ok_or_else(|| RenderError::UnboundInput {
                node: node.id,
                input: binding.name.clone(),
            })?;

        if (producer_desc.width, producer_desc.height) == (out_desc.width, out_desc.height) {
            sources.push((
                slot_binding.slot,
                slot_binding.input_index,
                BoundSource::Slot(producer_slot),
            ));
            continue;
        }

        match opts.edge_policy {
            EdgePolicy::AutoResizeBilinear => {
                let adapted_slot = dispatch_adapter(
                    kernels,
                    store,
                    pool,
                    ctx,
                    node.id,
                    &binding.name,
                    producer_slot,
                    out_desc,
                )?;
                temp_slots.push(adapted_slot);
                sources.push((
                    slot_binding.slot,
                    slot_binding.input_index,
                    BoundSource::Temp(adapted_slot),
                ));
            }
            EdgePolicy::RequireExplicitAdapters => {
                tracing::warn!(
                    node = %node.id,
                    input = %binding.name,
                    producer = ?(producer_desc.width, producer_desc.height),
                    expected = ?(out_desc.width, out_desc.height),
                    "size mismatch on edge left unadapted"
                );
                sources.push((
                    slot_binding.slot,
                    slot_binding.input_index,
                    BoundSource::Slot(producer_slot),
                ));
            }
        }
    }

    let mut output = pool.acquire(out_desc)?;

    let dispatch_result = {
        let mut bound: Vec<BoundInput<'_>> = Vec::with_capacity(sources.len());
        let mut build_err = None;
        for (slot, input_index, source) in &sources {
            let store_slot = match source {
                BoundSource::Slot(s) | BoundSource::Temp(s) => *s,
            };
            match store.get(store_slot).and_then(Option::as_ref) {
                Some(texture) => bound.push(BoundInput {
                    slot: *slot,
                    name: &node.inputs[*input_index].name,
                    texture,
                }),
                None => {
                    build_err = Some(RenderError::UnboundInput {
                        node: node.id,
                        input: node.inputs[*input_index].name.clone(),
                    });
                    break;
                }
            }
        }

        match build_err {
            Some(err) => Err(err),
            None => {
                let mut args = DispatchArgs {
                    ctx,
                    kernel: &spec.name,
                    params: &node.params,
                    inputs: &bound,
                    output: &mut output,
                };
                (spec.entry)(&mut args)
            }
        }
    };

    if let Err(err) = dispatch_result {
        pool.release(output);
        return Err(err.into());
    }

    let produced = park(store, output);
    results.insert(key, ResultRef::Slot(produced));

    for temp in temp_slots {
        if let Some(texture) = store.get_mut(temp).and_then(Option::take) {
            pool.release(texture);
        }
    }
    for producer_key in consumed {
        release_ref(producer_key, counts, results, store, pool);
    }

    Ok(())
}

/// Synthesize and run a bilinear resize on one mismatched edge, parking the
/// adapted texture in the store. The adapter keeps the producer's format and
/// takes the consumer's expected size.
#[allow(clippy::too_many_arguments)]
fn dispatch_adapter(
    kernels: &HashMap<String, Arc<KernelSpec>>,
    store: &mut Vec<Option<Texture>>,
    pool: &mut ResourcePool,
    ctx: &RenderCtx<'_>,
    consumer: NodeId,
    input_name: &str,
    producer_slot: usize,
    out_desc: TextureDesc,
) -> FxResult<usize> {
    let resize = kernels
        .get(RESIZE_KERNEL)
        .ok_or_else(|| RenderError::UnresolvedKernel {
            kernel: RESIZE_KERNEL.to_string(),
        })?;

    let producer_format = store
        .get(producer_slot)
        .and_then(Option::as_ref)
        .map(|texture| texture.desc.format)
        .ok_or_else(|| RenderError::UnboundInput {
            node: consumer,
            input: input_name.to_string(),
        })?;

    let adapter_desc = TextureDesc {
        width: out_desc.width,
        height: out_desc.height,
        format: producer_format,
        usage: TextureUsage::default(),
    };
    let mut adapted = pool.acquire(adapter_desc)?;

    let empty_params = BTreeMap::new();
    let dispatch_result = match store.get(producer_slot).and_then(Option::as_ref) {
        Some(input) => {
            let bound = [BoundInput {
                slot: 0,
                name: input_name,
                texture: input,
            }];
            let mut args = DispatchArgs {
                ctx,
                kernel: RESIZE_KERNEL,
                params: &empty_params,
                inputs: &bound,
                output: &mut adapted,
            };
            (resize.entry)(&mut args)
        }
        None => Err(RenderError::UnboundInput {
            node: consumer,
            input: input_name.to_string(),
        }),
    };

    match dispatch_result {
        Ok(()) => Ok(park(store, adapted)),
        Err(err) => {
            pool.release(adapted);
            Err(err.into())
        }
    }
}

fn park(store: &mut Vec<Option<Texture>>, texture: Texture) -> usize {
    store.push(Some(texture));
    store.len() - 1
}
