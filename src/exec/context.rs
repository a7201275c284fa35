use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::exec::pool::Texture;
use crate::foundation::core::{Quality, TargetSize, TimeSec};
use crate::foundation::math::Fnv1a64;

/// Supplies source imagery to generator kernels.
///
/// External media decode is front-loaded by the embedding application; the
/// executor itself performs no IO. Implementations must be cheap to call per
/// node per frame.
pub trait AssetProvider: Send + Sync {
    /// Fill `output` with the frame of asset `key` at `time`. Returns `false`
    /// when the asset is unknown or has no frame at `time`, leaving `output`
    /// untouched.
    fn fill_source(&self, key: &str, time: TimeSec, output: &mut Texture) -> bool;
}

/// Provider with no assets; every lookup misses.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAssets;

impl AssetProvider for NoAssets {
    fn fill_source(&self, _key: &str, _time: TimeSec, _output: &mut Texture) -> bool {
        false
    }
}

/// Evaluation context for one node visit.
///
/// Context is a value threaded through the graph walk, never shared mutable
/// state: a time-warp node hands a rewritten copy to its upstream subgraph
/// while sibling branches keep the original. Two visits of the same node under
/// different contexts are distinct evaluations, keyed by
/// `(node, fingerprint)`.
#[derive(Clone, Copy)]
pub struct RenderCtx<'a> {
    /// Composition time for this subgraph.
    pub time: TimeSec,
    /// Frame target size; resolution tiers resolve against it.
    pub target: TargetSize,
    /// Requested quality.
    pub quality: Quality,
    /// Opt-in neutral substitution for generator nodes whose image input is
    /// unavailable. Off by default; every substitution is logged as a warning.
    pub generator_fallback: bool,
    /// Source imagery provider.
    pub assets: &'a dyn AssetProvider,
}

impl<'a> RenderCtx<'a> {
    /// Context at `time` with default quality.
    pub fn new(time: TimeSec, target: TargetSize, assets: &'a dyn AssetProvider) -> Self {
        Self {
            time,
            target,
            quality: Quality::default(),
            generator_fallback: false,
            assets,
        }
    }

    /// The same context with the clock rewritten.
    pub fn with_time(self, time: TimeSec) -> Self {
        Self { time, ..self }
    }

    /// Stable fingerprint of the context values that affect node output.
    ///
    /// The asset provider is excluded: it is fixed for one render call.
    pub fn fingerprint(&self) -> u64 {
        let mut h = Fnv1a64::new_default();
        h.write_f64_bits(self.time.0);
        h.write_u32(self.target.width);
        h.write_u32(self.target.height);
        h.write_u8(match self.quality {
            Quality::Draft => 0,
            Quality::Full => 1,
        });
        h.write_u8(u8::from(self.generator_fallback));
        h.finish()
    }
}

impl std::fmt::Debug for RenderCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCtx")
            .field("time", &self.time)
            .field("target", &self.target)
            .field("quality", &self.quality)
            .finish()
    }
}

/// Cooperative cancellation handle for an in-flight render.
///
/// Cancellation stops the executor before its next dispatch; resources already
/// acquired are still returned to the pool.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
