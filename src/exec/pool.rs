use std::collections::HashMap;
use std::ops::BitOr;

use crate::foundation::core::PixelFormat;
use crate::foundation::error::RenderError;

/// Usage flags a texture is allocated with, part of the pool key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureUsage(u8);

impl TextureUsage {
    /// Readable from kernels.
    pub const SAMPLED: TextureUsage = TextureUsage(1);
    /// Writable as a dispatch output.
    pub const RENDER_TARGET: TextureUsage = TextureUsage(1 << 1);
    /// Readable back to the CPU.
    pub const READBACK: TextureUsage = TextureUsage(1 << 2);

    /// Whether all flags in `other` are set.
    pub fn contains(self, other: TextureUsage) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        TextureUsage::SAMPLED | TextureUsage::RENDER_TARGET
    }
}

impl BitOr for TextureUsage {
    type Output = TextureUsage;

    fn bitor(self, rhs: TextureUsage) -> TextureUsage {
        TextureUsage(self.0 | rhs.0)
    }
}

/// Allocation key for pooled textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureDesc {
    /// Construct a descriptor with default usage.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: TextureUsage::default(),
        }
    }

    /// Total backing-store size in bytes.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// A transient image resource owned by the [`ResourcePool`].
///
/// The pool exclusively owns allocation; the executor borrows a texture for
/// the window between one node's production and its last consumer. Reacquired
/// textures keep their previous contents; every kernel fully overwrites its
/// output.
#[derive(Clone, Debug)]
pub struct Texture {
    /// Descriptor this texture was allocated with.
    pub desc: TextureDesc,
    /// Raw pixel bytes, row-major.
    pub data: Vec<u8>,
    alloc_id: u64,
}

impl Texture {
    /// Stable identity of the underlying allocation, for observing reuse.
    pub fn alloc_id(&self) -> u64 {
        self.alloc_id
    }

    /// Fill with one RGBA8 pixel value. Only meaningful for
    /// [`PixelFormat::Rgba8`] textures.
    pub fn fill_rgba8(&mut self, pixel: [u8; 4]) {
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&pixel);
        }
    }

    /// Zero the backing store (transparent black in every format).
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

/// Counters exposed for pool observability and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Fresh allocations performed.
    pub allocated: u64,
    /// Acquisitions served from the free list.
    pub reused: u64,
}

/// Reuse cache for transient image allocations, keyed by
/// `(width, height, format, usage)`.
///
/// Explicitly cross-frame: acquire/release discipline lets one frame's
/// intermediates back the next frame's without allocation churn.
#[derive(Debug, Default)]
pub struct ResourcePool {
    free: HashMap<TextureDesc, Vec<Texture>>,
    live: usize,
    limit: Option<usize>,
    next_alloc_id: u64,
    stats: PoolStats,
}

impl ResourcePool {
    /// Create an unbounded pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool that refuses to exceed `limit` live textures.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Acquire a texture matching `desc`, reusing a free one when available.
    pub fn acquire(&mut self, desc: TextureDesc) -> Result<Texture, RenderError> {
        if let Some(bucket) = self.free.get_mut(&desc)
            && let Some(texture) = bucket.pop()
        {
            self.live += 1;
            self.stats.reused += 1;
            return Ok(texture);
        }

        if let Some(limit) = self.limit
            && self.live >= limit
        {
            return Err(RenderError::AllocationFailed { desc });
        }

        self.next_alloc_id += 1;
        self.live += 1;
        self.stats.allocated += 1;
        if self.stats.allocated.is_multiple_of(64) {
            tracing::debug!(allocated = self.stats.allocated, "resource pool grew");
        }
        Ok(Texture {
            desc,
            data: vec![0; desc.byte_len()],
            alloc_id: self.next_alloc_id,
        })
    }

    /// Return a texture to the pool for reuse.
    pub fn release(&mut self, texture: Texture) {
        self.live = self.live.saturating_sub(1);
        self.free.entry(texture.desc).or_default().push(texture);
    }

    /// Counters since construction.
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Number of textures currently acquired.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Drop all free textures, releasing their memory.
    pub fn trim(&mut self) {
        self.free.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/pool.rs"]
mod tests;
