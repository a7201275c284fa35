/// A point in composition time, in seconds.
///
/// Time is threaded through graph evaluation as part of the render context;
/// time-warp nodes derive a new `TimeSec` for their upstream subgraph only.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct TimeSec(pub f64);

impl TimeSec {
    /// Time zero.
    pub const ZERO: TimeSec = TimeSec(0.0);

    /// Seconds as `f64`.
    pub fn seconds(self) -> f64 {
        self.0
    }
}

/// Output dimensions of the frame being rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TargetSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl TargetSize {
    /// Construct a target size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Half resolution, rounding down with a floor of one pixel.
    pub fn half(self) -> Self {
        Self {
            width: (self.width / 2).max(1),
            height: (self.height / 2).max(1),
        }
    }

    /// Quarter resolution, rounding down with a floor of one pixel.
    pub fn quarter(self) -> Self {
        Self {
            width: (self.width / 4).max(1),
            height: (self.height / 4).max(1),
        }
    }
}

/// Rendering quality requested for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Quality {
    /// Reduced-cost evaluation for scrubbing and previews.
    Draft,
    /// Full-cost evaluation.
    #[default]
    Full,
}

/// Pixel format of a texture or rendered frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    /// 8-bit premultiplied RGBA.
    #[default]
    Rgba8,
    /// 16-bit float RGBA.
    Rgba16F,
}

impl PixelFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgba16F => 8,
        }
    }
}
