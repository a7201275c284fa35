use std::sync::Arc;

use crate::exec::pool::Texture;
use crate::foundation::core::PixelFormat;
use crate::foundation::error::RenderError;
use crate::kernel::registry::{DispatchArgs, KernelKind, KernelRegistry, KernelSpec};

/// Kernel dispatched on synthesized resolution-adapter edges.
pub const RESIZE_KERNEL: &str = "resize_bilinear";

/// Kernel name of the intrinsic temporal-context rewrite node.
pub const TIME_WARP_KERNEL: &str = "time_warp";

/// Time-warp parameter: playback-rate multiplier applied to the incoming time.
pub const TIME_WARP_RATE_PARAM: &str = "rate";

/// Time-warp parameter: offset in seconds added after the rate is applied.
pub const TIME_WARP_OFFSET_PARAM: &str = "offset";

/// Register the intrinsic kernel set the executor depends on.
///
/// These are the kernels the engine itself needs regardless of which product
/// kernels ship: a neutral generator, a source-stream generator, the bilinear
/// resize adapter, source-over and crossfade compositors, and the structural
/// time-warp marker.
pub fn register_intrinsics(registry: &KernelRegistry) {
    registry.register(KernelSpec::new(
        "solid_color",
        KernelKind::Generator,
        Arc::new(solid_color),
    ));
    registry.register(KernelSpec::new(
        "source_stream",
        KernelKind::Generator,
        Arc::new(source_stream),
    ));
    registry.register(KernelSpec::new(
        RESIZE_KERNEL,
        KernelKind::Filter,
        Arc::new(resize_bilinear),
    ));
    registry.register(KernelSpec::new(
        "composite_over",
        KernelKind::Compositor { arity: 2 },
        Arc::new(composite_over),
    ));
    registry.register(KernelSpec::new(
        "crossfade",
        KernelKind::Compositor { arity: 2 },
        Arc::new(crossfade),
    ));
    // Handled structurally by the executor; the entry point is a no-op that
    // only exists so the name resolves during load validation.
    registry.register(KernelSpec::new(
        TIME_WARP_KERNEL,
        KernelKind::TimeWarp,
        Arc::new(|_args: &mut DispatchArgs<'_>| Ok(())),
    ));
}

fn require_rgba8(args: &DispatchArgs<'_>) -> Result<(), RenderError> {
    if args.output.desc.format != PixelFormat::Rgba8 {
        return Err(RenderError::Kernel {
            kernel: args.kernel.to_string(),
            message: format!("unsupported output format {:?}", args.output.desc.format),
        });
    }
    Ok(())
}

fn solid_color(args: &mut DispatchArgs<'_>) -> Result<(), RenderError> {
    require_rgba8(args)?;
    let color = args.param_color("color", [0.0, 0.0, 0.0, 1.0]);
    args.output.fill_rgba8(premul_from_straight(color));
    Ok(())
}

fn source_stream(args: &mut DispatchArgs<'_>) -> Result<(), RenderError> {
    require_rgba8(args)?;
    let Some(key) = args.param_choice("asset") else {
        return Err(RenderError::Kernel {
            kernel: args.kernel.to_string(),
            message: "missing 'asset' parameter".to_string(),
        });
    };

    let ctx = args.ctx;
    if ctx.assets.fill_source(key, ctx.time, args.output) {
        return Ok(());
    }

    if ctx.generator_fallback {
        tracing::warn!(asset = key, "source unavailable, substituting neutral frame");
        args.output.clear();
        return Ok(());
    }

    Err(RenderError::Kernel {
        kernel: args.kernel.to_string(),
        message: format!("asset '{key}' has no frame at t={}", ctx.time.0),
    })
}

fn resize_bilinear(args: &mut DispatchArgs<'_>) -> Result<(), RenderError> {
    let input = args.input_at(0)?;
    if input.desc.format != args.output.desc.format {
        return Err(RenderError::Kernel {
            kernel: args.kernel.to_string(),
            message: "input and output formats must match".to_string(),
        });
    }

    match args.output.desc.format {
        PixelFormat::Rgba8 => resize_bilinear_rgba8(input, args.output),
        // Wider formats resample nearest per pixel block.
        PixelFormat::Rgba16F => resize_nearest_blocks(input, args.output),
    }
    Ok(())
}

fn composite_over(args: &mut DispatchArgs<'_>) -> Result<(), RenderError> {
    require_rgba8(args)?;
    let backdrop = args.input_at(0)?;
    let source = args.input_at(1)?;
    let opacity = args.param_f64("opacity", 1.0) as f32;

    let width = args.output.desc.width;
    let height = args.output.desc.height;
    for y in 0..height {
        for x in 0..width {
            let u = (x as f32 + 0.5) / width as f32;
            let v = (y as f32 + 0.5) / height as f32;
            let dst = sample_nearest_rgba8(backdrop, u, v);
            let src = sample_nearest_rgba8(source, u, v);
            put_rgba8(args.output, x, y, over(dst, src, opacity));
        }
    }
    Ok(())
}

fn crossfade(args: &mut DispatchArgs<'_>) -> Result<(), RenderError> {
    require_rgba8(args)?;
    let a = args.input_at(0)?;
    let b = args.input_at(1)?;
    let t = args.param_f64("t", 0.5) as f32;

    let width = args.output.desc.width;
    let height = args.output.desc.height;
    for y in 0..height {
        for x in 0..width {
            let u = (x as f32 + 0.5) / width as f32;
            let v = (y as f32 + 0.5) / height as f32;
            let pa = sample_nearest_rgba8(a, u, v);
            let pb = sample_nearest_rgba8(b, u, v);
            put_rgba8(args.output, x, y, mix(pa, pb, t));
        }
    }
    Ok(())
}

fn premul_from_straight(color: [f32; 4]) -> [u8; 4] {
    let a = color[3].clamp(0.0, 1.0);
    let chan = |c: f32| ((c.clamp(0.0, 1.0) * a * 255.0) + 0.5) as u8;
    [
        chan(color[0]),
        chan(color[1]),
        chan(color[2]),
        ((a * 255.0) + 0.5) as u8,
    ]
}

fn pixel_rgba8(texture: &Texture, x: u32, y: u32) -> [u8; 4] {
    let idx = (y as usize * texture.desc.width as usize + x as usize) * 4;
    [
        texture.data[idx],
        texture.data[idx + 1],
        texture.data[idx + 2],
        texture.data[idx + 3],
    ]
}

fn put_rgba8(texture: &mut Texture, x: u32, y: u32, pixel: [u8; 4]) {
    let idx = (y as usize * texture.desc.width as usize + x as usize) * 4;
    texture.data[idx..idx + 4].copy_from_slice(&pixel);
}

// Normalized-coordinate sampling so compositors tolerate producer/consumer
// size mismatches under `EdgePolicy::RequireExplicitAdapters`.
fn sample_nearest_rgba8(texture: &Texture, u: f32, v: f32) -> [u8; 4] {
    let x = ((u * texture.desc.width as f32) as i64).clamp(0, texture.desc.width as i64 - 1);
    let y = ((v * texture.desc.height as f32) as i64).clamp(0, texture.desc.height as i64 - 1);
    pixel_rgba8(texture, x as u32, y as u32)
}

fn resize_bilinear_rgba8(input: &Texture, output: &mut Texture) {
    let (sw, sh) = (input.desc.width, input.desc.height);
    let (dw, dh) = (output.desc.width, output.desc.height);

    for y in 0..dh {
        let sy = ((y as f32 + 0.5) * sh as f32 / dh as f32 - 0.5).max(0.0);
        let y0 = (sy as u32).min(sh - 1);
        let y1 = (y0 + 1).min(sh - 1);
        let fy = sy - y0 as f32;

        for x in 0..dw {
            let sx = ((x as f32 + 0.5) * sw as f32 / dw as f32 - 0.5).max(0.0);
            let x0 = (sx as u32).min(sw - 1);
            let x1 = (x0 + 1).min(sw - 1);
            let fx = sx - x0 as f32;

            let p00 = pixel_rgba8(input, x0, y0);
            let p10 = pixel_rgba8(input, x1, y0);
            let p01 = pixel_rgba8(input, x0, y1);
            let p11 = pixel_rgba8(input, x1, y1);

            let mut out = [0u8; 4];
            for c in 0..4 {
                let top = p00[c] as f32 + (p10[c] as f32 - p00[c] as f32) * fx;
                let bottom = p01[c] as f32 + (p11[c] as f32 - p01[c] as f32) * fx;
                out[c] = (top + (bottom - top) * fy + 0.5) as u8;
            }
            put_rgba8(output, x, y, out);
        }
    }
}

fn resize_nearest_blocks(input: &Texture, output: &mut Texture) {
    let bpp = input.desc.format.bytes_per_pixel();
    let (sw, sh) = (input.desc.width as usize, input.desc.height as usize);
    let (dw, dh) = (output.desc.width as usize, output.desc.height as usize);

    for y in 0..dh {
        let sy = (y * sh / dh).min(sh - 1);
        for x in 0..dw {
            let sx = (x * sw / dw).min(sw - 1);
            let src = (sy * sw + sx) * bpp;
            let dst = (y * dw + x) * bpp;
            output.data[dst..dst + bpp].copy_from_slice(&input.data[src..src + bpp]);
        }
    }
}

fn over(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);
    let mut out = [0u8; 4];
    out[3] = mul_div255(u16::from(src[3]), op).saturating_add(mul_div255(u16::from(dst[3]), inv));
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

fn mix(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let tt = ((t * 255.0).round() as i32).clamp(0, 255) as u16;
    let it = 255u16 - tt;

    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = mul_div255(a[i].into(), it).saturating_add(mul_div255(b[i].into(), tt));
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
