//! Separable resampling kernels used by [`crate::image::Image::scale`].
//!
//! The reference implementation delegates to an external resampling library
//! not present in this crate's lineage; the kernels below are implemented
//! from their well-known closed forms (the Mitchell-Netravila family covers
//! Bicubic/Mitchell/Cardinal/BSpline/Catmull as different `(B, C)` pairs,
//! per Mitchell & Netravali 1988) rather than translated from any source.

/// Interpolation kernel selection for [`Image::scale`](crate::image::Image::scale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    /// Bilinear when enlarging, Gaussian when reducing.
    #[default]
    Auto,
    Nearest,
    Average,
    Bilinear,
    Bicubic,
    Mitchell,
    Cardinal,
    BSpline,
    Lanczos,
    Lanczos2,
    Lanczos3,
    Lanczos4,
    Lanczos5,
    Catmull,
    Gaussian,
}

impl InterpolationMode {
    /// Resolve `Auto` against whether this axis is enlarging or reducing.
    /// Concrete kernels resolve to themselves.
    pub fn resolve(self, enlarging: bool) -> InterpolationMode {
        match self {
            InterpolationMode::Auto => {
                if enlarging {
                    InterpolationMode::Bilinear
                } else {
                    InterpolationMode::Gaussian
                }
            }
            other => other,
        }
    }
}

enum Kernel {
    Nearest,
    Box,
    Triangle,
    Cubic { b: f64, c: f64 },
    Lanczos { lobes: f64 },
    Gaussian { sigma: f64 },
}

impl Kernel {
    fn from_mode(mode: InterpolationMode) -> Kernel {
        match mode {
            InterpolationMode::Auto => unreachable!("Auto must be resolved before building a Kernel"),
            InterpolationMode::Nearest => Kernel::Nearest,
            InterpolationMode::Average => Kernel::Box,
            InterpolationMode::Bilinear => Kernel::Triangle,
            // Classic cubic convolution, a = -0.5.
            InterpolationMode::Bicubic => Kernel::Cubic { b: 0.0, c: 0.5 },
            InterpolationMode::Mitchell => Kernel::Cubic { b: 1.0 / 3.0, c: 1.0 / 3.0 },
            InterpolationMode::Cardinal => Kernel::Cubic { b: 0.0, c: 0.75 },
            InterpolationMode::BSpline => Kernel::Cubic { b: 1.0, c: 0.0 },
            InterpolationMode::Catmull => Kernel::Cubic { b: 0.0, c: 0.5 },
            InterpolationMode::Lanczos => Kernel::Lanczos { lobes: 3.0 },
            InterpolationMode::Lanczos2 => Kernel::Lanczos { lobes: 2.0 },
            InterpolationMode::Lanczos3 => Kernel::Lanczos { lobes: 3.0 },
            InterpolationMode::Lanczos4 => Kernel::Lanczos { lobes: 4.0 },
            InterpolationMode::Lanczos5 => Kernel::Lanczos { lobes: 5.0 },
            InterpolationMode::Gaussian => Kernel::Gaussian { sigma: 0.6 },
        }
    }

    fn support(&self) -> f64 {
        match self {
            Kernel::Nearest => 0.5,
            Kernel::Box => 0.5,
            Kernel::Triangle => 1.0,
            Kernel::Cubic { .. } => 2.0,
            Kernel::Lanczos { lobes } => *lobes,
            Kernel::Gaussian { sigma } => sigma * 3.0,
        }
    }

    fn weight(&self, x: f64) -> f64 {
        match self {
            Kernel::Nearest => {
                if x.abs() < 0.5 { 1.0 } else { 0.0 }
            }
            Kernel::Box => {
                if x.abs() <= 0.5 { 1.0 } else { 0.0 }
            }
            Kernel::Triangle => (1.0 - x.abs()).max(0.0),
            Kernel::Cubic { b, c } => mitchell_netravali(x, *b, *c),
            Kernel::Lanczos { lobes } => {
                if x.abs() < *lobes { sinc(x) * sinc(x / lobes) } else { 0.0 }
            }
            Kernel::Gaussian { sigma } => (-x * x / (2.0 * sigma * sigma)).exp(),
        }
    }
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 { 1.0 } else { (std::f64::consts::PI * x).sin() / (std::f64::consts::PI * x) }
}

/// Mitchell & Netravali's two-parameter cubic filter family. `(B, C) =
/// (1/3, 1/3)` is their recommended "Mitchell" filter; `(1, 0)` is the cubic
/// B-spline; `(0, 0.5)` is the Catmull-Rom spline.
fn mitchell_netravali(x: f64, b: f64, c: f64) -> f64 {
    let x = x.abs();
    let x2 = x * x;
    let x3 = x2 * x;

    if x < 1.0 {
        ((12.0 - 9.0 * b - 6.0 * c) * x3
            + (-18.0 + 12.0 * b + 6.0 * c) * x2
            + (6.0 - 2.0 * b))
            / 6.0
    } else if x < 2.0 {
        ((-b - 6.0 * c) * x3 + (6.0 * b + 30.0 * c) * x2 + (-12.0 * b - 30.0 * c) * x
            + (8.0 * b + 24.0 * c))
            / 6.0
    } else {
        0.0
    }
}

/// Resample one axis of a `channels`-interleaved buffer from `src_len` to
/// `dst_len` samples, leaving the other axis (`lines`, the count of
/// independent rows along the untouched axis) alone. Operates in `f32` to
/// avoid compounding rounding error across the horizontal and vertical
/// passes; the caller rounds once, at the very end.
fn resample_axis(src: &[f32], src_len: usize, lines: usize, channels: usize, dst_len: usize, kernel: &Kernel) -> Vec<f32> {
    let mut dst = vec![0.0f32; dst_len * lines * channels];

    if src_len == 0 || dst_len == 0 {
        return dst;
    }

    let scale = src_len as f64 / dst_len as f64;
    let filter_scale = scale.max(1.0);
    let support = kernel.support() * filter_scale;

    for j in 0..dst_len {
        let center = (j as f64 + 0.5) * scale - 0.5;
        let left = ((center - support).ceil() as isize).max(0);
        let right = ((center + support).floor() as isize).min(src_len as isize - 1);

        let mut weights: Vec<(usize, f64)> = Vec::with_capacity((right - left + 1).max(1) as usize);
        let mut sum = 0.0;
        for i in left..=right {
            let w = kernel.weight((center - i as f64) / filter_scale);
            if w != 0.0 {
                weights.push((i as usize, w));
                sum += w;
            }
        }

        if weights.is_empty() {
            let nearest = (center.round().clamp(0.0, src_len as f64 - 1.0)) as usize;
            weights.push((nearest, 1.0));
            sum = 1.0;
        }

        for line in 0..lines {
            for c in 0..channels {
                let mut acc = 0.0f64;
                for &(i, w) in &weights {
                    acc += (src[(line * src_len + i) * channels + c] as f64) * w;
                }
                dst[(line * dst_len + j) * channels + c] = (acc / sum) as f32;
            }
        }
    }

    dst
}

/// Resize an interleaved `u8` buffer of `src_w x src_h` pixels (`channels`
/// bytes/pixel) to `dst_w x dst_h` using separable 1-D convolution: the
/// horizontal pass resamples every row, the vertical pass resamples every
/// resulting column. Channel bytes are treated as plain numeric samples,
/// which is the correct behavior for RGBA but only a meaningful
/// interpolation for indexed-color buffers if the caller understands the
/// result no longer indexes a palette cleanly (indices aren't a continuous
/// quantity) — callers should scale before quantizing, not after, exactly as
/// the driver core's `setImage` does.
pub fn resize(src: &[u8], src_w: usize, src_h: usize, channels: usize, dst_w: usize, dst_h: usize, mode: InterpolationMode) -> Vec<u8> {
    if src_w == 0 || src_h == 0 {
        return vec![0u8; dst_w * dst_h * channels];
    }

    let h_mode = mode.resolve(dst_w > src_w);
    let v_mode = mode.resolve(dst_h > src_h);

    let src_f32: Vec<f32> = src.iter().map(|&b| b as f32).collect();

    // Horizontal pass: src_h independent rows of length src_w.
    let h_kernel = Kernel::from_mode(h_mode);
    let horiz = resample_axis(&src_f32, src_w, src_h, channels, dst_w, &h_kernel);

    // Vertical pass operates on columns; transpose-free by treating the
    // buffer as `dst_w` independent "rows" of length `src_h` via strided
    // access baked into resample_axis would complicate the inner loop, so
    // we transpose explicitly instead.
    let transposed = transpose(&horiz, dst_w, src_h, channels);
    let v_kernel = Kernel::from_mode(v_mode);
    let resized_transposed = resample_axis(&transposed, src_h, dst_w, channels, dst_h, &v_kernel);
    let result_f32 = transpose(&resized_transposed, dst_h, dst_w, channels);

    result_f32.iter().map(|&v| v.round().clamp(0.0, 255.0) as u8).collect()
}

/// Swap the two spatial axes of an interleaved buffer: `rows x cols x
/// channels` -> `cols x rows x channels`.
fn transpose(buf: &[f32], cols: usize, rows: usize, channels: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; buf.len()];
    for r in 0..rows {
        for c in 0..cols {
            for ch in 0..channels {
                out[(c * rows + r) * channels + ch] = buf[(r * cols + c) * channels + ch];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_identity_resize_is_unchanged() {
        let src = vec![10u8, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120];
        let out = resize(&src, 2, 2, 3, 2, 2, InterpolationMode::Nearest);
        assert_eq!(out, src);
    }

    #[test]
    fn enlarging_produces_requested_dimensions() {
        let src = vec![0u8, 0, 0, 255, 255, 255, 255, 255, 255, 0, 0, 0];
        let out = resize(&src, 2, 2, 3, 4, 4, InterpolationMode::Bilinear);
        assert_eq!(out.len(), 4 * 4 * 3);
    }

    #[test]
    fn reducing_produces_requested_dimensions() {
        let src = vec![128u8; 8 * 8 * 4];
        let out = resize(&src, 8, 8, 4, 3, 3, InterpolationMode::Gaussian);
        assert_eq!(out.len(), 3 * 3 * 4);
    }

    #[test]
    fn flat_image_resizes_to_same_flat_value() {
        let src = vec![200u8; 4 * 4 * 1];
        let out = resize(&src, 4, 4, 1, 6, 2, InterpolationMode::Lanczos3);
        assert!(out.iter().all(|&b| (b as i32 - 200).abs() <= 1));
    }
}
