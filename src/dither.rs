//! Pattern (ordered) dither and Floyd-Steinberg diffusion dither, the two
//! ways an RGBA [`Image`](crate::image::Image) becomes an indexed one.

use thiserror::Error;

use crate::color::{IndexedColor, LabColor, RgbaColor};
use crate::image::{Image, ImageFormat};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DitherError {
    #[error("dither source must be RGBA")]
    SourceNotRgba,
    #[error("dither destination must be indexed color")]
    DestNotIndexed,
    #[error("dither destination must be non-empty")]
    DestEmpty,
    #[error("dither source ({src_w}x{src_h}) and destination ({dst_w}x{dst_h}) dimensions must match")]
    DimensionMismatch { src_w: u32, src_h: u32, dst_w: u32, dst_h: u32 },
}

fn check_src_dest(src: &Image, dst: &Image) -> Result<(), DitherError> {
    if src.format() != ImageFormat::Rgba {
        return Err(DitherError::SourceNotRgba);
    }
    if dst.format() != ImageFormat::Indexed {
        return Err(DitherError::DestNotIndexed);
    }
    if dst.width() == 0 || dst.height() == 0 {
        return Err(DitherError::DestEmpty);
    }
    if dst.width() != src.width() || dst.height() != src.height() {
        return Err(DitherError::DimensionMismatch {
            src_w: src.width(),
            src_h: src.height(),
            dst_w: dst.width(),
            dst_h: dst.height(),
        });
    }
    Ok(())
}

/// White/Black index constants used by pattern dither, which always
/// produces a pure black/white result regardless of the destination
/// palette's accent colors.
const PATTERN_WHITE: IndexedColor = 0;
const PATTERN_BLACK: IndexedColor = 1;

/// 17x16 ordered-dither lookup table: row `(gray + 8) & 0x1F0` selects a
/// 4x4 block of Black(1)/White(0) thresholds keyed by `(y%4, x%4)`. Every
/// byte is reproduced verbatim from the fixed table this crate is
/// wire-compatible with; it is a constant, not a derivable formula.
#[rustfmt::skip]
const DITHER_LUT: [u8; 272] = [
    // 0x00
    0, 0, 0, 0,  0, 0, 0, 0,  0, 0, 0, 0,  0, 0, 0, 0,
    // 0x10
    0, 0, 0, 0,  0, 0, 0, 0,  0, 0, 0, 0,  1, 0, 0, 0,
    // 0x20
    0, 0, 0, 0,  0, 0, 1, 0,  0, 0, 0, 0,  1, 0, 0, 0,
    // 0x30
    0, 0, 0, 0,  1, 0, 1, 0,  0, 0, 0, 0,  1, 0, 0, 0,
    // 0x40
    0, 0, 0, 0,  1, 0, 1, 0,  0, 0, 0, 0,  1, 0, 1, 0,
    // 0x50
    0, 0, 0, 0,  1, 0, 1, 0,  0, 1, 0, 0,  1, 0, 1, 0,
    // 0x60
    0, 0, 0, 1,  1, 0, 1, 0,  0, 1, 0, 0,  1, 0, 1, 0,
    // 0x70
    0, 0, 0, 1,  1, 0, 1, 0,  0, 1, 0, 1,  1, 0, 1, 0,
    // 0x80
    0, 1, 0, 1,  1, 0, 1, 0,  0, 1, 0, 1,  1, 0, 1, 0,
    // 0x90
    0, 1, 0, 1,  1, 0, 1, 0,  0, 1, 0, 1,  1, 1, 1, 0,
    // 0xA0
    0, 1, 0, 1,  1, 0, 1, 1,  0, 1, 0, 1,  1, 1, 1, 0,
    // 0xB0
    0, 1, 0, 1,  1, 0, 1, 1,  0, 1, 0, 1,  1, 1, 1, 1,
    // 0xC0
    0, 1, 0, 1,  1, 1, 1, 1,  0, 1, 0, 1,  1, 1, 1, 1,
    // 0xD0
    0, 1, 0, 1,  1, 1, 1, 1,  1, 1, 0, 1,  1, 1, 1, 1,
    // 0xE0
    0, 1, 1, 1,  1, 1, 1, 1,  1, 1, 0, 1,  1, 1, 1, 1,
    // 0xF0
    0, 1, 1, 1,  1, 1, 1, 1,  1, 1, 1, 1,  1, 1, 1, 1,
    // 0x100
    1, 1, 1, 1,  1, 1, 1, 1,  1, 1, 1, 1,  1, 1, 1, 1,
];

/// Ordered/Bayer-style dither. Deterministic in `src` alone; ignores any
/// accent colors in `dst`'s palette and always writes pure Black/White.
pub fn pattern_dither(src: &Image, dst: &mut Image) -> Result<(), DitherError> {
    check_src_dest(src, dst)?;

    let width = src.width() as usize;
    let height = src.height() as usize;
    let src_pixels = src.rgba_pixels();

    let mut out = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let gray = src_pixels[y * width + x].gray_value() as u32;
            let lut_row = (gray + 8) & 0x1F0;
            let lut_index = (lut_row as usize) + (y % 4) * 4 + (x % 4);
            out[y * width + x] =
                if DITHER_LUT[lut_index] != 0 { PATTERN_WHITE } else { PATTERN_BLACK };
        }
    }

    dst.data_mut().copy_from_slice(&out);
    Ok(())
}

/// Floyd-Steinberg error diffusion carried out in Lab space against `dst`'s
/// palette. `accuracy` is clamped to `[0, 1]`; `0.0` disables diffusion
/// entirely (pure nearest-palette thresholding), `1.0` is textbook F-S.
pub fn diffusion_dither(src: &Image, dst: &mut Image, accuracy: f32) -> Result<(), DitherError> {
    check_src_dest(src, dst)?;

    let width = src.width() as usize;
    let height = src.height() as usize;
    let accuracy = accuracy.clamp(0.0, 1.0);
    let color_map = dst.color_map().expect("checked Indexed above implies a color map");

    // A BW-only destination first desaturates the source so perceptual
    // lightness, not hue, drives the quantization.
    let is_bw_target = color_map.len() == 2;

    let mut work: Vec<LabColor> = src
        .rgba_pixels()
        .iter()
        .map(|&px| {
            if is_bw_target {
                let g = px.gray_value();
                RgbaColor::opaque(g, g, g).to_lab()
            } else {
                px.to_lab()
            }
        })
        .collect();

    let mut out = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let old = work[idx];
            let (best_index, mut err) = color_map.to_indexed_color(old);
            out[idx] = best_index;
            err = err * accuracy;

            if x + 1 < width {
                work[idx + 1] = work[idx + 1] + err * (7.0 / 16.0);
            }
            if x > 0 && y + 1 < height {
                work[idx + width - 1] = work[idx + width - 1] + err * (3.0 / 16.0);
            }
            if y + 1 < height {
                work[idx + width] = work[idx + width] + err * (5.0 / 16.0);
            }
            if x + 1 < width && y + 1 < height {
                work[idx + width + 1] = work[idx + width + 1] + err * (1.0 / 16.0);
            }
        }
    }

    dst.data_mut().copy_from_slice(&out);
    Ok(())
}

/// Simple non-diffusing BW threshold: White if `gray > thresh` else Black.
/// Not exposed on the public dither dispatch but useful on its own
/// (`fixedThresh`) as a cheap baseline; shares the same contract checks as
/// the two dither modes above.
pub fn fixed_threshold(src: &Image, dst: &mut Image, thresh: u8) -> Result<(), DitherError> {
    check_src_dest(src, dst)?;

    let out: Vec<u8> = src
        .rgba_pixels()
        .iter()
        .map(|px| if px.gray_value() > thresh { PATTERN_WHITE } else { PATTERN_BLACK })
        .collect();

    dst.data_mut().copy_from_slice(&out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorName, IndexedColorMap};

    fn bw_map() -> IndexedColorMap {
        IndexedColorMap::new(vec![
            (ColorName::White, 0, RgbaColor::opaque(255, 255, 255)),
            (ColorName::Black, 1, RgbaColor::opaque(0, 0, 0)),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_non_rgba_source() {
        let map = bw_map();
        let src = Image::new_indexed(2, 2, map.clone());
        let mut dst = Image::new_indexed(2, 2, map);
        assert_eq!(pattern_dither(&src, &mut dst), Err(DitherError::SourceNotRgba));
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let map = bw_map();
        let src = Image::new_rgba(2, 2);
        let mut dst = Image::new_indexed(3, 3, map);
        let result = diffusion_dither(&src, &mut dst, 1.0);
        assert!(matches!(result, Err(DitherError::DimensionMismatch { .. })));
    }

    #[test]
    fn checkerboard_diffusion_dither_matches_literal_bytes() {
        let map = bw_map();
        let black = RgbaColor::opaque(0, 0, 0);
        let white = RgbaColor::opaque(255, 255, 255);

        let mut src = Image::new_rgba(4, 4);
        for y in 0..4usize {
            for x in 0..4usize {
                let c = if (x + y) % 2 == 0 { black } else { white };
                src.set_rgba_pixel(x as u32, y as u32, c);
            }
        }

        let mut dst = Image::new_indexed(4, 4, map);
        diffusion_dither(&src, &mut dst, 1.0).unwrap();

        let expected: [u8; 16] =
            [1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1];
        assert_eq!(dst.data(), &expected);
    }

    #[test]
    fn pattern_dither_gradient_endpoints() {
        let map = bw_map();
        let mut src = Image::new_rgba(8, 1);
        for i in 0..8u32 {
            let g = ((i as u32 * 255) / 7) as u8;
            src.set_rgba_pixel(i, 0, RgbaColor::opaque(g, g, g));
        }

        let mut dst = Image::new_indexed(8, 1, map);
        pattern_dither(&src, &mut dst).unwrap();

        let out = dst.data();
        assert!(out.iter().all(|&b| b == 0 || b == 1));
        assert_eq!(out[0], PATTERN_BLACK);
        assert_eq!(out[7], PATTERN_WHITE);
    }

    #[test]
    fn diffusion_dither_zero_accuracy_is_pure_threshold() {
        let map = bw_map();
        let mut src = Image::new_rgba(3, 3);
        for y in 0..3u32 {
            for x in 0..3u32 {
                let g = ((x + y * 3) * 28) as u8;
                src.set_rgba_pixel(x, y, RgbaColor::opaque(g, g, g));
            }
        }

        let mut diffused = Image::new_indexed(3, 3, map.clone());
        diffusion_dither(&src, &mut diffused, 0.0).unwrap();

        let expected: Vec<u8> = src
            .rgba_pixels()
            .iter()
            .map(|px| {
                let g = px.gray_value();
                map.to_indexed_color(RgbaColor::opaque(g, g, g).to_lab()).0
            })
            .collect();

        assert_eq!(diffused.data(), expected.as_slice());
    }

    #[test]
    fn pattern_dither_is_deterministic() {
        let map = bw_map();
        let mut src = Image::new_rgba(5, 5);
        for y in 0..5u32 {
            for x in 0..5u32 {
                let g = ((x * 37 + y * 11) % 255) as u8;
                src.set_rgba_pixel(x, y, RgbaColor::opaque(g, g, g));
            }
        }

        let mut a = Image::new_indexed(5, 5, map.clone());
        let mut b = Image::new_indexed(5, 5, map);
        pattern_dither(&src, &mut a).unwrap();
        pattern_dither(&src, &mut b).unwrap();
        assert_eq!(a.data(), b.data());
    }
}
