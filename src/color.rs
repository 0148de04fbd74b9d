//! Color types and the conversions between them: RGBA, HSV, CIE XYZ, and CIE
//! L*a*b*, plus the indexed-palette map used by dithering and the driver
//! core. All conversions here are total — they never fail.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved palette index meaning "not found" / invalid.
pub const INVALID_INDEX: u8 = 255;

/// A palette index into an [`IndexedColorMap`].
pub type IndexedColor = u8;

#[derive(Debug, Error)]
pub enum ColorError {
    #[error("color map cannot hold more than 254 entries, got {0}")]
    TooManyEntries(usize),
}

/// Four 8-bit channels, row-major, A defaulting to opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbaColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for RgbaColor {
    fn default() -> Self {
        Self { r: 0, g: 0, b: 0, a: 255 }
    }
}

impl RgbaColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// `0.299*R + 0.587*G + 0.114*B`, rounded to the nearest `u8`.
    pub fn gray_value(&self) -> u8 {
        let gray = 0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32;
        gray.round().clamp(0.0, 255.0) as u8
    }

    pub fn brightest_channel(&self) -> u8 {
        self.r.max(self.g).max(self.b)
    }

    /// Standard hexagonal HSV model. Saturation and hue are both 0 when the
    /// brightest channel is near zero.
    pub fn to_hsv(&self) -> HsvColor {
        let r = self.r as f32 / 255.0;
        let g = self.g as f32 / 255.0;
        let b = self.b as f32 / 255.0;
        let a = self.a as f32 / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let v = max;
        let s = if max > 1e-3 { delta / max } else { 0.0 };

        let h = if delta == 0.0 {
            0.0
        } else if max == r {
            (g - b) / delta
        } else if max == g {
            2.0 + (b - r) / delta
        } else {
            4.0 + (r - g) / delta
        };

        let h = ((h * 60.0) + 360.0) % 360.0;

        HsvColor { h, s, v, a }
    }

    /// sRGB -> linear (gamma 2.4, 0.04045 cutoff) -> D65 XYZ.
    pub fn to_xyz(&self) -> XyzColor {
        let decode = |c: u8| -> f64 {
            let c = c as f64 / 255.0;
            (if c > 0.04045 { ((c + 0.055) / 1.055).powf(2.4) } else { c / 12.92 }) * 100.0
        };

        let r = decode(self.r);
        let g = decode(self.g);
        let b = decode(self.b);

        XyzColor {
            x: r * 0.4124564 + g * 0.3575761 + b * 0.1804375,
            y: r * 0.2126729 + g * 0.7151522 + b * 0.0721750,
            z: r * 0.0193339 + g * 0.1191920 + b * 0.9503041,
        }
    }

    /// sRGB -> Lab via [`to_xyz`](Self::to_xyz), D65 white point normalized.
    pub fn to_lab(&self) -> LabColor {
        self.to_xyz().to_lab()
    }

    pub fn from_hex(s: &str) -> Result<Self, ColorDecodeError> {
        let s = s.strip_prefix('#').unwrap_or(s);
        let expand = |c: char| -> Option<String> { Some(format!("{c}{c}")) };

        let hex = match s.len() {
            3 => s.chars().map(expand).collect::<Option<Vec<_>>>().map(|v| v.concat()),
            6 => Some(s.to_string()),
            _ => None,
        }
        .ok_or_else(|| ColorDecodeError::BadLength(s.to_string()))?;

        let byte = |i: usize| -> Result<u8, ColorDecodeError> {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| ColorDecodeError::BadDigit(s.to_string()))
        };

        Ok(Self::opaque(byte(0)?, byte(2)?, byte(4)?))
    }
}

#[derive(Debug, Error)]
pub enum ColorDecodeError {
    #[error("hex color {0:?} must be 3 or 6 hex digits")]
    BadLength(String),
    #[error("hex color {0:?} contains a non-hex digit")]
    BadDigit(String),
}

/// Hexagonal hue/saturation/value with an alpha carried along for
/// round-tripping through [`RgbaColor`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HsvColor {
    pub h: f32,
    pub s: f32,
    pub v: f32,
    pub a: f32,
}

impl HsvColor {
    pub fn to_rgb(&self) -> RgbaColor {
        let range = (self.h / 60.0).floor() as i32;
        let c = self.v * self.s;
        let x = c * (1.0 - ((self.h / 60.0) % 2.0 - 1.0).abs());
        let m = self.v - c;

        let (r, g, b) = match range.rem_euclid(6) {
            0 => (c + m, x + m, m),
            1 => (x + m, c + m, m),
            2 => (m, c + m, x + m),
            3 => (m, x + m, c + m),
            4 => (x + m, m, c + m),
            _ => (c + m, m, x + m),
        };

        let to_u8 = |v: f32| (v * 255.0).clamp(0.0, 255.0) as u8;
        RgbaColor::new(to_u8(r), to_u8(g), to_u8(b), to_u8(self.a))
    }
}

/// CIE 1931 XYZ, D65-referenced.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct XyzColor {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

const D65_WHITE: (f64, f64, f64) = (95.047, 100.0, 108.883);
const LAB_EPSILON: f64 = 0.008856;
const LAB_KAPPA: f64 = 7.787;

impl XyzColor {
    pub fn to_rgb(&self) -> RgbaColor {
        let x = self.x / 100.0;
        let y = self.y / 100.0;
        let z = self.z / 100.0;

        let r = x * 3.2404542 + y * -1.5371385 + z * -0.4985314;
        let g = x * -0.9692660 + y * 1.8760108 + z * 0.0415560;
        let b = x * 0.0556434 + y * -0.2040259 + z * 1.0572252;

        let encode = |c: f64| -> u8 {
            let c = if c > 0.0031308 { 1.055 * c.powf(1.0 / 2.4) - 0.055 } else { 12.92 * c };
            (c * 255.0).clamp(0.0, 255.0) as u8
        };

        RgbaColor::opaque(encode(r), encode(g), encode(b))
    }

    pub fn to_lab(&self) -> LabColor {
        let f = |t: f64| if t > LAB_EPSILON { t.cbrt() } else { LAB_KAPPA * t + 16.0 / 116.0 };

        let x = f(self.x / D65_WHITE.0);
        let y = f(self.y / D65_WHITE.1);
        let z = f(self.z / D65_WHITE.2);

        LabColor {
            l: (116.0 * y - 16.0) as f32,
            a: (500.0 * (x - y)) as f32,
            b: (200.0 * (y - z)) as f32,
        }
    }
}

/// CIE L*a*b*, the working space for nearest-palette lookup and diffusion
/// dither. Supports componentwise arithmetic since diffusion dither needs to
/// add/scale residual error vectors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LabColor {
    pub l: f32,
    pub a: f32,
    pub b: f32,
}

impl LabColor {
    pub fn to_xyz(&self) -> XyzColor {
        let y = (self.l as f64 + 16.0) / 116.0;
        let x = self.a as f64 / 500.0 + y;
        let z = y - self.b as f64 / 200.0;

        let finv = |t: f64| {
            let t3 = t * t * t;
            if t3 > LAB_EPSILON { t3 } else { (t - 16.0 / 116.0) / LAB_KAPPA }
        };

        XyzColor {
            x: finv(x) * D65_WHITE.0,
            y: finv(y) * D65_WHITE.1,
            z: finv(z) * D65_WHITE.2,
        }
    }

    pub fn to_rgb(&self) -> RgbaColor {
        self.to_xyz().to_rgb()
    }

    /// Euclidean ΔE (ΔE 1976).
    pub fn delta_e(&self, other: &LabColor) -> f32 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        (dl * dl + da * da + db * db).sqrt()
    }
}

impl std::ops::Add for LabColor {
    type Output = LabColor;
    fn add(self, rhs: LabColor) -> LabColor {
        LabColor { l: self.l + rhs.l, a: self.a + rhs.a, b: self.b + rhs.b }
    }
}

impl std::ops::Sub for LabColor {
    type Output = LabColor;
    fn sub(self, rhs: LabColor) -> LabColor {
        LabColor { l: self.l - rhs.l, a: self.a - rhs.a, b: self.b - rhs.b }
    }
}

impl std::ops::Mul<f32> for LabColor {
    type Output = LabColor;
    fn mul(self, rhs: f32) -> LabColor {
        LabColor { l: self.l * rhs, a: self.a * rhs, b: self.b * rhs }
    }
}

/// A palette symbol. The same symbol may map to different indices (or even
/// collide with another symbol) across different palettes — see
/// [`IndexedColorMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorName {
    White,
    Black,
    Red,
    Yellow,
    Green,
    Blue,
    Orange,
}

/// An immutable, triple-indexed palette: index <-> name <-> RGBA/Lab.
/// Constructed once from `(name, index, rgba)` rows; all derived lookup
/// tables are precomputed at construction so dither loops never recompute a
/// Lab conversion per pixel.
#[derive(Debug, Clone)]
pub struct IndexedColorMap {
    index_to_name: HashMap<IndexedColor, ColorName>,
    index_to_rgba: HashMap<IndexedColor, RgbaColor>,
    index_to_lab: HashMap<IndexedColor, LabColor>,
    name_to_index: HashMap<ColorName, IndexedColor>,
}

impl IndexedColorMap {
    /// Fails with [`ColorError::TooManyEntries`] if more than 254 rows are
    /// given. Indices and names need not be globally unique across distinct
    /// rows beyond what the caller wants: BW/red and BW/yellow palettes
    /// intentionally reuse index 2 for both `Red` and `Yellow`.
    pub fn new(rows: Vec<(ColorName, IndexedColor, RgbaColor)>) -> Result<Self, ColorError> {
        if rows.len() > 254 {
            return Err(ColorError::TooManyEntries(rows.len()));
        }

        let mut index_to_name = HashMap::new();
        let mut index_to_rgba = HashMap::new();
        let mut index_to_lab = HashMap::new();
        let mut name_to_index = HashMap::new();

        for (name, index, rgba) in rows {
            index_to_name.insert(index, name);
            index_to_rgba.insert(index, rgba);
            index_to_lab.insert(index, rgba.to_lab());
            name_to_index.insert(name, index);
        }

        Ok(Self { index_to_name, index_to_rgba, index_to_lab, name_to_index })
    }

    pub fn len(&self) -> usize {
        self.index_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_name.is_empty()
    }

    pub fn name_for(&self, index: IndexedColor) -> Option<ColorName> {
        self.index_to_name.get(&index).copied()
    }

    pub fn to_rgba_color(&self, index: IndexedColor) -> RgbaColor {
        self.index_to_rgba.get(&index).copied().unwrap_or_default()
    }

    pub fn lab_for_index(&self, index: IndexedColor) -> LabColor {
        self.index_to_lab.get(&index).copied().unwrap_or_default()
    }

    pub fn index_for_name(&self, name: ColorName) -> IndexedColor {
        self.name_to_index.get(&name).copied().unwrap_or(INVALID_INDEX)
    }

    pub fn rgba_for_name(&self, name: ColorName) -> RgbaColor {
        self.to_rgba_color(self.index_for_name(name))
    }

    /// The index whose Lab color has minimum ΔE to `lab`. Returns the index
    /// and the residual `lab - palette_color_lab` (used by diffusion dither
    /// to propagate quantization error).
    pub fn to_indexed_color(&self, lab: LabColor) -> (IndexedColor, LabColor) {
        let mut best_index = INVALID_INDEX;
        let mut best_error = LabColor::default();
        let mut best_distance = f32::INFINITY;

        for (&index, &palette_lab) in &self.index_to_lab {
            let distance = lab.delta_e(&palette_lab);
            if distance < best_distance {
                best_distance = distance;
                best_index = index;
                best_error = lab - palette_lab;
            }
        }

        (best_index, best_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "{a} != {b} (eps {eps})");
    }

    #[test]
    fn hsv_round_trip_within_rounding() {
        for (r, g, b) in [(0u8, 0u8, 0u8), (255, 0, 0), (12, 200, 77), (255, 255, 255)] {
            let c = RgbaColor::opaque(r, g, b);
            let back = c.to_hsv().to_rgb();
            assert!((c.r as i16 - back.r as i16).abs() <= 1);
            assert!((c.g as i16 - back.g as i16).abs() <= 1);
            assert!((c.b as i16 - back.b as i16).abs() <= 1);
        }
    }

    #[test]
    fn hsv_zero_brightness_has_zero_sat_and_hue() {
        let hsv = RgbaColor::opaque(0, 0, 0).to_hsv();
        assert_eq!(hsv.s, 0.0);
        assert_eq!(hsv.h, 0.0);
    }

    #[test]
    fn lab_conversion_is_deterministic() {
        let c = RgbaColor::opaque(123, 45, 200);
        let a = c.to_lab();
        let b = c.to_lab();
        assert_close(a.l, b.l, 1e-3);
        assert_close(a.a, b.a, 1e-3);
        assert_close(a.b, b.b, 1e-3);
    }

    #[test]
    fn delta_e_is_symmetric_and_zero_for_self() {
        let a = RgbaColor::opaque(10, 200, 30).to_lab();
        let b = RgbaColor::opaque(250, 5, 90).to_lab();
        assert_close(a.delta_e(&b), b.delta_e(&a), 1e-4);
        assert_eq!(a.delta_e(&a), 0.0);
        assert!(a.delta_e(&b) >= 0.0);
    }

    #[test]
    fn gray_value_matches_luma_formula_rounded() {
        let c = RgbaColor::opaque(10, 20, 30);
        let expected = (0.299 * 10.0 + 0.587 * 20.0 + 0.114 * 30.0_f32).round() as u8;
        assert_eq!(c.gray_value(), expected);
    }

    #[test]
    fn map_rejects_more_than_254_entries() {
        let rows: Vec<_> = (0..255)
            .map(|i| (ColorName::Black, (i % 255) as u8, RgbaColor::default()))
            .collect();
        assert!(IndexedColorMap::new(rows).is_err());
    }

    #[test]
    fn map_round_trips_every_present_index() {
        let map = IndexedColorMap::new(vec![
            (ColorName::White, 0, RgbaColor::opaque(255, 255, 255)),
            (ColorName::Black, 1, RgbaColor::opaque(0, 0, 0)),
            (ColorName::Red, 2, RgbaColor::opaque(255, 0, 0)),
        ])
        .unwrap();

        for idx in [0u8, 1, 2] {
            let rgba = map.to_rgba_color(idx);
            let (back, _err) = map.to_indexed_color(rgba.to_lab());
            assert_eq!(back, idx);
        }
    }

    #[test]
    fn bw_and_bwy_collide_red_and_yellow_at_index_2() {
        let map = IndexedColorMap::new(vec![
            (ColorName::White, 0, RgbaColor::opaque(255, 255, 255)),
            (ColorName::Black, 1, RgbaColor::opaque(0, 0, 0)),
            (ColorName::Yellow, 2, RgbaColor::opaque(255, 0, 0)),
        ])
        .unwrap();
        assert_eq!(map.index_for_name(ColorName::Yellow), 2);
    }

    #[test]
    fn missing_lookups_return_defaults_not_panics() {
        let map = IndexedColorMap::new(vec![(ColorName::White, 0, RgbaColor::default())]).unwrap();
        assert_eq!(map.name_for(200), None);
        assert_eq!(map.to_rgba_color(200), RgbaColor::default());
        assert_eq!(map.index_for_name(ColorName::Green), INVALID_INDEX);
    }

    #[test]
    fn hex_parses_both_short_and_long_forms() {
        assert_eq!(RgbaColor::from_hex("#fff").unwrap(), RgbaColor::opaque(255, 255, 255));
        assert_eq!(RgbaColor::from_hex("00ff00").unwrap(), RgbaColor::opaque(0, 255, 0));
        assert!(RgbaColor::from_hex("#ff").is_err());
        assert!(RgbaColor::from_hex("#zzzzzz").is_err());
    }
}
