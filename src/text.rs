//! Bitmap font renderer: blits glyphs from a packed-bit font asset onto any
//! [`Image`](crate::image::Image). Builds entirely on [`BoundingBox`] clipping
//! and the indexed color machinery in [`crate::image`]/[`crate::color`]; no
//! bespoke glyph rasterizer.

use once_cell::sync::Lazy;

use crate::bbox::BoundingBox;
use crate::color::RgbaColor;
use crate::image::{bw_color_map, Image, ImageFormat};

/// A fixed font size. Each variant's glyph cell is `width x height` pixels; the backing asset
/// is a 16x16 grid of such cells (glyph `G` at cell `(G % 16, G / 16)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSize {
    Mono4x6,
    Mono6x6,
    Mono8x12,
}

impl FontSize {
    pub fn cell_size(self) -> (u32, u32) {
        match self {
            FontSize::Mono4x6 => (4, 6),
            FontSize::Mono6x6 => (6, 6),
            FontSize::Mono8x12 => (8, 12),
        }
    }

    fn packed_bits(self) -> &'static [u8] {
        match self {
            FontSize::Mono4x6 => include_bytes!("../assets/font_4x6.bin"),
            FontSize::Mono6x6 => include_bytes!("../assets/font_6x6.bin"),
            FontSize::Mono8x12 => include_bytes!("../assets/font_8x12.bin"),
        }
    }
}

/// A font's glyph sheet, unpacked once into a binarized `{Black=0,White=1}`
/// indexed image sized `16*cell_w x 16*cell_h`.
struct Font {
    cell_w: u32,
    cell_h: u32,
    sheet: Image,
}

impl Font {
    fn load(size: FontSize) -> Font {
        let (cell_w, cell_h) = size.cell_size();
        let grid_w = cell_w * 16;
        let grid_h = cell_h * 16;
        let bits = size.packed_bits();

        let map = bw_color_map();
        let mut sheet = Image::new_indexed(grid_w, grid_h, map);
        let row_bytes = (grid_w as usize).div_ceil(8);
        debug_assert_eq!(bits.len(), row_bytes * grid_h as usize);

        for y in 0..grid_h {
            for x in 0..grid_w {
                let bit_index = y as usize * row_bytes * 8 + x as usize;
                let byte = bits[bit_index / 8];
                let ink = (byte >> (7 - (bit_index % 8))) & 1 != 0;
                // Black(0) = ink, White(1) = background.
                sheet.set_indexed_pixel(x, y, if ink { 0 } else { 1 });
            }
        }

        Font { cell_w, cell_h, sheet }
    }

    fn glyph_cell(&self, code: u8) -> BoundingBox {
        let gx = (code as u32 % 16) * self.cell_w;
        let gy = (code as u32 / 16) * self.cell_h;
        BoundingBox::new(gx as i32, gy as i32, self.cell_w as i32, self.cell_h as i32)
    }

    fn pixel_is_ink(&self, x: u32, y: u32) -> bool {
        self.sheet.indexed_pixel(x, y) == 0
    }
}

static MONO_4X6: Lazy<Font> = Lazy::new(|| Font::load(FontSize::Mono4x6));
static MONO_6X6: Lazy<Font> = Lazy::new(|| Font::load(FontSize::Mono6x6));
static MONO_8X12: Lazy<Font> = Lazy::new(|| Font::load(FontSize::Mono8x12));

fn font_for(size: FontSize) -> &'static Font {
    match size {
        FontSize::Mono4x6 => &MONO_4X6,
        FontSize::Mono6x6 => &MONO_6X6,
        FontSize::Mono8x12 => &MONO_8X12,
    }
}

/// Horizontal alignment of the pen position passed to [`draw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub size: FontSize,
    pub color: RgbaColor,
    pub alignment: Alignment,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self { size: FontSize::Mono6x6, color: RgbaColor::opaque(0, 0, 0), alignment: Alignment::Left }
    }
}

/// Blit `text` onto `dest` with its pen anchored at `(x, y)`, adjusted for
/// `style.alignment`. Every non-background (ink) source pixel is written as
/// `style.color` (translated to the nearest palette index for indexed
/// destinations); background pixels are left untouched, so text overlays
/// rather than erasing a background rectangle first.
pub fn draw(text: &str, dest: &mut Image, x: i32, y: i32, style: TextStyle) {
    let font = font_for(style.size);
    let cw = font.cell_w as i32;
    let len = text.len() as i32;

    let mut pen_x = match style.alignment {
        Alignment::Left => x,
        Alignment::Center => x - len * cw / 2,
        Alignment::Right => x - len * cw,
    };

    let dest_bounds = BoundingBox::new(0, 0, dest.width() as i32, dest.height() as i32);

    for &byte in text.as_bytes() {
        let glyph_cell = font.glyph_cell(byte);

        // Clip the glyph cell against the destination, expressed in the
        // glyph sheet's own coordinate space by shifting the destination
        // bounds back by the current pen position.
        let dest_in_glyph_space = BoundingBox::new(
            dest_bounds.x - pen_x + glyph_cell.x,
            dest_bounds.y - pen_y(y) + glyph_cell.y,
            dest_bounds.width,
            dest_bounds.height,
        );
        let clipped = glyph_cell.clip_to(&dest_in_glyph_space);

        if !clipped.is_empty() {
            for gy in clipped.y..clipped.y + clipped.height {
                for gx in clipped.x..clipped.x + clipped.width {
                    if font.pixel_is_ink(gx as u32, gy as u32) {
                        let dx = gx - glyph_cell.x + pen_x;
                        let dy = gy - glyph_cell.y + pen_y(y);
                        if dx >= 0 && dy >= 0 && (dx as u32) < dest.width() && (dy as u32) < dest.height() {
                            set_text_pixel(dest, dx as u32, dy as u32, style.color);
                        }
                    }
                }
            }
        }

        pen_x += cw;
    }
}

fn pen_y(y: i32) -> i32 {
    y
}

fn set_text_pixel(dest: &mut Image, x: u32, y: u32, color: RgbaColor) {
    match dest.format() {
        ImageFormat::Rgba => dest.set_rgba_pixel(x, y, color),
        ImageFormat::Indexed => dest.set_pixel_color(x, y, color),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_font_sheet_unpacks_without_panicking() {
        for size in [FontSize::Mono4x6, FontSize::Mono6x6, FontSize::Mono8x12] {
            let font = font_for(size);
            assert_eq!(font.sheet.width(), font.cell_w * 16);
            assert_eq!(font.sheet.height(), font.cell_h * 16);
        }
    }

    #[test]
    fn draw_onto_rgba_paints_at_least_one_pixel_for_a_letter() {
        let mut img = Image::new_rgba(40, 20);
        let style = TextStyle { size: FontSize::Mono6x6, color: RgbaColor::opaque(255, 0, 0), ..Default::default() };
        draw("A", &mut img, 2, 2, style);

        let painted = img.rgba_pixels().iter().filter(|p| **p == RgbaColor::opaque(255, 0, 0)).count();
        assert!(painted > 0, "expected at least one red pixel from drawing 'A'");
    }

    #[test]
    fn draw_space_paints_nothing() {
        let mut img = Image::new_rgba(20, 20);
        let before = img.data().to_vec();
        draw(" ", &mut img, 2, 2, TextStyle::default());
        assert_eq!(img.data(), before.as_slice());
    }

    #[test]
    fn center_alignment_shifts_left_of_left_alignment() {
        let mut left_img = Image::new_rgba(60, 10);
        let mut center_img = Image::new_rgba(60, 10);
        let left_style = TextStyle { alignment: Alignment::Left, ..Default::default() };
        let center_style = TextStyle { alignment: Alignment::Center, ..Default::default() };

        draw("AB", &mut left_img, 30, 2, left_style);
        draw("AB", &mut center_img, 30, 2, center_style);

        let first_ink_x = |img: &Image| -> Option<u32> {
            for x in 0..img.width() {
                for y in 0..img.height() {
                    if img.rgba_pixels()[(y * img.width() + x) as usize] != RgbaColor::default() {
                        return Some(x);
                    }
                }
            }
            None
        };

        let l = first_ink_x(&left_img);
        let c = first_ink_x(&center_img);
        assert!(l.is_some() && c.is_some());
        assert!(c < l);
    }

    #[test]
    fn drawing_fully_off_canvas_does_not_panic() {
        let mut img = Image::new_rgba(10, 10);
        draw("hello", &mut img, -1000, -1000, TextStyle::default());
    }

    #[test]
    fn draw_onto_indexed_destination_uses_nearest_palette_index() {
        let map = bw_color_map();
        let mut img = Image::new_indexed(40, 20, map);
        let style = TextStyle { size: FontSize::Mono6x6, color: RgbaColor::opaque(0, 0, 0), ..Default::default() };
        draw("X", &mut img, 2, 2, style);
        assert!(img.data().iter().any(|&b| b == 0));
    }
}
