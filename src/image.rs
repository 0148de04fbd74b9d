//! RGBA and indexed-color image buffers: scaling, cropping, and format
//! conversion. PNG/JPEG decode and encode are delegated to the `image`
//! crate, an external collaborator for the codec itself.

use std::path::Path;

use thiserror::Error;

use crate::bbox::BoundingBox;
use crate::color::{ColorName, IndexedColorMap, RgbaColor};
use crate::dither::{self, DitherError};
use crate::resample::{self, InterpolationMode};

#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Dither(#[from] DitherError),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Rgba,
    Indexed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitherMode {
    #[default]
    Diffusion,
    Pattern,
}

#[derive(Debug, Clone, Copy)]
pub struct DitherSettings {
    pub mode: DitherMode,
    /// Clamped to `[0, 1]` before use; ignored entirely by `Pattern`.
    pub accuracy: f32,
}

impl Default for DitherSettings {
    fn default() -> Self {
        Self { mode: DitherMode::default(), accuracy: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMode {
    #[default]
    Stretch,
    Fit,
    Fill,
}

#[derive(Debug, Clone, Copy)]
pub struct ScaleSettings {
    pub scale_mode: ScaleMode,
    pub interpolation: InterpolationMode,
    /// Fills otherwise-uncovered pixels on `scale`/`crop`.
    pub background: RgbaColor,
}

impl Default for ScaleSettings {
    fn default() -> Self {
        Self {
            scale_mode: ScaleMode::default(),
            interpolation: InterpolationMode::default(),
            background: RgbaColor::opaque(255, 255, 255),
        }
    }
}

/// An RGBA (4 bytes/pixel) or indexed-color (1 byte/pixel) row-major image
/// buffer with no stride padding. Cheap to clone by value (the heap buffer
/// and, for indexed images, the color map are cloned along with it).
#[derive(Debug, Clone)]
pub struct Image {
    width: u32,
    height: u32,
    format: ImageFormat,
    data: Vec<u8>,
    color_map: Option<IndexedColorMap>,
}

impl Image {
    pub fn new_rgba(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: ImageFormat::Rgba,
            data: vec![0u8; (width * height * 4) as usize],
            color_map: None,
        }
    }

    pub fn new_indexed(width: u32, height: u32, color_map: IndexedColorMap) -> Self {
        Self {
            width,
            height,
            format: ImageFormat::Indexed,
            data: vec![0u8; (width * height) as usize],
            color_map: Some(color_map),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn color_map(&self) -> Option<&IndexedColorMap> {
        self.color_map.as_ref()
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self.format {
            ImageFormat::Rgba => 4,
            ImageFormat::Indexed => 1,
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Read out every pixel as `RgbaColor`. Only meaningful when
    /// `format() == Rgba`.
    pub fn rgba_pixels(&self) -> Vec<RgbaColor> {
        debug_assert_eq!(self.format, ImageFormat::Rgba);
        self.data
            .chunks_exact(4)
            .map(|c| RgbaColor::new(c[0], c[1], c[2], c[3]))
            .collect()
    }

    pub fn set_rgba_pixel(&mut self, x: u32, y: u32, color: RgbaColor) {
        debug_assert_eq!(self.format, ImageFormat::Rgba);
        let i = ((y * self.width + x) * 4) as usize;
        self.data[i..i + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
    }

    pub fn indexed_pixel(&self, x: u32, y: u32) -> u8 {
        debug_assert_eq!(self.format, ImageFormat::Indexed);
        self.data[(y * self.width + x) as usize]
    }

    pub fn set_indexed_pixel(&mut self, x: u32, y: u32, index: u8) {
        debug_assert_eq!(self.format, ImageFormat::Indexed);
        self.data[(y * self.width + x) as usize] = index;
    }

    /// Write `color` at `(x, y)`, translating to the nearest palette index
    /// first if this image is indexed.
    pub fn set_pixel_color(&mut self, x: u32, y: u32, color: RgbaColor) {
        match self.format {
            ImageFormat::Rgba => self.set_rgba_pixel(x, y, color),
            ImageFormat::Indexed => {
                let map = self.color_map.as_ref().expect("indexed image always carries a color map");
                let (index, _err) = map.to_indexed_color(color.to_lab());
                self.set_indexed_pixel(x, y, index);
            }
        }
    }

    /// Convert to indexed color against `color_map`. If already indexed,
    /// first expands to RGBA then quantizes again (matches the reference
    /// behavior of routing indexed-to-indexed conversions through RGBA
    /// rather than remapping palette indices directly).
    pub fn to_indexed(&self, color_map: IndexedColorMap, settings: DitherSettings) -> Result<Image, ImageError> {
        if self.format == ImageFormat::Indexed {
            return self.to_rgba().to_indexed(color_map, settings);
        }

        let mut dest = Image::new_indexed(self.width, self.height, color_map);
        match settings.mode {
            DitherMode::Pattern => dither::pattern_dither(self, &mut dest)?,
            DitherMode::Diffusion => dither::diffusion_dither(self, &mut dest, settings.accuracy)?,
        }
        Ok(dest)
    }

    /// Expand to RGBA. A no-op clone if already RGBA.
    pub fn to_rgba(&self) -> Image {
        if self.format == ImageFormat::Rgba {
            return self.clone();
        }

        let map = self.color_map.as_ref().expect("indexed image always carries a color map");
        let mut out = Image::new_rgba(self.width, self.height);
        for (i, &index) in self.data.iter().enumerate() {
            let rgba = map.to_rgba_color(index);
            out.data[i * 4..i * 4 + 4].copy_from_slice(&[rgba.r, rgba.g, rgba.b, rgba.a]);
        }
        out
    }

    /// Resample to `(width, height)` honoring `settings.scale_mode`, then
    /// center-crop/pad to exactly `(width, height)` if the scale mode
    /// produced a different intermediate size (`Fill`/`Fit`).
    pub fn scale(&self, width: u32, height: u32, settings: ScaleSettings) -> Image {
        if self.width == 0 || self.height == 0 || width == 0 || height == 0 {
            return match self.format {
                ImageFormat::Rgba => Image::new_rgba(width, height),
                ImageFormat::Indexed => {
                    Image::new_indexed(width, height, self.color_map.clone().unwrap())
                }
            };
        }

        let x_scale = width as f64 / self.width as f64;
        let y_scale = height as f64 / self.height as f64;

        let scale = match settings.scale_mode {
            ScaleMode::Stretch => None,
            ScaleMode::Fill => Some(x_scale.max(y_scale)),
            ScaleMode::Fit => Some(x_scale.min(y_scale)),
        };

        let (resized_w, resized_h) = match scale {
            None => (width, height),
            Some(s) => (
                ((self.width as f64) * s).round().max(1.0) as u32,
                ((self.height as f64) * s).round().max(1.0) as u32,
            ),
        };

        let bpp = self.bytes_per_pixel() as usize;
        let resized_data = resample::resize(
            &self.data,
            self.width as usize,
            self.height as usize,
            bpp,
            resized_w as usize,
            resized_h as usize,
            settings.interpolation,
        );

        let resized = Image {
            width: resized_w,
            height: resized_h,
            format: self.format,
            data: resized_data,
            color_map: self.color_map.clone(),
        };

        if resized_w != width || resized_h != height {
            let x = (resized_w as i32 - width as i32) / 2;
            let y = (resized_h as i32 - height as i32) / 2;
            resized.crop(x, y, width, height, settings)
        } else {
            resized
        }
    }

    /// Crop (or pad, for negative/oversized requests) to `(width, height)`
    /// starting at source origin `(x, y)`. Uncovered destination pixels are
    /// filled with `settings.background` (translated to the nearest palette
    /// index for indexed images).
    pub fn crop(&self, x: i32, y: i32, width: u32, height: u32, settings: ScaleSettings) -> Image {
        if x == 0 && y == 0 && width == self.width && height == self.height {
            return self.clone();
        }

        let bpp = self.bytes_per_pixel() as usize;
        let mut out = match self.format {
            ImageFormat::Rgba => Image::new_rgba(width, height),
            ImageFormat::Indexed => Image::new_indexed(width, height, self.color_map.clone().unwrap()),
        };

        let bg_bytes: Vec<u8> = match self.format {
            ImageFormat::Rgba => vec![
                settings.background.r,
                settings.background.g,
                settings.background.b,
                settings.background.a,
            ],
            ImageFormat::Indexed => {
                let map = self.color_map.as_ref().unwrap();
                vec![map.to_indexed_color(settings.background.to_lab()).0]
            }
        };
        for chunk in out.data.chunks_exact_mut(bpp) {
            chunk.copy_from_slice(&bg_bytes);
        }

        let src_x = x.max(0);
        let src_y = y.max(0);
        let dst_x = (-x).max(0);
        let dst_y = (-y).max(0);

        let cpy_w = ((width as i32 - dst_x).min(self.width as i32 - src_x)).max(0) as u32;
        let cpy_h = ((height as i32 - dst_y).min(self.height as i32 - src_y)).max(0) as u32;

        for row in 0..cpy_h {
            let src_row = (src_y + row as i32) as u32;
            let dst_row = (dst_y + row as i32) as u32;
            let src_start = ((src_row * self.width + src_x as u32) as usize) * bpp;
            let dst_start = ((dst_row * width + dst_x as u32) as usize) * bpp;
            let len = cpy_w as usize * bpp;
            out.data[dst_start..dst_start + len]
                .copy_from_slice(&self.data[src_start..src_start + len]);
        }

        out
    }

    /// Decode a PNG or JPEG file from disk, always producing an RGBA image
    /// (RGB images are always promoted to RGBA on read).
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Image, ImageError> {
        let decoded = image::open(path.as_ref()).map_err(|e| ImageError::Decode(e.to_string()))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = (rgba.width(), rgba.height());
        Ok(Image { width, height, format: ImageFormat::Rgba, data: rgba.into_raw(), color_map: None })
    }

    /// Encode as an 8-bit RGBA PNG at `path`, converting to RGBA first if
    /// this image is indexed.
    pub fn write_png<P: AsRef<Path>>(&self, path: P) -> Result<(), ImageError> {
        let rgba = self.to_rgba();
        let buffer = image::RgbaImage::from_raw(rgba.width, rgba.height, rgba.data)
            .ok_or_else(|| ImageError::Encode("pixel buffer size does not match dimensions".into()))?;
        buffer.save(path.as_ref()).map_err(|e| ImageError::Encode(e.to_string()))?;
        Ok(())
    }
}

/// The trivial `{Black=0, White=1}` map used to binarize bitmap font glyphs
/// and other BW-only assets. Kept here rather than constructed ad hoc so
/// every caller shares the exact same index assignment.
pub fn bw_color_map() -> IndexedColorMap {
    IndexedColorMap::new(vec![
        (ColorName::Black, 0, RgbaColor::opaque(0, 0, 0)),
        (ColorName::White, 1, RgbaColor::opaque(255, 255, 255)),
    ])
    .expect("two entries is always within the 254-row limit")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgbw_map() -> IndexedColorMap {
        IndexedColorMap::new(vec![
            (ColorName::White, 0, RgbaColor::opaque(255, 255, 255)),
            (ColorName::Black, 1, RgbaColor::opaque(0, 0, 0)),
            (ColorName::Red, 2, RgbaColor::opaque(255, 0, 0)),
        ])
        .unwrap()
    }

    #[test]
    fn stretch_scale_has_requested_bounds() {
        let img = Image::new_rgba(3, 5);
        let scaled = img.scale(10, 10, ScaleSettings { scale_mode: ScaleMode::Stretch, ..Default::default() });
        assert_eq!(scaled.bounds(), BoundingBox::new(0, 0, 10, 10));
    }

    #[test]
    fn crop_matches_literal_negative_origin_scenario() {
        let mut img = Image::new_rgba(10, 10);
        for y in 0..10u32 {
            for x in 0..10u32 {
                img.set_rgba_pixel(x, y, RgbaColor::opaque(x as u8, y as u8, 0));
            }
        }

        let settings = ScaleSettings { background: RgbaColor::opaque(0, 255, 0), ..Default::default() };
        let cropped = img.crop(-2, -2, 6, 6, settings);

        // src_x = src_y = 0, dst_x = dst_y = 2, cpy_w = cpy_h = 4: the copied
        // source block lands at destination rows/cols 2..6, so row 0 (and
        // row 1, and cols 0-1 of every row) stay background, not source data.
        let pixels = cropped.rgba_pixels();
        let green = RgbaColor::opaque(0, 255, 0);
        for x in 0..6u32 {
            assert_eq!(pixels[x as usize], green, "row 0 is entirely background");
        }
        for sx in 0..4u32 {
            assert_eq!(pixels[2 * 6 + 2 + sx as usize], img.rgba_pixels()[sx as usize]);
        }
    }

    #[test]
    fn crop_whole_image_is_identity() {
        let img = Image::new_rgba(4, 4);
        let cropped = img.crop(0, 0, 4, 4, ScaleSettings::default());
        assert_eq!(cropped.data(), img.data());
    }

    #[test]
    fn to_rgba_then_to_indexed_round_trips_every_palette_color() {
        let map = rgbw_map();
        let mut indexed = Image::new_indexed(3, 1, map.clone());
        indexed.set_indexed_pixel(0, 0, 0);
        indexed.set_indexed_pixel(1, 0, 1);
        indexed.set_indexed_pixel(2, 0, 2);

        let back = indexed
            .to_indexed(map, DitherSettings { mode: DitherMode::Diffusion, accuracy: 1.0 })
            .unwrap();
        assert_eq!(back.data(), indexed.data());
    }

    #[test]
    fn rgba_in_place_to_rgba_is_noop_clone() {
        let mut img = Image::new_rgba(2, 2);
        img.set_rgba_pixel(0, 0, RgbaColor::opaque(9, 9, 9));
        let copy = img.to_rgba();
        assert_eq!(copy.data(), img.data());
    }

    #[test]
    fn zero_sized_image_is_valid() {
        let img = Image::new_rgba(0, 0);
        assert_eq!(img.data().len(), 0);
        assert_eq!(img.bounds(), BoundingBox::new(0, 0, 0, 0));
    }
}
