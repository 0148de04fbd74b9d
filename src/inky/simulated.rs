//! Simulated driver: same contract as a real panel, but `show()` writes
//! the frame buffer to a PNG instead of driving hardware. Useful for local
//! development and tests without a panel attached.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::color::ColorName;
use crate::image::Image;

use super::{DisplayInfo, Inky, InkyCore, InkyError};

pub struct SimulatedInky {
    core: InkyCore,
}

impl SimulatedInky {
    pub fn new(info: DisplayInfo) -> Self {
        Self { core: InkyCore::new(info) }
    }
}

impl Inky for SimulatedInky {
    fn info(&self) -> &DisplayInfo {
        &self.core.info
    }

    fn set_image(&mut self, img: &Image) -> Result<(), InkyError> {
        self.core.set_image(img)
    }

    fn set_border(&mut self, color: ColorName) -> Result<(), InkyError> {
        self.core.set_border(color);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), InkyError> {
        self.core.fill_with_border();
        Ok(())
    }

    fn show(&mut self) -> Result<(), InkyError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is after the Unix epoch")
            .as_millis();
        let path = format!("Inky_{millis}.png");
        self.core.frame.write_png(&path)?;
        tracing::info!(path, "wrote simulated frame");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::RgbaColor;
    use crate::inky::{ColorCapability, DisplayVariant};

    fn info() -> DisplayInfo {
        DisplayInfo {
            width: 4,
            height: 4,
            color_capability: ColorCapability::BlackWhiteRed,
            pcb_variant: 12,
            display_variant: DisplayVariant::RedWhatSsd1683,
            write_time: "2022-09-02 11:54:06.4".to_string(),
        }
    }

    /// Covers end-to-end scenario 5: drives a non-uniform source image through
    /// `set_image` + `show()` and asserts the written PNG actually reflects it
    /// (panel-sized, more than one distinct color), not just that some
    /// `Inky_*.png` file was created. A blank/untouched frame buffer would
    /// decode back as a single uniform color and fail this.
    #[test]
    fn show_after_set_image_writes_a_non_uniform_png() {
        let dir = tempfile::tempdir().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let mut driver = SimulatedInky::new(info());

        let mut source = Image::new_rgba(4, 4);
        for y in 0..4u32 {
            for x in 0..4u32 {
                let c = if (x + y) % 2 == 0 {
                    RgbaColor::opaque(0, 0, 0)
                } else {
                    RgbaColor::opaque(255, 255, 255)
                };
                source.set_rgba_pixel(x, y, c);
            }
        }
        driver.set_image(&source).unwrap();
        driver.show().unwrap();

        let written = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .find(|e| e.file_name().to_string_lossy().starts_with("Inky_"))
            .expect("show() should have written an Inky_*.png file");

        let decoded = image::open(written.path()).unwrap().to_rgba8();
        let (decoded_width, decoded_height) = decoded.dimensions();
        assert_eq!((decoded_width, decoded_height), (driver.info().width as u32, driver.info().height as u32));

        let raw = decoded.into_raw();
        let distinct: std::collections::HashSet<&[u8]> = raw.chunks_exact(4).collect();
        assert!(distinct.len() > 1, "simulated show() must not encode a uniform/blank frame");

        std::env::set_current_dir(prev).unwrap();
    }
}
