//! UC8159 controller driver: the seven-color panels. This controller family left this
//! backend as a near-empty stub (dispatch to it was even commented out);
//! this crate wires construction up (palette, frame buffer sizing) but
//! doesn't know the manufacturer's seven-color init sequence, so `reset`
//! and `show` report `Unsupported` explicitly rather than silently
//! dropping the frame.

use crate::color::ColorName;
use crate::image::Image;

use super::{DisplayInfo, Inky, InkyCore, InkyError};

pub struct Uc8159Inky {
    core: InkyCore,
}

impl Uc8159Inky {
    pub fn new(info: DisplayInfo) -> Self {
        Self { core: InkyCore::new(info) }
    }
}

impl Inky for Uc8159Inky {
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
        Err(InkyError::Unsupported("UC8159 seven-color panel init sequence is not implemented".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inky::{ColorCapability, DisplayVariant};

    fn info() -> DisplayInfo {
        DisplayInfo {
            width: 640,
            height: 400,
            color_capability: ColorCapability::SevenColor,
            pcb_variant: 1,
            display_variant: DisplayVariant::SevenColourUc8159,
            write_time: String::new(),
        }
    }

    #[test]
    fn construction_succeeds_but_show_is_unsupported() {
        let mut driver = Uc8159Inky::new(info());
        assert_eq!(driver.info().width, 640);
        assert!(matches!(driver.show(), Err(InkyError::Unsupported(_))));
    }
}
