//! SSD1683 controller driver: the black/white, black/white/red, and
//! black/white/yellow "wHAT" panels.

use std::time::Duration;

use crate::bus::SpiBus;
use crate::color::ColorName;
use crate::image::Image;
use crate::pin::{LineBias, LineMode, PinBank};

use super::{wait_for, ColorCapability, DisplayInfo, Inky, InkyCore, InkyError};

mod cmd {
    pub const DRIVER_CONTROL: u8 = 0x01;
    pub const DATA_MODE: u8 = 0x11;
    pub const SW_RESET: u8 = 0x12;
    pub const MASTER_ACTIVATE: u8 = 0x20;
    pub const WRITE_RAM: u8 = 0x24;
    pub const WRITE_ALTRAM: u8 = 0x26;
    pub const WRITE_VCOM: u8 = 0x2C;
    pub const WRITE_DUMMY: u8 = 0x3A;
    pub const WRITE_GATELINE: u8 = 0x3B;
    pub const WRITE_BORDER: u8 = 0x3C;
    pub const SET_RAMXPOS: u8 = 0x44;
    pub const SET_RAMYPOS: u8 = 0x45;
    pub const SET_RAMXCOUNT: u8 = 0x4E;
    pub const SET_RAMYCOUNT: u8 = 0x4F;
}

// BCM line numbers match the panel's fixed wiring.
const RST: u8 = 17;
const DC: u8 = 25;
const BUSY: u8 = 24;

const SPI_MAX_TRANSFER_BYTES: usize = 4096;

pub struct Ssd1683Inky {
    core: InkyCore,
    pins: PinBank,
    spi: SpiBus,
}

impl Ssd1683Inky {
    pub fn new(info: DisplayInfo, spi_device: &str, spi_speed_hz: u32) -> Result<Self, InkyError> {
        let pins = PinBank::new()?;
        pins.setup_line(RST, LineMode::Output, LineBias::Off)?;
        pins.setup_line(DC, LineMode::Output, LineBias::Off)?;
        pins.setup_line(BUSY, LineMode::Input, LineBias::Off)?;
        let spi = SpiBus::open(spi_device, spi_speed_hz, SPI_MAX_TRANSFER_BYTES)?;
        Ok(Self { core: InkyCore::new(info), pins, spi })
    }

    fn send_command(&mut self, cmd: u8) -> Result<(), InkyError> {
        self.pins.write(DC, false)?;
        self.spi.write(&[cmd])?;
        Ok(())
    }

    fn send_command_with_params(&mut self, cmd: u8, params: &[u8]) -> Result<(), InkyError> {
        self.send_command(cmd)?;
        if !params.is_empty() {
            self.pins.write(DC, true)?;
            self.spi.write(params)?;
        }
        Ok(())
    }

    fn send_buffer(&mut self, buf: &[u8]) -> Result<(), InkyError> {
        self.pins.write(DC, true)?;
        self.spi.write(buf)?;
        Ok(())
    }

    fn wait_for_busy(&self, timeout: Duration) -> Result<(), InkyError> {
        wait_for(|| Ok(!self.pins.read(BUSY)?), timeout, Duration::from_millis(10), "panel BUSY line")
    }

    fn reset(&mut self) -> Result<(), InkyError> {
        self.pins.write(RST, false)?;
        std::thread::sleep(Duration::from_millis(500));
        self.pins.write(RST, true)?;
        std::thread::sleep(Duration::from_millis(500));
        self.send_command(cmd::SW_RESET)?;
        std::thread::sleep(Duration::from_millis(1000));
        self.wait_for_busy(Duration::from_secs(5))
    }

    fn border_byte(&self) -> u8 {
        border_byte_for(self.core.border)
    }
}

fn border_byte_for(border: ColorName) -> u8 {
    match border {
        ColorName::Black => 0b0000_0000,
        ColorName::Red => 0b0000_0110,
        ColorName::Yellow => 0b0000_1111,
        _ => 0b0000_0001,
    }
}

fn validate_border_color(color: ColorName) -> Result<(), InkyError> {
    if matches!(color, ColorName::White | ColorName::Black | ColorName::Red | ColorName::Yellow) {
        Ok(())
    } else {
        Err(InkyError::InvalidArgument(format!("{color:?} is not a valid border color")))
    }
}

impl Inky for Ssd1683Inky {
    fn info(&self) -> &DisplayInfo {
        &self.core.info
    }

    fn set_image(&mut self, img: &Image) -> Result<(), InkyError> {
        self.core.set_image(img)
    }

    fn set_border(&mut self, color: ColorName) -> Result<(), InkyError> {
        validate_border_color(color)?;
        self.core.set_border(color);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), InkyError> {
        self.core.fill_with_border();
        Ok(())
    }

    fn show(&mut self) -> Result<(), InkyError> {
        self.reset()?;

        let w = self.core.info.width;
        let h = self.core.info.height;

        self.send_command_with_params(cmd::DRIVER_CONTROL, &[((h - 1) & 0xFF) as u8, ((h - 1) >> 8) as u8, 0x00])?;
        self.send_command_with_params(cmd::WRITE_DUMMY, &[0x1B])?;
        self.send_command_with_params(cmd::WRITE_GATELINE, &[0x0B])?;
        self.send_command_with_params(cmd::DATA_MODE, &[0x03])?;
        self.send_command_with_params(cmd::SET_RAMXPOS, &[0, (w / 8 - 1) as u8])?;
        self.send_command_with_params(cmd::SET_RAMYPOS, &[0, 0, ((h - 1) & 0xFF) as u8, ((h - 1) >> 8) as u8])?;
        self.send_command_with_params(cmd::WRITE_VCOM, &[0x70])?;
        self.send_command_with_params(cmd::WRITE_BORDER, &[self.border_byte()])?;
        self.send_command_with_params(cmd::SET_RAMXCOUNT, &[0])?;
        self.send_command_with_params(cmd::SET_RAMYCOUNT, &[0, 0])?;

        // `pack_{white,color}_plane` fill InkyCore's own scratch buffers in place;
        // lifting each one out with `mem::take` for the duration of the SPI write
        // (and putting it back after) lets `send_buffer` borrow `self` mutably
        // without aliasing `self.core`'s field, while still handing the same
        // allocation back to the core for the next frame instead of dropping it.
        let white_index = self.core.color_map.index_for_name(ColorName::White);
        self.core.pack_white_plane(white_index);
        let white_plane = std::mem::take(&mut self.core.white_plane);
        self.send_command(cmd::WRITE_RAM)?;
        self.send_buffer(&white_plane)?;
        self.core.white_plane = white_plane;

        let accent = match self.core.info.color_capability {
            ColorCapability::BlackWhiteRed => Some(ColorName::Red),
            ColorCapability::BlackWhiteYellow => Some(ColorName::Yellow),
            _ => None,
        };
        if let Some(accent) = accent {
            let accent_index = self.core.color_map.index_for_name(accent);
            self.core.pack_color_plane(accent_index);
            let color_plane = std::mem::take(&mut self.core.color_plane);
            self.send_command(cmd::WRITE_ALTRAM)?;
            self.send_buffer(&color_plane)?;
            self.core.color_plane = color_plane;
        }

        self.wait_for_busy(Duration::from_secs(5))?;
        self.send_command(cmd::MASTER_ACTIVATE)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_bytes_match_protocol_table() {
        assert_eq!(border_byte_for(ColorName::Black), 0x00);
        assert_eq!(border_byte_for(ColorName::Red), 0x06);
        assert_eq!(border_byte_for(ColorName::Yellow), 0x0F);
        assert_eq!(border_byte_for(ColorName::White), 0x01);
    }

    #[test]
    fn rejects_non_palette_border_colors() {
        assert!(validate_border_color(ColorName::Green).is_err());
        assert!(validate_border_color(ColorName::White).is_ok());
    }
}
