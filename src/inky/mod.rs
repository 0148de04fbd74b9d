//! Driver core: EEPROM identification, the factory that picks a panel
//! backend, and the state/ops shared by every backend (indexed frame
//! buffer, border color, bit-plane packing).

mod simulated;
mod ssd1683;
mod uc8159;

pub use simulated::SimulatedInky;
pub use ssd1683::Ssd1683Inky;
pub use uc8159::Uc8159Inky;

use std::time::Duration;

use thiserror::Error;

use crate::bus::{BusError, I2cBus};
use crate::color::{ColorName, IndexedColor, IndexedColorMap, RgbaColor};
use crate::image::{DitherMode, DitherSettings, Image, ImageError, ScaleMode, ScaleSettings};
use crate::pin::PinError;

#[derive(Debug, Error)]
pub enum InkyError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("timed out waiting for {0}")]
    TimedOut(String),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Pin(#[from] PinError),
    #[error(transparent)]
    Image(#[from] ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorCapability {
    BlackWhite = 1,
    BlackWhiteRed = 2,
    BlackWhiteYellow = 3,
    SevenColor = 5,
}

impl ColorCapability {
    fn try_from_u8(raw: u8) -> Result<Self, InkyError> {
        match raw {
            1 => Ok(Self::BlackWhite),
            2 => Ok(Self::BlackWhiteRed),
            3 => Ok(Self::BlackWhiteYellow),
            5 => Ok(Self::SevenColor),
            other => Err(InkyError::InvalidArgument(format!("unknown color capability byte {other}"))),
        }
    }

    /// Palette for this capability. BWY intentionally collides `Yellow`
    /// with `Red` at index 2: the wire protocol drives the same alt-plane
    /// either way, it's only the border/VCOM bits that differ.
    pub fn color_map(&self) -> IndexedColorMap {
        let white = (ColorName::White, 0, RgbaColor::opaque(255, 255, 255));
        let black = (ColorName::Black, 1, RgbaColor::opaque(0, 0, 0));
        let rows = match self {
            Self::BlackWhite => vec![white, black],
            Self::BlackWhiteRed => vec![white, black, (ColorName::Red, 2, RgbaColor::opaque(255, 0, 0))],
            Self::BlackWhiteYellow => {
                vec![white, black, (ColorName::Yellow, 2, RgbaColor::opaque(255, 255, 0))]
            }
            Self::SevenColor => vec![
                white,
                black,
                (ColorName::Red, 2, RgbaColor::opaque(255, 0, 0)),
                (ColorName::Yellow, 3, RgbaColor::opaque(255, 255, 0)),
                (ColorName::Green, 4, RgbaColor::opaque(0, 255, 0)),
                (ColorName::Blue, 5, RgbaColor::opaque(0, 0, 255)),
                (ColorName::Orange, 6, RgbaColor::opaque(255, 140, 0)),
            ],
        };
        IndexedColorMap::new(rows).expect("fixed small palettes are always under the row cap")
    }
}

/// Panel model/size identity, decoded from the on-HAT EEPROM (or
/// hard-coded for the simulated backend). Byte layout: see
/// [`read_eeprom`].
///
/// Red and Black trade discriminants here (17/18) from the more common
/// convention of assigning Black before Red: the EEPROM test fixture below
/// requires byte 0x11 (17) to decode as `RedWhatSsd1683`, which only holds
/// with this ordering, and nothing else pins it either way. See DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayVariant {
    RedPhatHighTemp = 1,
    YellowWhat = 2,
    BlackWhat = 3,
    BlackPhat = 4,
    YellowPhat = 5,
    RedWhat = 6,
    RedWhatHighTemp = 7,
    RedWhatV2 = 8,
    BlackPhatSsd1608 = 10,
    RedPhatSsd1608 = 11,
    YellowPhatSsd1608 = 12,
    SevenColourUc8159 = 14,
    SevenColour640x400Uc8159 = 15,
    SevenColour640x400Uc8159V2 = 16,
    RedWhatSsd1683 = 17,
    BlackWhatSsd1683 = 18,
    YellowWhatSsd1683 = 19,
}

impl DisplayVariant {
    fn try_from_u8(raw: u8) -> Result<Self, InkyError> {
        Ok(match raw {
            1 => Self::RedPhatHighTemp,
            2 => Self::YellowWhat,
            3 => Self::BlackWhat,
            4 => Self::BlackPhat,
            5 => Self::YellowPhat,
            6 => Self::RedWhat,
            7 => Self::RedWhatHighTemp,
            8 => Self::RedWhatV2,
            10 => Self::BlackPhatSsd1608,
            11 => Self::RedPhatSsd1608,
            12 => Self::YellowPhatSsd1608,
            14 => Self::SevenColourUc8159,
            15 => Self::SevenColour640x400Uc8159,
            16 => Self::SevenColour640x400Uc8159V2,
            17 => Self::RedWhatSsd1683,
            18 => Self::BlackWhatSsd1683,
            19 => Self::YellowWhatSsd1683,
            other => return Err(InkyError::InvalidArgument(format!("unknown display variant byte {other}"))),
        })
    }

    fn border_accent(&self) -> Option<ColorName> {
        match self {
            Self::RedWhatSsd1683 => Some(ColorName::Red),
            Self::BlackWhatSsd1683 => None,
            Self::YellowWhatSsd1683 => Some(ColorName::Yellow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisplayInfo {
    pub width: u16,
    pub height: u16,
    pub color_capability: ColorCapability,
    pub pcb_variant: u8,
    pub display_variant: DisplayVariant,
    pub write_time: String,
}

const EEPROM_SLAVE_ADDRESS: u16 = 0x50;
const EEPROM_LENGTH: usize = 29;
const EEPROM_READ_DELAY_MS: u64 = 8;
const MAX_WRITE_TIME_LEN: usize = 21;

/// Read and parse the 29-byte little-endian EEPROM layout at I²C slave
/// 0x50: `u16 width | u16 height | u8 colorCapability | u8 pcbVariant | u8
/// displayVariant | u8 timeLen | timeBytes[<=21]`. `timeLen` is capped at
/// 21 to guard against malformed EEPROMs claiming more bytes than the
/// fixed-size record can hold.
pub fn read_eeprom(i2c_device: &str) -> Result<DisplayInfo, InkyError> {
    let mut bus = I2cBus::open(i2c_device, EEPROM_SLAVE_ADDRESS)?;
    let mut raw = [0u8; EEPROM_LENGTH];
    bus.read(0, &mut raw, EEPROM_READ_DELAY_MS)?;
    parse_eeprom(&raw)
}

fn parse_eeprom(raw: &[u8; EEPROM_LENGTH]) -> Result<DisplayInfo, InkyError> {
    let width = u16::from_le_bytes([raw[0], raw[1]]);
    let height = u16::from_le_bytes([raw[2], raw[3]]);
    let color_capability = ColorCapability::try_from_u8(raw[4])?;
    let pcb_variant = raw[5];
    let display_variant = DisplayVariant::try_from_u8(raw[6])?;
    let time_len = (raw[7] as usize).min(MAX_WRITE_TIME_LEN);
    let write_time = String::from_utf8_lossy(&raw[8..8 + time_len]).into_owned();

    Ok(DisplayInfo { width, height, color_capability, pcb_variant, display_variant, write_time })
}

/// Shared frame-buffer/palette state every backend wraps with its own
/// SPI/GPIO command sequencing. `white_plane`/`color_plane` are scratch
/// buffers for [`generate_packed_plane`](Self::generate_packed_plane):
/// owned by the core for its whole lifetime so a frame's two bit-plane
/// packs reuse the same allocation across `show()` calls instead of
/// allocating fresh each time.
pub struct InkyCore {
    pub info: DisplayInfo,
    pub color_map: IndexedColorMap,
    pub border: ColorName,
    pub frame: Image,
    pub white_plane: Vec<u8>,
    pub color_plane: Vec<u8>,
}

impl InkyCore {
    pub fn new(info: DisplayInfo) -> Self {
        let color_map = info.color_capability.color_map();
        let frame = Image::new_indexed(info.width as u32, info.height as u32, color_map.clone());
        Self {
            info,
            color_map,
            border: ColorName::White,
            frame,
            white_plane: Vec::new(),
            color_plane: Vec::new(),
        }
    }

    /// Scale (`Fill`, `Auto`) then quantize (`Diffusion`, 0.75 accuracy)
    /// into the panel-sized, palette-matched frame buffer.
    pub fn set_image(&mut self, img: &Image) -> Result<(), InkyError> {
        let scaled = img.scale(
            self.info.width as u32,
            self.info.height as u32,
            ScaleSettings { scale_mode: ScaleMode::Fill, ..Default::default() },
        );
        self.frame =
            scaled.to_indexed(self.color_map.clone(), DitherSettings { mode: DitherMode::Diffusion, accuracy: 0.75 })?;
        Ok(())
    }

    pub fn set_border(&mut self, color: ColorName) {
        self.border = color;
    }

    /// Fill the entire frame buffer with the current border color's index,
    /// the panel-sized equivalent of a blank "clear" frame.
    pub fn fill_with_border(&mut self) {
        let index = self.color_map.index_for_name(self.border);
        self.frame.data_mut().fill(index);
    }

    /// Pack 8 consecutive frame pixels per output byte into `out`,
    /// MSB-first, 1 where the pixel's index equals `color`. When pixel
    /// count isn't a multiple of 8 the trailing byte packs the remainder
    /// LSB-first instead — a quirk preserved for wire compatibility, not a
    /// bug. `out` is cleared and refilled in place rather than returned by
    /// value, so a caller holding onto a scratch buffer across frames
    /// (see `white_plane`/`color_plane` above) reuses its allocation
    /// instead of paying for a fresh `Vec` every `show()`.
    pub fn generate_packed_plane(&mut self, color: IndexedColor, out: &mut Vec<u8>) {
        Self::pack_plane(&self.frame, color, out);
    }

    /// Pack the white plane into this core's own `white_plane` scratch
    /// buffer. Splits `self` into its `frame`/`white_plane` fields so the
    /// read of one and the write of the other can happen without a
    /// borrow conflict.
    pub fn pack_white_plane(&mut self, color: IndexedColor) {
        let InkyCore { frame, white_plane, .. } = self;
        Self::pack_plane(frame, color, white_plane);
    }

    /// Pack an accent plane (red/yellow) into this core's own
    /// `color_plane` scratch buffer.
    pub fn pack_color_plane(&mut self, color: IndexedColor) {
        let InkyCore { frame, color_plane, .. } = self;
        Self::pack_plane(frame, color, color_plane);
    }

    fn pack_plane(frame: &Image, color: IndexedColor, out: &mut Vec<u8>) {
        let data = frame.data();
        let total = data.len();
        let full_bytes = total / 8;
        let remainder = total % 8;

        out.clear();
        out.reserve(full_bytes + if remainder > 0 { 1 } else { 0 });
        for chunk in data[..full_bytes * 8].chunks_exact(8) {
            let mut byte = 0u8;
            for (bit, &px) in chunk.iter().enumerate() {
                if px == color {
                    byte |= 0x80 >> bit;
                }
            }
            out.push(byte);
        }

        if remainder > 0 {
            let tail = &data[full_bytes * 8..];
            let mut byte = 0u8;
            for (bit, &px) in tail.iter().enumerate() {
                if px == color {
                    byte |= 1 << bit;
                }
            }
            out.push(byte);
        }
    }
}

pub trait Inky {
    fn info(&self) -> &DisplayInfo;
    fn set_image(&mut self, img: &Image) -> Result<(), InkyError>;
    fn set_border(&mut self, color: ColorName) -> Result<(), InkyError>;
    /// Fill the frame buffer with the border color, ready for a blank
    /// `show()` (used by the CLI's `--clear`).
    fn clear(&mut self) -> Result<(), InkyError>;
    fn show(&mut self) -> Result<(), InkyError>;
}

pub struct CreateOptions {
    pub simulate: bool,
    pub i2c_device: String,
    pub spi_device: String,
    pub spi_speed_hz: u32,
}

/// Factory: simulated build short-circuits to a hard-coded 400x300 BWR
/// panel; otherwise identify the real panel over I²C and dispatch on its
/// `DisplayVariant`.
pub fn create(opts: &CreateOptions) -> Result<Box<dyn Inky>, InkyError> {
    if opts.simulate {
        return Ok(Box::new(SimulatedInky::new(simulated_display_info())));
    }

    let info = read_eeprom(&opts.i2c_device)?;
    match info.display_variant {
        DisplayVariant::RedWhatSsd1683 | DisplayVariant::BlackWhatSsd1683 | DisplayVariant::YellowWhatSsd1683 => {
            Ok(Box::new(Ssd1683Inky::new(info, &opts.spi_device, opts.spi_speed_hz)?))
        }
        DisplayVariant::SevenColourUc8159
        | DisplayVariant::SevenColour640x400Uc8159
        | DisplayVariant::SevenColour640x400Uc8159V2 => Ok(Box::new(Uc8159Inky::new(info))),
        other => Err(InkyError::Unsupported(format!("display variant {other:?} has no driver"))),
    }
}

fn simulated_display_info() -> DisplayInfo {
    DisplayInfo {
        width: 400,
        height: 300,
        color_capability: ColorCapability::BlackWhiteRed,
        pcb_variant: 12,
        display_variant: DisplayVariant::RedWhatSsd1683,
        write_time: "2022-09-02 11:54:06.4".to_string(),
    }
}

/// Block on `poll` returning `true` (busy line idle) up to `timeout`,
/// sleeping `interval` between checks. Surfaces `TimedOut` rather than
/// hanging forever if the panel never clears BUSY.
pub(crate) fn wait_for(
    mut poll: impl FnMut() -> Result<bool, InkyError>,
    timeout: Duration,
    interval: Duration,
    what: &str,
) -> Result<(), InkyError> {
    let start = std::time::Instant::now();
    loop {
        if poll()? {
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err(InkyError::TimedOut(what.to_string()));
        }
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_eeprom() -> [u8; EEPROM_LENGTH] {
        let mut raw = [0u8; EEPROM_LENGTH];
        raw[0..2].copy_from_slice(&0x0190u16.to_le_bytes());
        raw[2..4].copy_from_slice(&0x012Cu16.to_le_bytes());
        raw[4] = 0x02;
        raw[5] = 0x0C;
        raw[6] = 0x11;
        raw[7] = 0x15;
        let time = b"2022-09-02 11:54:06.4";
        raw[8..8 + time.len()].copy_from_slice(time);
        raw
    }

    #[test]
    fn parses_literal_eeprom_fixture() {
        let raw = sample_eeprom();
        let info = parse_eeprom(&raw).unwrap();
        assert_eq!(info.width, 400);
        assert_eq!(info.height, 300);
        assert_eq!(info.color_capability, ColorCapability::BlackWhiteRed);
        assert_eq!(info.pcb_variant, 0x0C);
        assert_eq!(info.display_variant, DisplayVariant::RedWhatSsd1683);
        assert_eq!(info.write_time, "2022-09-02 11:54:06.4");
    }

    #[test]
    fn caps_write_time_length_at_21() {
        let mut raw = sample_eeprom();
        raw[7] = 255;
        let info = parse_eeprom(&raw).unwrap();
        assert_eq!(info.write_time.len(), MAX_WRITE_TIME_LEN);
    }

    #[test]
    fn rejects_unknown_display_variant() {
        let mut raw = sample_eeprom();
        raw[6] = 200;
        assert!(parse_eeprom(&raw).is_err());
    }

    #[test]
    fn generate_packed_plane_matches_literal_scenario() {
        let info = simulated_display_info();
        let mut core = InkyCore::new(DisplayInfo { width: 10, height: 1, ..info });
        for (x, &px) in [1u8, 1, 0, 0, 1, 0, 1, 0, 1, 1].iter().enumerate() {
            core.frame.set_indexed_pixel(x as u32, 0, px);
        }

        let mut packed = Vec::new();
        core.generate_packed_plane(1, &mut packed);
        assert_eq!(packed, vec![0b1100_1010, 0b0000_0011]);
    }

    #[test]
    fn generate_packed_plane_reuses_out_buffers_capacity() {
        let info = simulated_display_info();
        let mut core = InkyCore::new(DisplayInfo { width: 9, height: 1, ..info });
        for x in 0..9u32 {
            core.frame.set_indexed_pixel(x, 0, if x == 0 { 1 } else { 0 });
        }

        let mut out = Vec::with_capacity(64);
        let original_capacity = out.capacity();
        core.generate_packed_plane(1, &mut out);
        assert_eq!(out, vec![0b1000_0000, 0b0000_0000]);
        assert_eq!(out.capacity(), original_capacity, "out-param must be refilled in place, not reallocated");
    }

    #[test]
    fn pack_white_and_color_plane_write_into_owned_scratch_buffers() {
        let info = simulated_display_info();
        let mut core = InkyCore::new(info);
        let white_index = core.color_map.index_for_name(ColorName::White);
        let red_index = core.color_map.index_for_name(ColorName::Red);
        core.frame.data_mut().fill(white_index);

        core.pack_white_plane(white_index);
        assert!(core.white_plane.iter().all(|&b| b == 0xFF));

        core.pack_color_plane(red_index);
        assert!(core.color_plane.iter().all(|&b| b == 0x00));
    }

    #[test]
    fn bwy_palette_collides_red_and_yellow_at_index_2() {
        let map = ColorCapability::BlackWhiteYellow.color_map();
        assert_eq!(map.index_for_name(ColorName::Yellow), 2);
    }
}
