//! SPI bus: fixed slave address (chip select is wired, not addressed), mode
//! 0, configurable speed, and payload fragmentation above a max transfer
//! size. No read support — this driver's panels are write-only over SPI.

use std::thread;
use std::time::Duration;

use rppal::spi::{Bus, Mode, Segment, SlaveSelect, Spi};

use super::BusError;

pub struct SpiBus {
    dev: Spi,
    max_transfer_size_bytes: usize,
}

impl SpiBus {
    /// `device` is a `/dev/spidevB.S` path; `B`/`S` select the bus and chip
    /// select line since `rppal` opens SPI by enum, not by path.
    pub fn open(device: &str, speed_hz: u32, max_transfer_size_bytes: usize) -> Result<Self, BusError> {
        let (bus, select) = parse_spi_path(device)?;
        let dev = Spi::new(bus, select, speed_hz, Mode::Mode0).map_err(BusError::Spi)?;
        Ok(Self { dev, max_transfer_size_bytes })
    }

    /// Write `data`, splitting into `max_transfer_size_bytes` chunks issued
    /// as one multi-segment transfer so chip-select stays asserted across
    /// chunk boundaries.
    pub fn write(&mut self, data: &[u8]) -> Result<(), BusError> {
        self.write_with_delay(data, 0)
    }

    /// Same as [`SpiBus::write`], then sleeps `delay_us` microseconds before
    /// returning. Some panel commands need a settling delay between the
    /// write and the next command; most callers pass 0.
    pub fn write_with_delay(&mut self, data: &[u8], delay_us: u64) -> Result<(), BusError> {
        if !data.is_empty() {
            let segments: Vec<Segment> =
                data.chunks(self.max_transfer_size_bytes).map(Segment::with_write).collect();
            self.dev.transfer_segments(&segments).map_err(BusError::Spi)?;
        }
        if delay_us > 0 {
            thread::sleep(Duration::from_micros(delay_us));
        }
        Ok(())
    }
}

fn parse_spi_path(device: &str) -> Result<(Bus, SlaveSelect), BusError> {
    let bad = || BusError::BadDevicePath(device.to_string());

    let stem = device.strip_prefix("/dev/spidev").ok_or_else(bad)?;
    let (bus_str, select_str) = stem.split_once('.').ok_or_else(bad)?;

    let bus = match bus_str.parse::<u8>().map_err(|_| bad())? {
        0 => Bus::Spi0,
        1 => Bus::Spi1,
        2 => Bus::Spi2,
        _ => return Err(bad()),
    };
    let select = match select_str.parse::<u8>().map_err(|_| bad())? {
        0 => SlaveSelect::Ss0,
        1 => SlaveSelect::Ss1,
        2 => SlaveSelect::Ss2,
        _ => return Err(bad()),
    };

    Ok((bus, select))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_device_path() {
        let (bus, select) = parse_spi_path("/dev/spidev0.0").unwrap();
        assert!(matches!(bus, Bus::Spi0));
        assert!(matches!(select, SlaveSelect::Ss0));
    }

    #[test]
    fn rejects_malformed_path() {
        assert!(parse_spi_path("/dev/spi0").is_err());
        assert!(parse_spi_path("/dev/spidev9.0").is_err());
    }
}
