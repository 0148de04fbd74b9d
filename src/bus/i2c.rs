//! I²C bus: slave address set once at open time, then sub-addressed
//! read/write for EEPROM and similar small register maps.

use std::thread;
use std::time::Duration;

use rppal::i2c::I2c;

use super::BusError;

pub struct I2cBus {
    dev: I2c,
}

impl I2cBus {
    /// `device` is a `/dev/i2c-N` path; the bus number is parsed out of it
    /// since `rppal` opens I2C buses by number, not by path.
    pub fn open(device: &str, slave_address: u16) -> Result<Self, BusError> {
        let bus_number = parse_bus_number(device)?;
        let mut dev = I2c::with_bus(bus_number).map_err(BusError::I2c)?;
        dev.set_slave_address(slave_address).map_err(BusError::I2c)?;
        Ok(Self { dev })
    }

    /// Write `sub-address` followed by `data` in a single transfer.
    pub fn write(&mut self, sub_address: u8, data: &[u8]) -> Result<(), BusError> {
        let mut frame = Vec::with_capacity(1 + data.len());
        frame.push(sub_address);
        frame.extend_from_slice(data);
        self.dev.write(&frame).map_err(BusError::I2c)?;
        Ok(())
    }

    /// Write `sub_address`, sleep `delay_ms`, then read `buf.len()` bytes in
    /// a single follow-up transfer.
    pub fn read(&mut self, sub_address: u8, buf: &mut [u8], delay_ms: u64) -> Result<(), BusError> {
        self.dev.write(&[sub_address]).map_err(BusError::I2c)?;
        thread::sleep(Duration::from_millis(delay_ms));
        self.dev.read(buf).map_err(BusError::I2c)?;
        Ok(())
    }
}

fn parse_bus_number(device: &str) -> Result<u8, BusError> {
    device
        .rsplit('-')
        .next()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or_else(|| BusError::BadDevicePath(device.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bus_number_from_standard_path() {
        assert_eq!(parse_bus_number("/dev/i2c-1").unwrap(), 1);
        assert_eq!(parse_bus_number("/dev/i2c-0").unwrap(), 0);
    }

    #[test]
    fn rejects_unparseable_path() {
        assert!(parse_bus_number("/dev/nonsense").is_err());
    }
}
