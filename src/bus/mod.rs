//! I²C and SPI bus wrappers shared by EEPROM reads and panel command/data
//! writes. Generalizes per-display GPIO/SPI wrappers into bus
//! abstractions that don't know what's on the other end.

pub mod i2c;
pub mod spi;

pub use i2c::I2cBus;
pub use spi::SpiBus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),
    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),
    #[error("unrecognized device path {0:?}")]
    BadDevicePath(String),
}
