//! SPI, serial and CAN extension points.
//!
//! These kinds take part in capability negotiation like any other, but their
//! behaviour is defined entirely by the concrete driver, so the traits carry
//! no members. Only the settings a factory is invoked with are fixed here,
//! along with the pins each bus occupies.

use strum::Display;

use crate::error::{Error, Result};
use crate::pin::PinRole;

/// SPI device on a socket.
pub trait SpiDevice: Send {}

/// Serial port on a socket.
pub trait SerialDevice: Send {}

/// CAN controller on a socket.
pub trait CanDevice: Send {}

/// Clock polarity and phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum SpiMode {
    #[default]
    Mode0,
    Mode1,
    Mode2,
    Mode3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiSettings {
    pub chip_select: PinRole,
    pub mode: SpiMode,
    pub clock_hz: u32,
    pub data_bits: u8,
}

impl Default for SpiSettings {
    fn default() -> Self {
        Self {
            chip_select: PinRole::Six,
            mode: SpiMode::Mode0,
            clock_hz: 1_000_000,
            data_bits: 8,
        }
    }
}

impl SpiSettings {
    /// Chip select plus MOSI, MISO and SCK.
    pub fn pins(&self) -> Vec<PinRole> {
        let mut pins = vec![self.chip_select, PinRole::Seven, PinRole::Eight, PinRole::Nine];
        pins.sort();
        pins
    }

    /// Chip select must be a pin of its own, not one of the bus lines.
    pub fn validate(&self) -> Result<()> {
        if matches!(
            self.chip_select,
            PinRole::Seven | PinRole::Eight | PinRole::Nine
        ) {
            return Err(Error::InvalidParameter(format!(
                "SPI chip select cannot be bus pin {}",
                self.chip_select
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Handshake {
    #[default]
    None,
    RequestToSend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub handshake: Handshake,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            handshake: Handshake::None,
        }
    }
}

impl SerialSettings {
    /// TX and RX, plus RTS and CTS when handshaking.
    pub fn pins(&self) -> Vec<PinRole> {
        match self.handshake {
            Handshake::None => vec![PinRole::Four, PinRole::Five],
            Handshake::RequestToSend => {
                vec![PinRole::Four, PinRole::Five, PinRole::Six, PinRole::Seven]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanSettings {
    pub bitrate: u32,
}

impl Default for CanSettings {
    fn default() -> Self {
        Self { bitrate: 500_000 }
    }
}

impl CanSettings {
    /// TD and RD.
    pub fn pins(&self) -> Vec<PinRole> {
        vec![PinRole::Four, PinRole::Five]
    }
}
