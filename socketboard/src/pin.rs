//! Pin roles, capability kinds and socket type letters.
//!
//! A socket exposes ten contacts. Pins 1 and 2 carry +3.3V and +5V and pin 10
//! is ground, so only pins 3 through 9 are addressable as [`PinRole`]s. Which
//! capabilities a pin carries is fixed by the socket's type letters, the
//! vocabulary mainboards use to label their connectors.

use std::fmt;

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Signal contact of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
pub enum PinRole {
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
}

impl PinRole {
    /// Physical contact number on the connector.
    pub const fn number(self) -> u8 {
        match self {
            PinRole::Three => 3,
            PinRole::Four => 4,
            PinRole::Five => 5,
            PinRole::Six => 6,
            PinRole::Seven => 7,
            PinRole::Eight => 8,
            PinRole::Nine => 9,
        }
    }

    /// Look up a role by contact number. Power and ground contacts have no
    /// role.
    pub fn from_number(number: u8) -> Option<Self> {
        PinRole::iter().find(|pin| pin.number() == number)
    }
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Category of peripheral a socket can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum CapabilityKind {
    #[strum(serialize = "digital input")]
    DigitalInput,
    #[strum(serialize = "digital output")]
    DigitalOutput,
    #[strum(serialize = "digital interrupt")]
    DigitalInterrupt,
    #[strum(serialize = "digital input/output")]
    DigitalInputOutput,
    #[strum(serialize = "analog input")]
    AnalogInput,
    #[strum(serialize = "analog output")]
    AnalogOutput,
    #[strum(serialize = "PWM output")]
    PwmOutput,
    #[strum(serialize = "I2C device")]
    I2cDevice,
    #[strum(serialize = "SPI device")]
    SpiDevice,
    #[strum(serialize = "serial device")]
    SerialDevice,
    #[strum(serialize = "CAN device")]
    CanDevice,
}

impl CapabilityKind {
    /// Bus kinds are bound to a fixed group of pins rather than a single
    /// caller-chosen pin.
    pub const fn is_bus(self) -> bool {
        matches!(
            self,
            CapabilityKind::I2cDevice
                | CapabilityKind::SpiDevice
                | CapabilityKind::SerialDevice
                | CapabilityKind::CanDevice
        )
    }
}

/// Socket type letter.
///
/// A connector is usually labelled with several letters (for example "YIP"),
/// and carries the union of their capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum SocketType {
    /// Three or four general purpose I/O pins.
    X,
    /// Seven general purpose I/O pins.
    Y,
    /// Analog inputs on pins 3 to 5.
    A,
    /// I2C on pins 8 and 9.
    I,
    /// SPI on pins 7 to 9 with chip select on 6.
    S,
    /// Serial port without handshaking.
    U,
    /// Serial port with RTS/CTS handshaking on pins 6 and 7.
    K,
    /// CAN on pins 4 and 5.
    C,
    /// Analog output on pin 5.
    O,
    /// PWM on pins 7 to 9.
    P,
}

use PinRole::*;

impl SocketType {
    /// Parse a label such as `"YIP"` into its letters.
    pub fn parse_label(label: &str) -> crate::error::Result<Vec<SocketType>> {
        label
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| {
                c.to_string().parse::<SocketType>().map_err(|_| {
                    crate::error::Error::Config(format!("unknown socket type letter '{c}'"))
                })
            })
            .collect()
    }

    /// Pins of this socket type that carry `kind`.
    ///
    /// For bus kinds this is the set of pins the bus occupies.
    pub fn pins_for(self, kind: CapabilityKind) -> &'static [PinRole] {
        use CapabilityKind as K;

        match kind {
            K::DigitalInput | K::DigitalOutput | K::DigitalInputOutput => self.gpio_pins(),
            K::DigitalInterrupt => match self {
                SocketType::O => &[],
                _ => &[Three],
            },
            K::AnalogInput => match self {
                SocketType::A => &[Three, Four, Five],
                _ => &[],
            },
            K::AnalogOutput => match self {
                SocketType::O => &[Five],
                _ => &[],
            },
            K::PwmOutput => match self {
                SocketType::P => &[Seven, Eight, Nine],
                _ => &[],
            },
            K::I2cDevice => match self {
                SocketType::I => &[Eight, Nine],
                _ => &[],
            },
            K::SpiDevice => match self {
                SocketType::S => &[Six, Seven, Eight, Nine],
                _ => &[],
            },
            K::SerialDevice => match self {
                SocketType::U => &[Four, Five],
                SocketType::K => &[Four, Five, Six, Seven],
                _ => &[],
            },
            K::CanDevice => match self {
                SocketType::C => &[Four, Five],
                _ => &[],
            },
        }
    }

    fn gpio_pins(self) -> &'static [PinRole] {
        match self {
            SocketType::X => &[Three, Four, Five, Six],
            SocketType::Y => &[Three, Four, Five, Six, Seven, Eight, Nine],
            SocketType::A => &[Three, Four, Five, Six],
            SocketType::I | SocketType::U | SocketType::C | SocketType::P => &[Three, Six],
            SocketType::S => &[Three, Four, Five],
            SocketType::K => &[Three],
            SocketType::O => &[Three, Four],
        }
    }
}

/// Union of the pins carrying `kind` across several socket type letters.
pub fn pins_for(types: &[SocketType], kind: CapabilityKind) -> Vec<PinRole> {
    let mut pins: Vec<PinRole> = types
        .iter()
        .flat_map(|t| t.pins_for(kind).iter().copied())
        .collect();
    pins.sort();
    pins.dedup();
    pins
}
