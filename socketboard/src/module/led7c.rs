//! Seven-colour LED module.
//!
//! Three digital outputs switch the red, green and blue dies of one LED.
//! Each [`Color`] is a 3-bit mask, red = 4, green = 2, blue = 1.

use async_trait::async_trait;
use strum::{Display, EnumIter};

use super::{Attach, Module};
use crate::error::Result;
use crate::hw_trait::DigitalOutput;
use crate::pin::PinRole;
use crate::socket::{Peripheral, Socket, SocketId};

const RED: PinRole = PinRole::Four;
const GREEN: PinRole = PinRole::Five;
const BLUE: PinRole = PinRole::Three;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter)]
#[repr(u8)]
pub enum Color {
    #[default]
    Off = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Yellow = 6,
    White = 7,
}

impl Color {
    pub const fn red(self) -> bool {
        self as u8 & 4 != 0
    }

    pub const fn green(self) -> bool {
        self as u8 & 2 != 0
    }

    pub const fn blue(self) -> bool {
        self as u8 & 1 != 0
    }
}

/// LED7C module.
pub struct Led7c {
    socket: SocketId,
    red: Peripheral<DigitalOutput>,
    green: Peripheral<DigitalOutput>,
    blue: Peripheral<DigitalOutput>,
}

impl Led7c {
    pub fn set_color(&mut self, color: Color) {
        self.red.write(color.red());
        self.green.write(color.green());
        self.blue.write(color.blue());
    }

    /// Colour currently shown, rebuilt from the three outputs.
    pub fn color(&self) -> Color {
        let bits = (self.red.read() as u8) << 2
            | (self.green.read() as u8) << 1
            | self.blue.read() as u8;
        match bits {
            1 => Color::Blue,
            2 => Color::Green,
            3 => Color::Cyan,
            4 => Color::Red,
            5 => Color::Magenta,
            6 => Color::Yellow,
            7 => Color::White,
            _ => Color::Off,
        }
    }

    pub fn turn_off(&mut self) {
        self.set_color(Color::Off);
    }
}

impl Module for Led7c {
    fn name(&self) -> &'static str {
        "LED7C"
    }

    fn manufacturer(&self) -> &'static str {
        "GHI Electronics, LLC"
    }

    fn socket(&self) -> SocketId {
        self.socket
    }
}

#[async_trait]
impl Attach for Led7c {
    async fn attach(socket: &Socket) -> Result<Self> {
        let red = socket.digital_output(RED, false).await?;
        let green = socket.digital_output(GREEN, false).await?;
        let blue = socket.digital_output(BLUE, false).await?;

        Ok(Self {
            socket: socket.id(),
            red,
            green,
            blue,
        })
    }
}
