//! Peripheral contracts.
//!
//! This module defines the interfaces a module drives once a socket has
//! handed it a peripheral. Each capability kind comes in one of two shapes:
//!
//! - a trait the mainboard driver implements directly, when the contract has
//!   no state of its own (digital input, interrupt, bidirectional I/O, analog
//!   input, SPI, serial, CAN);
//! - a small driver trait holding only the hardware primitives, wrapped by a
//!   concrete type that owns the cached state and the derived API (digital
//!   output, analog output, PWM, I2C).
//!
//! All operations are synchronous. Acquisition is the only async step and
//! lives in [`crate::socket`].

pub mod analog;
pub mod bus;
pub mod digital;
pub mod i2c;
pub mod pwm;

// Re-export traits
pub use analog::{AnalogInput, AnalogOutput, AnalogOutputDriver};
pub use bus::{
    CanDevice, CanSettings, Handshake, Parity, SerialDevice, SerialSettings, SpiDevice, SpiMode,
    SpiSettings, StopBits,
};
pub use digital::{
    DigitalInput, DigitalInputOutput, DigitalInterrupt, DigitalIoMode, DigitalOutput,
    DigitalOutputDriver, DriveMode, Edge, InterruptDispatcher, InterruptEdge, InterruptEvent,
    SubscriptionId,
};
pub use i2c::{I2cBus, I2cBusSpeed, I2cDevice, I2cSettings, I2cTransfer, I2cTransferStatus};
pub use pwm::{PwmDriver, PwmOutput};
