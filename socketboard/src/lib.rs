//! Socket capability negotiation for modular mainboards.
//!
//! A mainboard exposes numbered [`socket::Socket`]s. A plug-in
//! [`module::Module`] asks its socket for the peripherals it needs
//! (digital pins, analog channels, PWM, I2C and other buses) and then drives
//! them through the contracts in [`hw_trait`].

pub mod config;
pub mod error;
pub mod hw_trait;
pub mod module;
pub mod pin;
pub mod sim;
pub mod socket;
pub mod tracing;
