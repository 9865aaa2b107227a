//! Common error types for socketboard.
//!
//! This module provides a centralized Error enum using thiserror. Every
//! capability acquisition on a [`Socket`](crate::socket::Socket) resolves to
//! one of these variants on failure; bus transfer outcomes are *not* errors
//! and travel as [`I2cTransferStatus`](crate::hw_trait::I2cTransferStatus)
//! values instead.

use thiserror::Error;

use crate::pin::{CapabilityKind, PinRole};
use crate::socket::SocketId;

/// Main error type for socketboard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The socket has no factory for this kind, or the factory does not
    /// serve the requested pin.
    #[error("{kind} is not supported on socket {socket}{}", fmt_pin(.pin))]
    Unsupported {
        socket: SocketId,
        kind: CapabilityKind,
        pin: Option<PinRole>,
    },

    /// The pin is held by a peripheral acquired earlier.
    #[error("pin {pin} on socket {socket} is held as {held_as}, cannot acquire {requested}")]
    PinClaimed {
        socket: SocketId,
        pin: PinRole,
        held_as: CapabilityKind,
        requested: CapabilityKind,
    },

    /// Another I2C device on the same socket already uses this address.
    #[error("I2C address 0x{address:02x} is already in use on socket {socket}")]
    I2cAddressInUse { socket: SocketId, address: u8 },

    /// Invalid parameter or argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The mainboard driver failed while negotiating the peripheral.
    #[error("driver failed to create {kind} on socket {socket}: {message}")]
    Driver {
        socket: SocketId,
        kind: CapabilityKind,
        message: String,
    },

    /// Timed out waiting for a module to finish acquiring its peripherals.
    #[error("timed out attaching {module} to socket {socket}")]
    Timeout { module: &'static str, socket: SocketId },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from tokio or std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed board description
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn fmt_pin(pin: &Option<PinRole>) -> String {
    match pin {
        Some(pin) => format!(" pin {pin}"),
        None => String::new(),
    }
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
