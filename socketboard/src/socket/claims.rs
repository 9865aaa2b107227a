//! Pin ownership for one socket.
//!
//! Every acquisition takes a [`PinClaim`] before the driver is asked for a
//! peripheral. The claim travels inside the returned [`Peripheral`] handle
//! and is released when the handle, or the acquisition future that was
//! holding it, is dropped.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

use super::SocketId;
use crate::error::{Error, Result};
use crate::pin::{CapabilityKind, PinRole};

/// Pins an I2C device occupies.
pub const I2C_PINS: [PinRole; 2] = [PinRole::Eight, PinRole::Nine];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Holder {
    Exclusive(CapabilityKind),
    /// I2C is a shared bus; devices on it are told apart by address.
    I2c(BTreeSet<u8>),
}

impl Holder {
    fn kind(&self) -> CapabilityKind {
        match self {
            Holder::Exclusive(kind) => *kind,
            Holder::I2c(_) => CapabilityKind::I2cDevice,
        }
    }
}

type Held = Arc<Mutex<HashMap<PinRole, Holder>>>;

/// Record of which pins of a socket are in use.
#[derive(Clone)]
pub(crate) struct ClaimTable {
    socket: SocketId,
    held: Held,
}

impl ClaimTable {
    pub fn new(socket: SocketId) -> Self {
        Self {
            socket,
            held: Arc::default(),
        }
    }

    /// Claim every pin in `pins` for `kind`, or none of them.
    pub fn claim(&self, pins: &[PinRole], kind: CapabilityKind) -> Result<PinClaim> {
        let mut held = self.held.lock();

        if let Some((pin, holder)) = pins
            .iter()
            .find_map(|pin| held.get(pin).map(|h| (*pin, h)))
        {
            return Err(Error::PinClaimed {
                socket: self.socket,
                pin,
                held_as: holder.kind(),
                requested: kind,
            });
        }

        for pin in pins {
            held.insert(*pin, Holder::Exclusive(kind));
        }

        Ok(PinClaim {
            held: Arc::clone(&self.held),
            pins: pins.to_vec(),
            i2c_address: None,
        })
    }

    /// Join the socket's I2C bus at `address`.
    pub fn claim_i2c(&self, address: u8) -> Result<PinClaim> {
        let mut held = self.held.lock();

        for pin in I2C_PINS {
            match held.get(&pin) {
                Some(Holder::Exclusive(kind)) => {
                    return Err(Error::PinClaimed {
                        socket: self.socket,
                        pin,
                        held_as: *kind,
                        requested: CapabilityKind::I2cDevice,
                    });
                }
                Some(Holder::I2c(addresses)) if addresses.contains(&address) => {
                    return Err(Error::I2cAddressInUse {
                        socket: self.socket,
                        address,
                    });
                }
                _ => {}
            }
        }

        for pin in I2C_PINS {
            let holder = held
                .entry(pin)
                .or_insert_with(|| Holder::I2c(BTreeSet::new()));
            if let Holder::I2c(addresses) = holder {
                addresses.insert(address);
            }
        }

        Ok(PinClaim {
            held: Arc::clone(&self.held),
            pins: I2C_PINS.to_vec(),
            i2c_address: Some(address),
        })
    }

    /// Kind currently holding `pin`, if any.
    pub fn holder(&self, pin: PinRole) -> Option<CapabilityKind> {
        self.held.lock().get(&pin).map(Holder::kind)
    }
}

/// Ownership of a group of pins; released on drop.
pub struct PinClaim {
    held: Held,
    pins: Vec<PinRole>,
    i2c_address: Option<u8>,
}

impl PinClaim {
    pub fn pins(&self) -> &[PinRole] {
        &self.pins
    }
}

impl Drop for PinClaim {
    fn drop(&mut self) {
        let mut held = self.held.lock();

        match self.i2c_address {
            None => {
                for pin in &self.pins {
                    held.remove(pin);
                }
            }
            Some(address) => {
                for pin in &self.pins {
                    let now_free = match held.get_mut(pin) {
                        Some(Holder::I2c(addresses)) => {
                            addresses.remove(&address);
                            addresses.is_empty()
                        }
                        _ => false,
                    };
                    if now_free {
                        held.remove(pin);
                    }
                }
            }
        }
    }
}

impl fmt::Debug for PinClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinClaim")
            .field("pins", &self.pins)
            .field("i2c_address", &self.i2c_address)
            .finish()
    }
}

/// Peripheral handle returned by a socket.
///
/// Dereferences to the peripheral itself. Holding the handle keeps its pins
/// claimed; dropping it frees them for a later acquisition.
pub struct Peripheral<T> {
    inner: T,
    claim: PinClaim,
}

impl<T> Peripheral<T> {
    pub(crate) fn new(inner: T, claim: PinClaim) -> Self {
        Self { inner, claim }
    }

    /// Pins this peripheral occupies.
    pub fn pins(&self) -> &[PinRole] {
        self.claim.pins()
    }
}

impl<T> Deref for Peripheral<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for Peripheral<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for Peripheral<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peripheral")
            .field("inner", &self.inner)
            .field("pins", &self.claim.pins)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ClaimTable {
        ClaimTable::new(SocketId(1))
    }

    #[test]
    fn test_claim_is_exclusive() {
        let claims = table();
        let first = claims
            .claim(&[PinRole::Three], CapabilityKind::DigitalOutput)
            .unwrap();

        let err = claims
            .claim(&[PinRole::Three], CapabilityKind::DigitalInput)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PinClaimed {
                pin: PinRole::Three,
                held_as: CapabilityKind::DigitalOutput,
                requested: CapabilityKind::DigitalInput,
                ..
            }
        ));

        drop(first);
        assert!(claims
            .claim(&[PinRole::Three], CapabilityKind::DigitalInput)
            .is_ok());
    }

    #[test]
    fn test_group_claim_is_all_or_nothing() {
        let claims = table();
        let _five = claims
            .claim(&[PinRole::Five], CapabilityKind::DigitalOutput)
            .unwrap();

        let err = claims.claim(&[PinRole::Four, PinRole::Five], CapabilityKind::SerialDevice);
        assert!(err.is_err());
        assert_eq!(claims.holder(PinRole::Four), None);
    }

    #[test]
    fn test_i2c_shares_bus_by_address() {
        let claims = table();
        let a = claims.claim_i2c(0x40).unwrap();
        let b = claims.claim_i2c(0x41).unwrap();

        assert!(matches!(
            claims.claim_i2c(0x40),
            Err(Error::I2cAddressInUse { address: 0x40, .. })
        ));
        assert!(matches!(
            claims.claim(&[PinRole::Eight], CapabilityKind::DigitalOutput),
            Err(Error::PinClaimed {
                held_as: CapabilityKind::I2cDevice,
                ..
            })
        ));

        drop(a);
        assert_eq!(claims.holder(PinRole::Eight), Some(CapabilityKind::I2cDevice));
        drop(b);
        assert_eq!(claims.holder(PinRole::Eight), None);
        assert!(claims
            .claim(&[PinRole::Eight], CapabilityKind::PwmOutput)
            .is_ok());
    }

    #[test]
    fn test_i2c_refused_while_pin_exclusive() {
        let claims = table();
        let _pwm = claims
            .claim(&[PinRole::Nine], CapabilityKind::PwmOutput)
            .unwrap();

        assert!(matches!(
            claims.claim_i2c(0x10),
            Err(Error::PinClaimed {
                pin: PinRole::Nine,
                held_as: CapabilityKind::PwmOutput,
                ..
            })
        ));
    }
}
