//! Plug-in modules.
//!
//! A module binds to exactly one socket. It acquires every peripheral it
//! needs inside [`Attach::attach`] and keeps only the returned handles, not
//! the socket, so it has no way to acquire anything later. Once attached it
//! drives its peripherals synchronously.

pub mod led7c;

pub use led7c::Led7c;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::socket::{Socket, SocketId};
use crate::tracing::prelude::*;

/// An attached module.
pub trait Module: Send {
    fn name(&self) -> &'static str;

    fn manufacturer(&self) -> &'static str;

    /// Socket the module was attached to.
    fn socket(&self) -> SocketId;
}

/// Asynchronous initialisation phase of a module.
#[async_trait]
pub trait Attach: Module + Sized {
    /// Acquire the module's peripherals from `socket`.
    ///
    /// Any failed acquisition aborts the attach; handles acquired before the
    /// failure are dropped and their pins released.
    async fn attach(socket: &Socket) -> Result<Self>;
}

/// Attach `M` to `socket`, giving up after `timeout`.
pub async fn attach<M: Attach>(socket: &Socket, timeout: Duration) -> Result<M> {
    match tokio::time::timeout(timeout, M::attach(socket)).await {
        Ok(Ok(module)) => {
            info!(
                socket = %socket.id(),
                "Attached {} ({}).",
                module.name(),
                module.manufacturer()
            );
            Ok(module)
        }
        Ok(Err(e)) => {
            warn!(socket = %socket.id(), "Failed to attach module: {e}");
            Err(e)
        }
        Err(_) => {
            let module = std::any::type_name::<M>()
                .rsplit("::")
                .next()
                .unwrap_or("module");
            error!(socket = %socket.id(), "Timed out attaching {module} after {timeout:?}.");
            Err(Error::Timeout {
                module,
                socket: socket.id(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::{DigitalOutput, DigitalOutputDriver};
    use crate::pin::{CapabilityKind, PinRole};
    use crate::socket::Peripheral;

    struct NullPin;

    impl DigitalOutputDriver for NullPin {
        fn write(&mut self, _value: bool) {}
    }

    /// Module needing pins 3 and 4.
    struct Pair {
        socket: SocketId,
        _a: Peripheral<DigitalOutput>,
        _b: Peripheral<DigitalOutput>,
    }

    impl Module for Pair {
        fn name(&self) -> &'static str {
            "Pair"
        }

        fn manufacturer(&self) -> &'static str {
            "Test"
        }

        fn socket(&self) -> SocketId {
            self.socket
        }
    }

    #[async_trait]
    impl Attach for Pair {
        async fn attach(socket: &Socket) -> Result<Self> {
            Ok(Self {
                socket: socket.id(),
                _a: socket.digital_output(PinRole::Three, false).await?,
                _b: socket.digital_output(PinRole::Four, false).await?,
            })
        }
    }

    fn socket_with_outputs_on(pins: &'static [PinRole]) -> Socket {
        Socket::builder(SocketId(7))
            .digital_output(move |socket, pin, _| async move {
                if pins.contains(&pin) {
                    Ok(NullPin)
                } else {
                    Err(Error::Unsupported {
                        socket,
                        kind: CapabilityKind::DigitalOutput,
                        pin: Some(pin),
                    })
                }
            })
            .build()
    }

    #[tokio::test]
    async fn test_attach_success() {
        let socket = socket_with_outputs_on(&[PinRole::Three, PinRole::Four]);
        let pair: Pair = attach(&socket, Duration::from_secs(1)).await.unwrap();
        assert_eq!(pair.socket(), SocketId(7));
        assert_eq!(
            socket.pin_holder(PinRole::Four),
            Some(CapabilityKind::DigitalOutput)
        );

        drop(pair);
        assert_eq!(socket.pin_holder(PinRole::Three), None);
    }

    #[tokio::test]
    async fn test_partial_attach_releases_pins() {
        let socket = socket_with_outputs_on(&[PinRole::Three]);
        let result = attach::<Pair>(&socket, Duration::from_secs(1)).await;

        assert!(matches!(
            result,
            Err(Error::Unsupported {
                pin: Some(PinRole::Four),
                ..
            })
        ));
        assert_eq!(socket.pin_holder(PinRole::Three), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_timeout() {
        let socket = Socket::builder(SocketId(8))
            .digital_output(|_, _, _| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(NullPin)
            })
            .build();

        let result = attach::<Pair>(&socket, Duration::from_secs(5)).await;
        assert!(matches!(
            result,
            Err(Error::Timeout {
                module: "Pair",
                ..
            })
        ));
        assert_eq!(socket.pin_holder(PinRole::Three), None);
    }
}
