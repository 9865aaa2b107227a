//! Sockets and capability negotiation.
//!
//! A [`Socket`] is a table of optional asynchronous factories, one slot per
//! [`CapabilityKind`]. A mainboard driver fills in the slots its connector
//! supports through [`SocketBuilder`]; an empty slot is the only way a socket
//! says "not supported". There is no separate capability query: a module
//! simply tries to acquire what it needs and handles the error.
//!
//! Acquisition order is fixed:
//!
//! 1. empty slot → [`Error::Unsupported`];
//! 2. pin(s) already held → [`Error::PinClaimed`] (never waits);
//! 3. the driver factory runs, and its error, if any, is returned as is.
//!
//! The claim taken in step 2 is released if step 3 fails or the acquisition
//! future is dropped.

mod claims;

pub use claims::{Peripheral, PinClaim, I2C_PINS};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::hw_trait::{
    AnalogInput, AnalogOutput, AnalogOutputDriver, CanDevice, CanSettings, DigitalInput,
    DigitalInputOutput, DigitalInterrupt, DigitalIoMode, DigitalOutput, DigitalOutputDriver,
    DriveMode, I2cBus, I2cDevice, I2cSettings, InterruptEdge, PwmDriver, PwmOutput, SerialDevice,
    SerialSettings, SpiDevice, SpiSettings,
};
use crate::pin::{CapabilityKind, PinRole};
use crate::tracing::prelude::*;
use claims::ClaimTable;

/// Socket number on the mainboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub u8);

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for a digital interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterruptConfig {
    pub edge: InterruptEdge,
    pub drive_mode: DriveMode,
}

/// Configuration for a bidirectional pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalIoConfig {
    pub mode: DigitalIoMode,
    pub drive_mode: DriveMode,
    /// Level latched for output mode.
    pub initial_output: bool,
}

type PinFn<C, T> = dyn Fn(SocketId, PinRole, C) -> BoxFuture<'static, Result<T>> + Send + Sync;
type BusFn<C, T> = dyn Fn(SocketId, C) -> BoxFuture<'static, Result<T>> + Send + Sync;

/// Factory for a single-pin capability.
pub struct PinFactory<C, T>(Arc<PinFn<C, T>>);

impl<C: 'static, T: 'static> PinFactory<C, T> {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn(SocketId, PinRole, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self(Arc::new(move |socket, pin, config| {
            Box::pin(factory(socket, pin, config))
        }))
    }

    fn call(&self, socket: SocketId, pin: PinRole, config: C) -> BoxFuture<'static, Result<T>> {
        (self.0)(socket, pin, config)
    }
}

impl<C, T> Clone for PinFactory<C, T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// Factory for a bus capability, bound to the socket's fixed bus pins.
pub struct BusFactory<C, T>(Arc<BusFn<C, T>>);

impl<C: 'static, T: 'static> BusFactory<C, T> {
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn(SocketId, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self(Arc::new(move |socket, config| Box::pin(factory(socket, config))))
    }

    fn call(&self, socket: SocketId, config: C) -> BoxFuture<'static, Result<T>> {
        (self.0)(socket, config)
    }
}

impl<C, T> Clone for BusFactory<C, T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

#[derive(Clone, Default)]
struct Capabilities {
    digital_input: Option<PinFactory<DriveMode, Box<dyn DigitalInput>>>,
    digital_output: Option<PinFactory<bool, Box<dyn DigitalOutputDriver>>>,
    digital_interrupt: Option<PinFactory<InterruptConfig, Box<dyn DigitalInterrupt>>>,
    digital_input_output: Option<PinFactory<DigitalIoConfig, Box<dyn DigitalInputOutput>>>,
    analog_input: Option<PinFactory<(), Box<dyn AnalogInput>>>,
    analog_output: Option<PinFactory<f64, Box<dyn AnalogOutputDriver>>>,
    pwm_output: Option<PinFactory<(), Box<dyn PwmDriver>>>,
    i2c_device: Option<BusFactory<I2cSettings, Box<dyn I2cBus>>>,
    spi_device: Option<BusFactory<SpiSettings, Box<dyn SpiDevice>>>,
    serial_device: Option<BusFactory<SerialSettings, Box<dyn SerialDevice>>>,
    can_device: Option<BusFactory<CanSettings, Box<dyn CanDevice>>>,
}

impl Capabilities {
    fn present(&self) -> Vec<CapabilityKind> {
        use CapabilityKind as K;

        [
            (K::DigitalInput, self.digital_input.is_some()),
            (K::DigitalOutput, self.digital_output.is_some()),
            (K::DigitalInterrupt, self.digital_interrupt.is_some()),
            (K::DigitalInputOutput, self.digital_input_output.is_some()),
            (K::AnalogInput, self.analog_input.is_some()),
            (K::AnalogOutput, self.analog_output.is_some()),
            (K::PwmOutput, self.pwm_output.is_some()),
            (K::I2cDevice, self.i2c_device.is_some()),
            (K::SpiDevice, self.spi_device.is_some()),
            (K::SerialDevice, self.serial_device.is_some()),
            (K::CanDevice, self.can_device.is_some()),
        ]
        .into_iter()
        .filter_map(|(kind, present)| present.then_some(kind))
        .collect()
    }
}

/// One expansion connector and its capability factories.
pub struct Socket {
    id: SocketId,
    name: Option<String>,
    capabilities: Capabilities,
    claims: ClaimTable,
}

impl Socket {
    pub fn builder(id: SocketId) -> SocketBuilder {
        SocketBuilder {
            id,
            name: None,
            capabilities: Capabilities::default(),
        }
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Kind currently holding `pin`, if the pin is claimed.
    pub fn pin_holder(&self, pin: PinRole) -> Option<CapabilityKind> {
        self.claims.holder(pin)
    }

    pub async fn digital_input(
        &self,
        pin: PinRole,
        drive_mode: DriveMode,
    ) -> Result<Peripheral<Box<dyn DigitalInput>>> {
        let (input, claim) = self
            .acquire_pin(
                &self.capabilities.digital_input,
                CapabilityKind::DigitalInput,
                pin,
                drive_mode,
            )
            .await?;
        Ok(Peripheral::new(input, claim))
    }

    pub async fn digital_output(
        &self,
        pin: PinRole,
        initial_value: bool,
    ) -> Result<Peripheral<DigitalOutput>> {
        let (driver, claim) = self
            .acquire_pin(
                &self.capabilities.digital_output,
                CapabilityKind::DigitalOutput,
                pin,
                initial_value,
            )
            .await?;
        Ok(Peripheral::new(DigitalOutput::new(driver, initial_value), claim))
    }

    pub async fn digital_interrupt(
        &self,
        pin: PinRole,
        edge: InterruptEdge,
        drive_mode: DriveMode,
    ) -> Result<Peripheral<Box<dyn DigitalInterrupt>>> {
        let (interrupt, claim) = self
            .acquire_pin(
                &self.capabilities.digital_interrupt,
                CapabilityKind::DigitalInterrupt,
                pin,
                InterruptConfig { edge, drive_mode },
            )
            .await?;
        Ok(Peripheral::new(interrupt, claim))
    }

    pub async fn digital_input_output(
        &self,
        pin: PinRole,
        mode: DigitalIoMode,
        drive_mode: DriveMode,
        initial_output: bool,
    ) -> Result<Peripheral<Box<dyn DigitalInputOutput>>> {
        let (io, claim) = self
            .acquire_pin(
                &self.capabilities.digital_input_output,
                CapabilityKind::DigitalInputOutput,
                pin,
                DigitalIoConfig {
                    mode,
                    drive_mode,
                    initial_output,
                },
            )
            .await?;
        Ok(Peripheral::new(io, claim))
    }

    pub async fn analog_input(&self, pin: PinRole) -> Result<Peripheral<Box<dyn AnalogInput>>> {
        let (input, claim) = self
            .acquire_pin(
                &self.capabilities.analog_input,
                CapabilityKind::AnalogInput,
                pin,
                (),
            )
            .await?;
        Ok(Peripheral::new(input, claim))
    }

    pub async fn analog_output(
        &self,
        pin: PinRole,
        initial_voltage: f64,
    ) -> Result<Peripheral<AnalogOutput>> {
        let (driver, claim) = self
            .acquire_pin(
                &self.capabilities.analog_output,
                CapabilityKind::AnalogOutput,
                pin,
                initial_voltage,
            )
            .await?;
        Ok(Peripheral::new(AnalogOutput::new(driver, initial_voltage), claim))
    }

    pub async fn pwm_output(&self, pin: PinRole) -> Result<Peripheral<PwmOutput>> {
        let (driver, claim) = self
            .acquire_pin(
                &self.capabilities.pwm_output,
                CapabilityKind::PwmOutput,
                pin,
                (),
            )
            .await?;
        Ok(Peripheral::new(PwmOutput::new(driver), claim))
    }

    pub async fn i2c_device(&self, settings: I2cSettings) -> Result<Peripheral<I2cDevice>> {
        let kind = CapabilityKind::I2cDevice;
        let factory = self.require(&self.capabilities.i2c_device, kind, None)?;
        settings.validate()?;
        let claim = self.claims.claim_i2c(settings.address)?;

        debug!(
            socket = %self.id,
            address = settings.address,
            speed = %settings.speed,
            "Acquiring {kind}."
        );
        let bus = self.run(factory.call(self.id, settings), kind).await?;
        Ok(Peripheral::new(I2cDevice::new(bus, settings), claim))
    }

    pub async fn spi_device(
        &self,
        settings: SpiSettings,
    ) -> Result<Peripheral<Box<dyn SpiDevice>>> {
        self.require(&self.capabilities.spi_device, CapabilityKind::SpiDevice, None)?;
        settings.validate()?;

        let pins = settings.pins();
        self.acquire_bus(
            &self.capabilities.spi_device,
            CapabilityKind::SpiDevice,
            &pins,
            settings,
        )
        .await
    }

    pub async fn serial_device(
        &self,
        settings: SerialSettings,
    ) -> Result<Peripheral<Box<dyn SerialDevice>>> {
        let pins = settings.pins();
        self.acquire_bus(
            &self.capabilities.serial_device,
            CapabilityKind::SerialDevice,
            &pins,
            settings,
        )
        .await
    }

    pub async fn can_device(
        &self,
        settings: CanSettings,
    ) -> Result<Peripheral<Box<dyn CanDevice>>> {
        let pins = settings.pins();
        self.acquire_bus(
            &self.capabilities.can_device,
            CapabilityKind::CanDevice,
            &pins,
            settings,
        )
        .await
    }

    fn require<'a, F>(
        &self,
        slot: &'a Option<F>,
        kind: CapabilityKind,
        pin: Option<PinRole>,
    ) -> Result<&'a F> {
        slot.as_ref().ok_or_else(|| {
            debug!(socket = %self.id, ?pin, "No {kind} factory.");
            Error::Unsupported {
                socket: self.id,
                kind,
                pin,
            }
        })
    }

    async fn acquire_pin<C: 'static, T: 'static>(
        &self,
        slot: &Option<PinFactory<C, T>>,
        kind: CapabilityKind,
        pin: PinRole,
        config: C,
    ) -> Result<(T, PinClaim)> {
        let factory = self.require(slot, kind, Some(pin))?;
        let claim = self.claims.claim(&[pin], kind)?;

        debug!(socket = %self.id, %pin, "Acquiring {kind}.");
        let peripheral = self.run(factory.call(self.id, pin, config), kind).await?;
        Ok((peripheral, claim))
    }

    async fn acquire_bus<C: 'static, T: 'static>(
        &self,
        slot: &Option<BusFactory<C, T>>,
        kind: CapabilityKind,
        pins: &[PinRole],
        config: C,
    ) -> Result<Peripheral<T>> {
        let factory = self.require(slot, kind, None)?;
        let claim = self.claims.claim(pins, kind)?;

        debug!(socket = %self.id, ?pins, "Acquiring {kind}.");
        let device = self.run(factory.call(self.id, config), kind).await?;
        Ok(Peripheral::new(device, claim))
    }

    async fn run<T>(
        &self,
        pending: BoxFuture<'static, Result<T>>,
        kind: CapabilityKind,
    ) -> Result<T> {
        pending.await.map_err(|e| {
            warn!(socket = %self.id, "Failed to acquire {kind}: {e}");
            e
        })
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capabilities", &self.capabilities.present())
            .finish()
    }
}

/// Assembles a [`Socket`] from driver factories.
///
/// Each setter takes an async closure receiving the socket id, the pin (for
/// single-pin kinds) and the kind's configuration, and returning the
/// driver's concrete peripheral type.
pub struct SocketBuilder {
    id: SocketId,
    name: Option<String>,
    capabilities: Capabilities,
}

impl SocketBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn digital_input<F, Fut, D>(mut self, factory: F) -> Self
    where
        F: Fn(SocketId, PinRole, DriveMode) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: DigitalInput + 'static,
    {
        self.capabilities.digital_input = Some(PinFactory::new(move |socket, pin, config| {
            let pending = factory(socket, pin, config);
            async move { Ok::<_, Error>(Box::new(pending.await?) as Box<dyn DigitalInput>) }
        }));
        self
    }

    pub fn digital_output<F, Fut, D>(mut self, factory: F) -> Self
    where
        F: Fn(SocketId, PinRole, bool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: DigitalOutputDriver + 'static,
    {
        self.capabilities.digital_output = Some(PinFactory::new(move |socket, pin, config| {
            let pending = factory(socket, pin, config);
            async move { Ok::<_, Error>(Box::new(pending.await?) as Box<dyn DigitalOutputDriver>) }
        }));
        self
    }

    pub fn digital_interrupt<F, Fut, D>(mut self, factory: F) -> Self
    where
        F: Fn(SocketId, PinRole, InterruptConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: DigitalInterrupt + 'static,
    {
        self.capabilities.digital_interrupt = Some(PinFactory::new(move |socket, pin, config| {
            let pending = factory(socket, pin, config);
            async move { Ok::<_, Error>(Box::new(pending.await?) as Box<dyn DigitalInterrupt>) }
        }));
        self
    }

    pub fn digital_input_output<F, Fut, D>(mut self, factory: F) -> Self
    where
        F: Fn(SocketId, PinRole, DigitalIoConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: DigitalInputOutput + 'static,
    {
        self.capabilities.digital_input_output =
            Some(PinFactory::new(move |socket, pin, config| {
                let pending = factory(socket, pin, config);
                async move {
                    Ok::<_, Error>(Box::new(pending.await?) as Box<dyn DigitalInputOutput>)
                }
            }));
        self
    }

    pub fn analog_input<F, Fut, D>(mut self, factory: F) -> Self
    where
        F: Fn(SocketId, PinRole) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: AnalogInput + 'static,
    {
        self.capabilities.analog_input = Some(PinFactory::new(move |socket, pin, ()| {
            let pending = factory(socket, pin);
            async move { Ok::<_, Error>(Box::new(pending.await?) as Box<dyn AnalogInput>) }
        }));
        self
    }

    pub fn analog_output<F, Fut, D>(mut self, factory: F) -> Self
    where
        F: Fn(SocketId, PinRole, f64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: AnalogOutputDriver + 'static,
    {
        self.capabilities.analog_output = Some(PinFactory::new(move |socket, pin, config| {
            let pending = factory(socket, pin, config);
            async move { Ok::<_, Error>(Box::new(pending.await?) as Box<dyn AnalogOutputDriver>) }
        }));
        self
    }

    pub fn pwm_output<F, Fut, D>(mut self, factory: F) -> Self
    where
        F: Fn(SocketId, PinRole) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: PwmDriver + 'static,
    {
        self.capabilities.pwm_output = Some(PinFactory::new(move |socket, pin, ()| {
            let pending = factory(socket, pin);
            async move { Ok::<_, Error>(Box::new(pending.await?) as Box<dyn PwmDriver>) }
        }));
        self
    }

    pub fn i2c_device<F, Fut, D>(mut self, factory: F) -> Self
    where
        F: Fn(SocketId, I2cSettings) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: I2cBus + 'static,
    {
        self.capabilities.i2c_device = Some(BusFactory::new(move |socket, config| {
            let pending = factory(socket, config);
            async move { Ok::<_, Error>(Box::new(pending.await?) as Box<dyn I2cBus>) }
        }));
        self
    }

    pub fn spi_device<F, Fut, D>(mut self, factory: F) -> Self
    where
        F: Fn(SocketId, SpiSettings) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: SpiDevice + 'static,
    {
        self.capabilities.spi_device = Some(BusFactory::new(move |socket, config| {
            let pending = factory(socket, config);
            async move { Ok::<_, Error>(Box::new(pending.await?) as Box<dyn SpiDevice>) }
        }));
        self
    }

    pub fn serial_device<F, Fut, D>(mut self, factory: F) -> Self
    where
        F: Fn(SocketId, SerialSettings) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: SerialDevice + 'static,
    {
        self.capabilities.serial_device = Some(BusFactory::new(move |socket, config| {
            let pending = factory(socket, config);
            async move { Ok::<_, Error>(Box::new(pending.await?) as Box<dyn SerialDevice>) }
        }));
        self
    }

    pub fn can_device<F, Fut, D>(mut self, factory: F) -> Self
    where
        F: Fn(SocketId, CanSettings) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D>> + Send + 'static,
        D: CanDevice + 'static,
    {
        self.capabilities.can_device = Some(BusFactory::new(move |socket, config| {
            let pending = factory(socket, config);
            async move { Ok::<_, Error>(Box::new(pending.await?) as Box<dyn CanDevice>) }
        }));
        self
    }

    pub fn build(self) -> Socket {
        let socket = Socket {
            id: self.id,
            name: self.name,
            claims: ClaimTable::new(self.id),
            capabilities: self.capabilities,
        };
        trace!(socket = %socket.id, kinds = ?socket.capabilities.present(), "Socket built.");
        socket
    }
}
