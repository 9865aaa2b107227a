//! Simulated mainboard.
//!
//! Builds a [`Socket`] per configured connector, filling in exactly the
//! factories its type letters call for. Peripherals it hands out act on
//! in-memory hardware state, which a [`SimProbe`] can inspect and drive from
//! the outside: pin levels seen by a module, voltages and PWM settings it
//! programs, and the register files of I2C targets.
//!
//! A factory refuses pins its socket type does not route, so a socket that
//! supports a kind on some pins still reports [`Error::Unsupported`] for the
//! others.

mod i2c;

pub use i2c::I2cRecord;

use std::collections::HashMap;
use std::future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{BoardConfig, SocketConfig};
use crate::error::{Error, Result};
use crate::hw_trait::{
    AnalogInput, AnalogOutputDriver, CanDevice, CanSettings, DigitalInput, DigitalInputOutput,
    DigitalInterrupt, DigitalIoMode, DigitalOutputDriver, DriveMode, Edge, Handshake,
    InterruptDispatcher, InterruptEdge, InterruptEvent, PwmDriver, SerialDevice, SerialSettings,
    SpiDevice, SpiSettings,
};
use crate::pin::{self, CapabilityKind, PinRole, SocketType};
use crate::socket::{DigitalIoConfig, InterruptConfig, Socket, SocketId};
use crate::tracing::prelude::*;
use i2c::{I2cTargets, SimI2cBus};

/// Programmed state of a simulated PWM channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PwmState {
    pub enabled: bool,
    pub frequency: f64,
    pub duty_cycle: f64,
}

#[derive(Debug, Default)]
struct PinState {
    /// Level applied from outside, if any.
    external: Option<bool>,
    drive_mode: DriveMode,
    driving: bool,
    latch: bool,
    interrupt: Option<(InterruptEdge, InterruptDispatcher)>,
}

impl PinState {
    fn level(&self) -> bool {
        if self.driving {
            self.latch
        } else {
            self.external
                .unwrap_or(self.drive_mode == DriveMode::PullUp)
        }
    }
}

#[derive(Default)]
struct State {
    pins: HashMap<PinRole, PinState>,
    analog_inputs: HashMap<PinRole, f64>,
    analog_outputs: HashMap<PinRole, f64>,
    pwm: HashMap<PinRole, PwmState>,
}

struct Hardware {
    socket: SocketId,
    max_voltage: f64,
    state: Mutex<State>,
    i2c: I2cTargets,
}

/// One socket of the simulated board.
pub struct SimSocket {
    types: Vec<SocketType>,
    socket: Socket,
    hardware: Arc<Hardware>,
}

impl SimSocket {
    pub fn new(config: &SocketConfig) -> Result<Self> {
        let types = config.socket_types()?;
        let id = SocketId(config.number);
        let hardware = Arc::new(Hardware {
            socket: id,
            max_voltage: config.analog_max_voltage,
            state: Mutex::new(State::default()),
            i2c: I2cTargets::new(&config.i2c_targets),
        });

        let mut builder = Socket::builder(id);
        if let Some(name) = &config.name {
            builder = builder.name(name.clone());
        }

        let gpio = pin::pins_for(&types, CapabilityKind::DigitalInput);
        if !gpio.is_empty() {
            builder = builder
                .digital_input({
                    let (hw, pins) = (hardware.clone(), gpio.clone());
                    move |socket, pin, drive_mode| {
                        let input = routed(&pins, socket, CapabilityKind::DigitalInput, pin)
                            .map(|()| SimInput::new(Line::new(&hw, pin), drive_mode));
                        future::ready(input)
                    }
                })
                .digital_output({
                    let (hw, pins) = (hardware.clone(), gpio.clone());
                    move |socket, pin, initial| {
                        let output = routed(&pins, socket, CapabilityKind::DigitalOutput, pin)
                            .map(|()| SimOutput::new(Line::new(&hw, pin), initial));
                        future::ready(output)
                    }
                })
                .digital_input_output({
                    let (hw, pins) = (hardware.clone(), gpio.clone());
                    move |socket, pin, config| {
                        let io = routed(&pins, socket, CapabilityKind::DigitalInputOutput, pin)
                            .map(|()| SimInputOutput::new(Line::new(&hw, pin), config));
                        future::ready(io)
                    }
                });
        }

        let interrupt_pins = pin::pins_for(&types, CapabilityKind::DigitalInterrupt);
        if !interrupt_pins.is_empty() {
            let hw = hardware.clone();
            builder = builder.digital_interrupt(move |socket, pin, config| {
                let interrupt =
                    routed(&interrupt_pins, socket, CapabilityKind::DigitalInterrupt, pin)
                        .map(|()| SimInterrupt::new(Line::new(&hw, pin), config));
                future::ready(interrupt)
            });
        }

        let analog_in = pin::pins_for(&types, CapabilityKind::AnalogInput);
        if !analog_in.is_empty() {
            let hw = hardware.clone();
            builder = builder.analog_input(move |socket, pin| {
                let input = routed(&analog_in, socket, CapabilityKind::AnalogInput, pin).map(|()| {
                    SimAnalogInput {
                        hw: hw.clone(),
                        pin,
                    }
                });
                future::ready(input)
            });
        }

        let analog_out = pin::pins_for(&types, CapabilityKind::AnalogOutput);
        if !analog_out.is_empty() {
            let hw = hardware.clone();
            builder = builder.analog_output(move |socket, pin, initial| {
                let output = routed(&analog_out, socket, CapabilityKind::AnalogOutput, pin)
                    .map(|()| SimAnalogOutput::new(hw.clone(), pin, initial));
                future::ready(output)
            });
        }

        let pwm_pins = pin::pins_for(&types, CapabilityKind::PwmOutput);
        if !pwm_pins.is_empty() {
            let hw = hardware.clone();
            builder = builder.pwm_output(move |socket, pin| {
                let pwm = routed(&pwm_pins, socket, CapabilityKind::PwmOutput, pin)
                    .map(|()| SimPwm::new(hw.clone(), pin));
                future::ready(pwm)
            });
        }

        if types.contains(&SocketType::I) {
            let targets = hardware.i2c.clone();
            builder = builder.i2c_device(move |socket, settings| {
                future::ready(Ok::<_, Error>(SimI2cBus::new(
                    socket,
                    settings,
                    targets.clone(),
                )))
            });
        }

        if types.contains(&SocketType::S) {
            let select_pins = pin::pins_for(&types, CapabilityKind::DigitalOutput);
            builder = builder.spi_device(move |socket, settings: SpiSettings| {
                let spi = if settings.chip_select == PinRole::Six
                    || select_pins.contains(&settings.chip_select)
                {
                    Ok(SimSpi { settings })
                } else {
                    Err(Error::Unsupported {
                        socket,
                        kind: CapabilityKind::SpiDevice,
                        pin: Some(settings.chip_select),
                    })
                };
                future::ready(spi)
            });
        }

        if types.contains(&SocketType::U) || types.contains(&SocketType::K) {
            let handshake = types.contains(&SocketType::K);
            builder = builder.serial_device(move |socket, settings: SerialSettings| {
                let serial = if settings.handshake == Handshake::None || handshake {
                    Ok(SimSerial { settings })
                } else {
                    Err(Error::Unsupported {
                        socket,
                        kind: CapabilityKind::SerialDevice,
                        pin: Some(PinRole::Six),
                    })
                };
                future::ready(serial)
            });
        }

        if types.contains(&SocketType::C) {
            builder = builder.can_device(|_, settings: CanSettings| {
                future::ready(Ok::<_, Error>(SimCan { settings }))
            });
        }

        debug!(socket = %id, types = %config.types, "Simulated socket ready.");

        Ok(Self {
            types,
            socket: builder.build(),
            hardware,
        })
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }

    pub fn types(&self) -> &[SocketType] {
        &self.types
    }

    /// Handle for observing and driving this socket's hardware.
    pub fn probe(&self) -> SimProbe {
        SimProbe {
            hw: self.hardware.clone(),
        }
    }
}

/// Simulated mainboard: one [`SimSocket`] per configured socket.
pub struct SimBoard {
    name: String,
    sockets: Vec<SimSocket>,
}

impl SimBoard {
    pub fn new(config: &BoardConfig) -> Result<Self> {
        config.validate()?;
        let sockets = config
            .sockets
            .iter()
            .map(SimSocket::new)
            .collect::<Result<Vec<_>>>()?;

        info!(
            board = %config.name,
            sockets = sockets.len(),
            "Simulated board created."
        );

        Ok(Self {
            name: config.name.clone(),
            sockets,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sockets(&self) -> &[SimSocket] {
        &self.sockets
    }

    pub fn socket(&self, number: u8) -> Option<&SimSocket> {
        self.sockets
            .iter()
            .find(|sim| sim.socket.id() == SocketId(number))
    }
}

/// Outside view of a simulated socket's hardware.
#[derive(Clone)]
pub struct SimProbe {
    hw: Arc<Hardware>,
}

impl SimProbe {
    /// Level currently on `pin`.
    pub fn level(&self, pin: PinRole) -> bool {
        self.hw
            .state
            .lock()
            .pins
            .get(&pin)
            .map(PinState::level)
            .unwrap_or(false)
    }

    /// Apply a level to `pin` from outside, as a button or sensor would.
    ///
    /// Raises an interrupt when the pin is acquired as an interrupt and the
    /// resulting transition is one it reports. Handlers run on the caller's
    /// thread.
    pub fn set_input(&self, pin: PinRole, level: bool) {
        let raised = {
            let mut state = self.hw.state.lock();
            let line = state.pins.entry(pin).or_default();
            let before = line.level();
            line.external = Some(level);

            match (Edge::between(before, line.level()), &line.interrupt) {
                (Some(edge), Some((accepted, dispatcher))) if accepted.accepts(edge) => {
                    Some((edge, dispatcher.clone()))
                }
                _ => None,
            }
        };

        if let Some((edge, dispatcher)) = raised {
            trace!(socket = %self.hw.socket, %pin, %edge, "Raising interrupt.");
            dispatcher.raise(InterruptEvent::new(edge));
        }
    }

    pub fn set_analog_input(&self, pin: PinRole, voltage: f64) {
        self.hw.state.lock().analog_inputs.insert(pin, voltage);
    }

    /// Voltage last written to an analog output on `pin`.
    pub fn analog_output(&self, pin: PinRole) -> Option<f64> {
        self.hw.state.lock().analog_outputs.get(&pin).copied()
    }

    /// Settings of the PWM channel on `pin`, while it is acquired.
    pub fn pwm(&self, pin: PinRole) -> Option<PwmState> {
        self.hw.state.lock().pwm.get(&pin).copied()
    }

    pub fn i2c_register(&self, address: u8, register: u8) -> Option<u8> {
        self.hw.i2c.register(address, register)
    }

    /// Returns false if no target answers at `address`.
    pub fn set_i2c_register(&self, address: u8, register: u8, value: u8) -> bool {
        self.hw.i2c.set_register(address, register, value)
    }

    /// Recent I2C transactions on this socket, oldest first. Only the last
    /// 256 are kept.
    pub fn i2c_log(&self) -> Vec<I2cRecord> {
        self.hw.i2c.log()
    }

    pub fn clear_i2c_log(&self) {
        self.hw.i2c.clear_log()
    }
}

fn routed(
    pins: &[PinRole],
    socket: SocketId,
    kind: CapabilityKind,
    pin: PinRole,
) -> Result<()> {
    if pins.contains(&pin) {
        Ok(())
    } else {
        Err(Error::Unsupported {
            socket,
            kind,
            pin: Some(pin),
        })
    }
}

/// A digital pin held by one peripheral. Returns the pin to an undriven,
/// floating input when dropped.
struct Line {
    hw: Arc<Hardware>,
    pin: PinRole,
}

impl Line {
    fn new(hw: &Arc<Hardware>, pin: PinRole) -> Self {
        Self {
            hw: hw.clone(),
            pin,
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut PinState) -> R) -> R {
        let mut state = self.hw.state.lock();
        f(state.pins.entry(self.pin).or_default())
    }

    fn level(&self) -> bool {
        self.with(|line| line.level())
    }

    fn drive_mode(&self) -> DriveMode {
        self.with(|line| line.drive_mode)
    }

    fn set_drive_mode(&self, mode: DriveMode) {
        self.with(|line| line.drive_mode = mode);
    }
}

impl Drop for Line {
    fn drop(&mut self) {
        self.with(|line| {
            line.driving = false;
            line.drive_mode = DriveMode::Floating;
            line.interrupt = None;
        });
    }
}

struct SimInput {
    line: Line,
}

impl SimInput {
    fn new(line: Line, drive_mode: DriveMode) -> Self {
        line.set_drive_mode(drive_mode);
        Self { line }
    }
}

impl DigitalInput for SimInput {
    fn read(&self) -> bool {
        self.line.level()
    }

    fn drive_mode(&self) -> DriveMode {
        self.line.drive_mode()
    }

    fn set_drive_mode(&mut self, mode: DriveMode) {
        self.line.set_drive_mode(mode);
    }
}

struct SimOutput {
    line: Line,
}

impl SimOutput {
    fn new(line: Line, initial: bool) -> Self {
        line.with(|state| {
            state.driving = true;
            state.latch = initial;
        });
        Self { line }
    }
}

impl DigitalOutputDriver for SimOutput {
    fn write(&mut self, value: bool) {
        trace!(socket = %self.line.hw.socket, pin = %self.line.pin, value, "Digital write.");
        self.line.with(|state| state.latch = value);
    }
}

struct SimInputOutput {
    line: Line,
    mode: DigitalIoMode,
}

impl SimInputOutput {
    fn new(line: Line, config: DigitalIoConfig) -> Self {
        line.with(|state| {
            state.drive_mode = config.drive_mode;
            state.latch = config.initial_output;
            state.driving = config.mode == DigitalIoMode::Output;
        });
        Self {
            line,
            mode: config.mode,
        }
    }
}

impl DigitalInputOutput for SimInputOutput {
    fn mode(&self) -> DigitalIoMode {
        self.mode
    }

    fn set_mode(&mut self, mode: DigitalIoMode) {
        self.mode = mode;
        self.line
            .with(|state| state.driving = mode == DigitalIoMode::Output);
    }

    fn write(&mut self, value: bool) {
        self.line.with(|state| state.latch = value);
    }

    fn read(&self) -> bool {
        self.line.level()
    }

    fn drive_mode(&self) -> DriveMode {
        self.line.drive_mode()
    }

    fn set_drive_mode(&mut self, mode: DriveMode) {
        self.line.set_drive_mode(mode);
    }
}

struct SimInterrupt {
    line: Line,
    dispatcher: InterruptDispatcher,
}

impl SimInterrupt {
    fn new(line: Line, config: InterruptConfig) -> Self {
        let dispatcher = InterruptDispatcher::new();
        line.with(|state| {
            state.drive_mode = config.drive_mode;
            state.interrupt = Some((config.edge, dispatcher.clone()));
        });
        Self { line, dispatcher }
    }
}

impl DigitalInput for SimInterrupt {
    fn read(&self) -> bool {
        self.line.level()
    }

    fn drive_mode(&self) -> DriveMode {
        self.line.drive_mode()
    }

    fn set_drive_mode(&mut self, mode: DriveMode) {
        self.line.set_drive_mode(mode);
    }
}

impl DigitalInterrupt for SimInterrupt {
    fn interrupt_edge(&self) -> InterruptEdge {
        self.line
            .with(|state| state.interrupt.as_ref().map(|(edge, _)| *edge))
            .unwrap_or_default()
    }

    fn set_interrupt_edge(&mut self, edge: InterruptEdge) {
        let dispatcher = self.dispatcher.clone();
        self.line
            .with(|state| state.interrupt = Some((edge, dispatcher)));
    }

    fn interrupts(&self) -> &InterruptDispatcher {
        &self.dispatcher
    }
}

struct SimAnalogInput {
    hw: Arc<Hardware>,
    pin: PinRole,
}

impl AnalogInput for SimAnalogInput {
    fn max_voltage(&self) -> f64 {
        self.hw.max_voltage
    }

    fn read_voltage(&mut self) -> f64 {
        let applied = self
            .hw
            .state
            .lock()
            .analog_inputs
            .get(&self.pin)
            .copied()
            .unwrap_or(0.0);
        applied.clamp(0.0, self.hw.max_voltage)
    }
}

struct SimAnalogOutput {
    hw: Arc<Hardware>,
    pin: PinRole,
}

impl SimAnalogOutput {
    fn new(hw: Arc<Hardware>, pin: PinRole, initial: f64) -> Self {
        let mut output = Self { hw, pin };
        output.write_voltage(initial);
        output
    }
}

impl AnalogOutputDriver for SimAnalogOutput {
    fn max_voltage(&self) -> f64 {
        self.hw.max_voltage
    }

    fn write_voltage(&mut self, voltage: f64) {
        let voltage = voltage.clamp(0.0, self.hw.max_voltage);
        trace!(socket = %self.hw.socket, pin = %self.pin, voltage, "Analog write.");
        self.hw.state.lock().analog_outputs.insert(self.pin, voltage);
    }
}

struct SimPwm {
    hw: Arc<Hardware>,
    pin: PinRole,
}

impl SimPwm {
    fn new(hw: Arc<Hardware>, pin: PinRole) -> Self {
        hw.state.lock().pwm.insert(pin, PwmState::default());
        Self { hw, pin }
    }

    fn with(&self, f: impl FnOnce(&mut PwmState)) {
        let mut state = self.hw.state.lock();
        f(state.pwm.entry(self.pin).or_default());
    }
}

impl PwmDriver for SimPwm {
    fn set_enabled(&mut self, enabled: bool) {
        trace!(socket = %self.hw.socket, pin = %self.pin, enabled, "PWM enable.");
        self.with(|pwm| pwm.enabled = enabled);
    }

    fn set_values(&mut self, frequency: f64, duty_cycle: f64) {
        trace!(socket = %self.hw.socket, pin = %self.pin, frequency, duty_cycle, "PWM values.");
        self.with(|pwm| {
            pwm.frequency = frequency;
            pwm.duty_cycle = duty_cycle;
        });
    }
}

impl Drop for SimPwm {
    fn drop(&mut self) {
        self.hw.state.lock().pwm.remove(&self.pin);
    }
}

#[derive(Debug)]
struct SimSpi {
    #[allow(dead_code)]
    settings: SpiSettings,
}

impl SpiDevice for SimSpi {}

#[derive(Debug)]
struct SimSerial {
    #[allow(dead_code)]
    settings: SerialSettings,
}

impl SerialDevice for SimSerial {}

#[derive(Debug)]
struct SimCan {
    #[allow(dead_code)]
    settings: CanSettings,
}

impl CanDevice for SimCan {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::{I2cSettings, I2cTransferStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sim(number: u8, types: &str) -> SimSocket {
        SimSocket::new(&SocketConfig::new(number, types)).unwrap()
    }

    #[tokio::test]
    async fn test_letters_decide_factories() {
        let x = sim(1, "X");
        let err = x.socket().analog_input(PinRole::Three).await.err().unwrap();
        assert!(matches!(
            err,
            Error::Unsupported {
                kind: CapabilityKind::AnalogInput,
                ..
            }
        ));

        // Pin 7 is not routed on an X socket.
        let err = x.socket().digital_output(PinRole::Seven, false).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Unsupported {
                pin: Some(PinRole::Seven),
                ..
            }
        ));
        assert_eq!(x.socket().pin_holder(PinRole::Seven), None);

        let y = sim(2, "Y");
        assert!(y.socket().digital_output(PinRole::Seven, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_input_follows_external_level_and_pull() {
        let sim = sim(1, "X");
        let probe = sim.probe();

        let input = sim
            .socket()
            .digital_input(PinRole::Four, DriveMode::PullUp)
            .await
            .unwrap();
        assert!(input.read());
        assert_eq!(input.drive_mode(), DriveMode::PullUp);

        probe.set_input(PinRole::Four, false);
        assert!(!input.read());
    }

    #[tokio::test]
    async fn test_interrupt_edges_and_unsubscribe() {
        let sim = sim(1, "X");
        let probe = sim.probe();
        let mut interrupt = sim
            .socket()
            .digital_interrupt(PinRole::Three, InterruptEdge::Rising, DriveMode::Floating)
            .await
            .unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        let id = interrupt
            .interrupts()
            .subscribe(move |event| seen.lock().push((event.edge, event.value)));

        probe.set_input(PinRole::Three, true);
        probe.set_input(PinRole::Three, true);
        probe.set_input(PinRole::Three, false);
        assert_eq!(*events.lock(), vec![(Edge::Rising, true)]);

        interrupt.set_interrupt_edge(InterruptEdge::Both);
        assert_eq!(interrupt.interrupt_edge(), InterruptEdge::Both);
        probe.set_input(PinRole::Three, true);
        probe.set_input(PinRole::Three, false);
        assert_eq!(
            *events.lock(),
            vec![
                (Edge::Rising, true),
                (Edge::Rising, true),
                (Edge::Falling, false),
            ]
        );

        assert!(interrupt.interrupts().unsubscribe(id));
        probe.set_input(PinRole::Three, true);
        assert_eq!(events.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_falling_only_interrupt() {
        let sim = sim(1, "Y");
        let probe = sim.probe();
        let interrupt = sim
            .socket()
            .digital_interrupt(PinRole::Three, InterruptEdge::Falling, DriveMode::PullUp)
            .await
            .unwrap();

        let edges = Arc::new(Mutex::new(Vec::new()));
        let seen = edges.clone();
        interrupt
            .interrupts()
            .subscribe(move |event| seen.lock().push(event.edge));

        // Pulled up, so the first external low is a falling edge.
        probe.set_input(PinRole::Three, false);
        probe.set_input(PinRole::Three, true);
        probe.set_input(PinRole::Three, false);
        assert_eq!(*edges.lock(), vec![Edge::Falling, Edge::Falling]);
    }

    #[tokio::test]
    async fn test_dropped_interrupt_stops_raising() {
        let sim = sim(1, "X");
        let probe = sim.probe();
        let interrupt = sim
            .socket()
            .digital_interrupt(PinRole::Three, InterruptEdge::Both, DriveMode::Floating)
            .await
            .unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        interrupt.interrupts().subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(interrupt);

        probe.set_input(PinRole::Three, true);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_input_output_latch() {
        let sim = sim(1, "X");
        let probe = sim.probe();
        let mut io = sim
            .socket()
            .digital_input_output(PinRole::Five, DigitalIoMode::Input, DriveMode::Floating, false)
            .await
            .unwrap();

        probe.set_input(PinRole::Five, true);
        io.write(false);
        // Input mode: the write only reaches the latch.
        assert!(io.read());

        io.set_mode(DigitalIoMode::Output);
        assert!(!io.read());
        assert!(!probe.level(PinRole::Five));

        io.set_high();
        assert!(probe.level(PinRole::Five));
    }

    #[tokio::test]
    async fn test_analog_input_scales_and_clamps() {
        let mut config = SocketConfig::new(2, "A");
        config.analog_max_voltage = 5.0;
        let sim = SimSocket::new(&config).unwrap();
        let probe = sim.probe();

        let mut input = sim.socket().analog_input(PinRole::Four).await.unwrap();
        probe.set_analog_input(PinRole::Four, 1.25);
        assert_eq!(input.read_voltage(), 1.25);
        assert_eq!(input.read_proportion(), 0.25);

        probe.set_analog_input(PinRole::Four, 9.0);
        assert_eq!(input.read_voltage(), 5.0);

        let err = sim.socket().analog_input(PinRole::Six).await.err().unwrap();
        assert!(matches!(err, Error::Unsupported { pin: Some(PinRole::Six), .. }));
    }

    #[tokio::test]
    async fn test_analog_output_reaches_hardware() {
        let sim = sim(5, "O");
        let probe = sim.probe();

        let mut dac = sim.socket().analog_output(PinRole::Five, 1.0).await.unwrap();
        assert_eq!(probe.analog_output(PinRole::Five), Some(1.0));

        dac.set_proportion(0.5);
        assert_eq!(probe.analog_output(PinRole::Five), Some(1.65));
        assert_eq!(dac.voltage(), 1.65);
    }

    #[tokio::test]
    async fn test_pwm_state_and_release() {
        let sim = sim(4, "XP");
        let probe = sim.probe();

        let mut pwm = sim.socket().pwm_output(PinRole::Eight).await.unwrap();
        assert_eq!(probe.pwm(PinRole::Eight), Some(PwmState::default()));

        pwm.set(1000.0, 0.25);
        pwm.set_enabled(true);
        assert_eq!(
            probe.pwm(PinRole::Eight),
            Some(PwmState {
                enabled: true,
                frequency: 1000.0,
                duty_cycle: 0.25,
            })
        );

        drop(pwm);
        assert_eq!(probe.pwm(PinRole::Eight), None);
        assert!(sim.socket().pwm_output(PinRole::Three).await.is_err());
    }

    #[tokio::test]
    async fn test_i2c_register_protocol() {
        let config = SocketConfig::new(3, "XI").with_i2c_target(0x4C, vec![0x00, 0x10, 0x20, 0x30]);
        let sim = SimSocket::new(&config).unwrap();
        let probe = sim.probe();

        let mut dev = sim.socket().i2c_device(I2cSettings::new(0x4C)).await.unwrap();
        assert_eq!(dev.read_registers(0x01, 3), vec![0x10, 0x20, 0x30]);
        assert_eq!(dev.write_register(0x05, 0xAB), I2cTransferStatus::FullTransfer);
        assert_eq!(probe.i2c_register(0x4C, 0x05), Some(0xAB));

        assert!(probe.set_i2c_register(0x4C, 0x02, 0x77));
        assert_eq!(dev.read_register(0x02), 0x77);

        assert_eq!(
            probe.i2c_log(),
            vec![
                I2cRecord::WriteRead {
                    address: 0x4C,
                    written: vec![0x01],
                    read: vec![0x10, 0x20, 0x30],
                },
                I2cRecord::Write {
                    address: 0x4C,
                    data: vec![0x05, 0xAB],
                },
                I2cRecord::WriteRead {
                    address: 0x4C,
                    written: vec![0x02],
                    read: vec![0x77],
                },
            ]
        );

        let mut absent = sim.socket().i2c_device(I2cSettings::new(0x4D)).await.unwrap();
        let (status, _) = absent.try_read_register(0x00);
        assert_eq!(status, I2cTransferStatus::SlaveAddressNotAcknowledged);
    }

    #[tokio::test]
    async fn test_bus_kinds_follow_letters() {
        let su = sim(6, "SU");
        assert!(su.socket().spi_device(SpiSettings::default()).await.is_ok());

        let rts = SerialSettings {
            handshake: Handshake::RequestToSend,
            ..SerialSettings::default()
        };
        assert!(matches!(
            su.socket().serial_device(rts).await,
            Err(Error::Unsupported {
                kind: CapabilityKind::SerialDevice,
                ..
            })
        ));
        assert_eq!(su.socket().pin_holder(PinRole::Six), None);

        let kc = sim(7, "KC");
        let serial = kc.socket().serial_device(rts).await.unwrap();
        assert_eq!(serial.pins().len(), 4);
        // CAN shares pins 4 and 5 with the serial port.
        assert!(matches!(
            kc.socket().can_device(CanSettings::default()).await,
            Err(Error::PinClaimed { .. })
        ));
        drop(serial);
        assert!(kc.socket().can_device(CanSettings::default()).await.is_ok());
    }

    #[test]
    fn test_board_from_default_config() {
        let board = SimBoard::new(&BoardConfig::default()).unwrap();
        assert_eq!(board.name(), "simulated");
        assert_eq!(board.sockets().len(), BoardConfig::default().sockets.len());
        assert_eq!(board.socket(3).unwrap().types(), &[SocketType::X, SocketType::I]);
        assert!(board.socket(42).is_none());
    }
}
