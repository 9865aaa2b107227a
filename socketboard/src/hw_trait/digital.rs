//! Digital I/O contracts.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use strum::Display;

/// Input bias applied to a pin while it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum DriveMode {
    #[default]
    Floating,
    PullUp,
    PullDown,
}

/// Direction of a bidirectional pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DigitalIoMode {
    Input,
    Output,
}

/// A single level transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Edge {
    Rising,
    Falling,
}

impl Edge {
    /// Edge produced by moving from `old` to `new`, if the level changed.
    pub const fn between(old: bool, new: bool) -> Option<Edge> {
        match (old, new) {
            (false, true) => Some(Edge::Rising),
            (true, false) => Some(Edge::Falling),
            _ => None,
        }
    }
}

/// Transitions an interrupt pin reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum InterruptEdge {
    #[default]
    Rising,
    Falling,
    Both,
}

impl InterruptEdge {
    /// Whether a transition qualifies under this setting.
    pub const fn accepts(self, edge: Edge) -> bool {
        matches!(
            (self, edge),
            (InterruptEdge::Both, _)
                | (InterruptEdge::Rising, Edge::Rising)
                | (InterruptEdge::Falling, Edge::Falling)
        )
    }
}

/// Payload handed to interrupt handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptEvent {
    pub edge: Edge,
    /// Pin level after the transition.
    pub value: bool,
    pub timestamp: Instant,
}

impl InterruptEvent {
    pub fn new(edge: Edge) -> Self {
        Self {
            edge,
            value: edge == Edge::Rising,
            timestamp: Instant::now(),
        }
    }
}

/// Handle returned by [`InterruptDispatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&InterruptEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler)>,
}

/// Subscription list for an interrupt pin.
///
/// The driver owns a clone and calls [`raise`](Self::raise) from whatever
/// context its interrupt source runs on, which may be a different thread
/// from the module's. Handlers must therefore be `Send + Sync` and must not
/// assume exclusive access to module state. Handlers are invoked outside the
/// internal lock, so a handler may subscribe or unsubscribe.
#[derive(Clone, Default)]
pub struct InterruptDispatcher {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl InterruptDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. It stays registered until unsubscribed or until
    /// every clone of the dispatcher is dropped.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&InterruptEvent) + Send + Sync + 'static,
    {
        let mut subscribers = self.subscribers.lock();
        let id = SubscriptionId(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.handlers.push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.handlers.len();
        subscribers.handlers.retain(|(handler_id, _)| *handler_id != id);
        subscribers.handlers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().handlers.len()
    }

    /// Deliver an event to every current subscriber, in subscription order.
    pub fn raise(&self, event: InterruptEvent) {
        let handlers: Vec<Handler> = self
            .subscribers
            .lock()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(&event);
        }
    }
}

impl fmt::Debug for InterruptDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptDispatcher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Live digital input.
pub trait DigitalInput: Send {
    /// Sample the pin.
    fn read(&self) -> bool;

    fn drive_mode(&self) -> DriveMode;

    fn set_drive_mode(&mut self, mode: DriveMode);
}

/// Digital input that reports qualifying transitions to subscribers.
pub trait DigitalInterrupt: DigitalInput {
    fn interrupt_edge(&self) -> InterruptEdge;

    fn set_interrupt_edge(&mut self, edge: InterruptEdge);

    /// Subscription list the driver raises events on.
    fn interrupts(&self) -> &InterruptDispatcher;
}

/// Pin that switches between input and output under caller control.
///
/// A write while in input mode only updates the output latch; the latched
/// level is driven once the pin is switched to output. A read in output mode
/// returns the latched level.
pub trait DigitalInputOutput: Send {
    fn mode(&self) -> DigitalIoMode;

    fn set_mode(&mut self, mode: DigitalIoMode);

    fn write(&mut self, value: bool);

    fn read(&self) -> bool;

    fn drive_mode(&self) -> DriveMode;

    fn set_drive_mode(&mut self, mode: DriveMode);

    fn set_high(&mut self) {
        self.write(true);
    }

    fn set_low(&mut self) {
        self.write(false);
    }
}

/// Hardware side of a digital output.
pub trait DigitalOutputDriver: Send {
    fn write(&mut self, value: bool);
}

/// Digital output with a cached level.
///
/// [`read`](Self::read) reflects the last value written through this handle;
/// it does not read the pin back.
pub struct DigitalOutput {
    driver: Box<dyn DigitalOutputDriver>,
    value: bool,
}

impl DigitalOutput {
    /// Wrap a driver that has already been set to `initial`.
    pub fn new(driver: Box<dyn DigitalOutputDriver>, initial: bool) -> Self {
        Self {
            driver,
            value: initial,
        }
    }

    pub fn write(&mut self, value: bool) {
        self.driver.write(value);
        self.value = value;
    }

    pub fn read(&self) -> bool {
        self.value
    }

    pub fn set_high(&mut self) {
        self.write(true);
    }

    pub fn set_low(&mut self) {
        self.write(false);
    }

    pub fn toggle(&mut self) {
        self.write(!self.value);
    }
}

impl fmt::Debug for DigitalOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitalOutput")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}
