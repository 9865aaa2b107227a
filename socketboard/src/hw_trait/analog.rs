//! Analog input and output contracts.
//!
//! Voltages are in volts. Proportions are relative to the instance's own
//! reference voltage, never to an absolute constant.

use std::fmt;

/// Analog input channel.
pub trait AnalogInput: Send {
    /// Reference voltage a full-scale reading corresponds to.
    fn max_voltage(&self) -> f64;

    /// Sample the channel.
    fn read_voltage(&mut self) -> f64;

    /// Sample the channel as a fraction of [`max_voltage`](Self::max_voltage).
    fn read_proportion(&mut self) -> f64 {
        self.read_voltage() / self.max_voltage()
    }
}

/// Hardware side of an analog output.
pub trait AnalogOutputDriver: Send {
    fn max_voltage(&self) -> f64;

    fn write_voltage(&mut self, voltage: f64);
}

/// Analog output with a cached voltage.
///
/// The cached value is the public view of the last value set, independent of
/// whether the hardware accepted it.
pub struct AnalogOutput {
    driver: Box<dyn AnalogOutputDriver>,
    voltage: f64,
}

impl AnalogOutput {
    /// Wrap a driver that has already been set to `initial` volts.
    pub fn new(driver: Box<dyn AnalogOutputDriver>, initial: f64) -> Self {
        Self {
            driver,
            voltage: initial,
        }
    }

    pub fn max_voltage(&self) -> f64 {
        self.driver.max_voltage()
    }

    /// Last voltage set.
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    pub fn set_voltage(&mut self, voltage: f64) {
        self.voltage = voltage;
        self.driver.write_voltage(voltage);
    }

    /// Last voltage set, as a fraction of the reference voltage.
    pub fn proportion(&self) -> f64 {
        self.voltage / self.max_voltage()
    }

    pub fn set_proportion(&mut self, proportion: f64) {
        self.set_voltage(proportion * self.max_voltage());
    }

    /// Alias of [`set_voltage`](Self::set_voltage).
    pub fn write_voltage(&mut self, voltage: f64) {
        self.set_voltage(voltage);
    }

    /// Alias of [`set_proportion`](Self::set_proportion).
    pub fn write_proportion(&mut self, proportion: f64) {
        self.set_proportion(proportion);
    }
}

impl fmt::Debug for AnalogOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalogOutput")
            .field("voltage", &self.voltage)
            .field("max_voltage", &self.max_voltage())
            .finish_non_exhaustive()
    }
}
