//! PWM output contract.

use std::fmt;

/// Hardware side of a PWM channel.
pub trait PwmDriver: Send {
    fn set_enabled(&mut self, enabled: bool);

    /// Program frequency (Hz) and duty cycle (0.0 to 1.0) together.
    fn set_values(&mut self, frequency: f64, duty_cycle: f64);
}

/// PWM channel with cached state.
///
/// A fresh channel is disabled with frequency and duty cycle both zero.
pub struct PwmOutput {
    driver: Box<dyn PwmDriver>,
    enabled: bool,
    frequency: f64,
    duty_cycle: f64,
}

impl PwmOutput {
    pub fn new(driver: Box<dyn PwmDriver>) -> Self {
        Self {
            driver,
            enabled: false,
            frequency: 0.0,
            duty_cycle: 0.0,
        }
    }

    /// Push both values to the hardware, then cache them.
    pub fn set(&mut self, frequency: f64, duty_cycle: f64) {
        self.driver.set_values(frequency, duty_cycle);

        self.frequency = frequency;
        self.duty_cycle = duty_cycle;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.driver.set_enabled(enabled);

        self.enabled = enabled;
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.set(frequency, self.duty_cycle);
    }

    pub fn duty_cycle(&self) -> f64 {
        self.duty_cycle
    }

    pub fn set_duty_cycle(&mut self, duty_cycle: f64) {
        self.set(self.frequency, duty_cycle);
    }
}

impl fmt::Debug for PwmOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PwmOutput")
            .field("enabled", &self.enabled)
            .field("frequency", &self.frequency)
            .field("duty_cycle", &self.duty_cycle)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Enabled(bool),
        Values(f64, f64),
    }

    struct Recorder(Arc<Mutex<Vec<Call>>>);

    impl PwmDriver for Recorder {
        fn set_enabled(&mut self, enabled: bool) {
            self.0.lock().push(Call::Enabled(enabled));
        }

        fn set_values(&mut self, frequency: f64, duty_cycle: f64) {
            self.0.lock().push(Call::Values(frequency, duty_cycle));
        }
    }

    fn pwm() -> (PwmOutput, Arc<Mutex<Vec<Call>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (PwmOutput::new(Box::new(Recorder(calls.clone()))), calls)
    }

    #[test]
    fn test_fresh_channel_state() {
        let (pwm, calls) = pwm();
        assert!(!pwm.enabled());
        assert_eq!(pwm.frequency(), 0.0);
        assert_eq!(pwm.duty_cycle(), 0.0);
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_set_echoes_values() {
        let (mut pwm, calls) = pwm();
        pwm.set(1000.0, 0.25);

        assert_eq!(pwm.frequency(), 1000.0);
        assert_eq!(pwm.duty_cycle(), 0.25);
        assert_eq!(*calls.lock(), vec![Call::Values(1000.0, 0.25)]);
    }

    #[test]
    fn test_frequency_alone_preserves_duty_cycle() {
        let (mut pwm, calls) = pwm();
        pwm.set(1000.0, 0.25);
        pwm.set_frequency(2000.0);

        assert_eq!(pwm.frequency(), 2000.0);
        assert_eq!(pwm.duty_cycle(), 0.25);
        assert_eq!(calls.lock().last(), Some(&Call::Values(2000.0, 0.25)));
    }

    #[test]
    fn test_duty_cycle_alone_preserves_frequency() {
        let (mut pwm, _) = pwm();
        pwm.set(500.0, 0.1);
        pwm.set_duty_cycle(0.9);

        assert_eq!(pwm.frequency(), 500.0);
        assert_eq!(pwm.duty_cycle(), 0.9);
    }

    #[test]
    fn test_enable_calls_hardware_once() {
        let (mut pwm, calls) = pwm();
        pwm.set_enabled(true);
        assert!(pwm.enabled());
        pwm.set_enabled(false);
        assert!(!pwm.enabled());

        assert_eq!(
            *calls.lock(),
            vec![Call::Enabled(true), Call::Enabled(false)]
        );
    }
}
