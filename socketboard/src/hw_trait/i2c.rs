//! I2C device contract.
//!
//! The driver implements three primitives on [`I2cBus`]. [`I2cDevice`]
//! builds register access on top of them, keeping the transaction shapes
//! real peripherals expect: a register write is a single two-byte write, and
//! a register read is a single combined transaction (write the register
//! index, repeated start, read) with no stop condition in between.
//!
//! Transfer failures are ordinary outcomes on a shared bus, so they are
//! reported as an [`I2cTransferStatus`] value rather than as an error.

use std::fmt;

use strum::Display;

use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Outcome of one bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum I2cTransferStatus {
    /// Every byte was transferred.
    FullTransfer,
    /// The target stopped acknowledging part way through.
    PartialTransfer,
    /// Nothing answered at the address.
    SlaveAddressNotAcknowledged,
    /// The target held the clock low for too long.
    ClockStretchTimeout,
    UnknownError,
}

impl I2cTransferStatus {
    pub const fn is_ok(self) -> bool {
        matches!(self, I2cTransferStatus::FullTransfer)
    }
}

/// Status plus the number of bytes actually moved, on a best-effort basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct I2cTransfer {
    pub status: I2cTransferStatus,
    pub bytes_transferred: usize,
}

impl I2cTransfer {
    pub const fn full(bytes_transferred: usize) -> Self {
        Self {
            status: I2cTransferStatus::FullTransfer,
            bytes_transferred,
        }
    }

    pub const fn failed(status: I2cTransferStatus, bytes_transferred: usize) -> Self {
        Self {
            status,
            bytes_transferred,
        }
    }
}

/// Bus clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum I2cBusSpeed {
    /// 100 kHz
    #[default]
    Standard,
    /// 400 kHz
    Fast,
}

impl I2cBusSpeed {
    pub const fn hz(self) -> u32 {
        match self {
            I2cBusSpeed::Standard => 100_000,
            I2cBusSpeed::Fast => 400_000,
        }
    }
}

/// Target address and clock an I2C device is bound with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cSettings {
    /// 7-bit target address.
    pub address: u8,
    pub speed: I2cBusSpeed,
}

impl I2cSettings {
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            speed: I2cBusSpeed::Standard,
        }
    }

    pub const fn fast(mut self) -> Self {
        self.speed = I2cBusSpeed::Fast;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.address > 0x7F {
            return Err(Error::InvalidParameter(format!(
                "I2C address 0x{:02x} does not fit in 7 bits",
                self.address
            )));
        }
        Ok(())
    }
}

/// Transfer primitives a mainboard driver provides for one I2C target.
pub trait I2cBus: Send {
    fn write(&mut self, buffer: &[u8]) -> I2cTransfer;

    fn read(&mut self, buffer: &mut [u8]) -> I2cTransfer;

    /// Write then read as one transaction joined by a repeated start.
    fn write_read(&mut self, write_buffer: &[u8], read_buffer: &mut [u8]) -> I2cTransfer;
}

/// I2C target bound to a socket.
pub struct I2cDevice {
    bus: Box<dyn I2cBus>,
    settings: I2cSettings,
    write1: [u8; 1],
    write2: [u8; 2],
    read1: [u8; 1],
}

impl I2cDevice {
    pub fn new(bus: Box<dyn I2cBus>, settings: I2cSettings) -> Self {
        Self {
            bus,
            settings,
            write1: [0],
            write2: [0; 2],
            read1: [0],
        }
    }

    pub fn settings(&self) -> I2cSettings {
        self.settings
    }

    pub fn write(&mut self, buffer: &[u8]) -> I2cTransfer {
        self.bus.write(buffer)
    }

    pub fn read(&mut self, buffer: &mut [u8]) -> I2cTransfer {
        self.bus.read(buffer)
    }

    pub fn write_read(&mut self, write_buffer: &[u8], read_buffer: &mut [u8]) -> I2cTransfer {
        self.bus.write_read(write_buffer, read_buffer)
    }

    /// Write `value` to `register` as a single `[register, value]` write.
    pub fn write_register(&mut self, register: u8, value: u8) -> I2cTransferStatus {
        self.write2 = [register, value];
        let transfer = self.bus.write(&self.write2);
        self.note(register, transfer);
        transfer.status
    }

    /// Read one register. The byte is unspecified if the transfer failed;
    /// use [`try_read_register`](Self::try_read_register) to see the status.
    pub fn read_register(&mut self, register: u8) -> u8 {
        self.try_read_register(register).1
    }

    pub fn try_read_register(&mut self, register: u8) -> (I2cTransferStatus, u8) {
        self.write1[0] = register;
        let transfer = self.bus.write_read(&self.write1, &mut self.read1);
        self.note(register, transfer);
        (transfer.status, self.read1[0])
    }

    /// Read `count` consecutive registers starting at `register`.
    pub fn read_registers(&mut self, register: u8, count: usize) -> Vec<u8> {
        let mut values = vec![0u8; count];
        let _status = self.read_registers_into(register, &mut values);
        values
    }

    /// Fill `values` from consecutive registers starting at `register`.
    pub fn read_registers_into(&mut self, register: u8, values: &mut [u8]) -> I2cTransferStatus {
        self.write1[0] = register;
        let transfer = self.bus.write_read(&self.write1, values);
        self.note(register, transfer);
        transfer.status
    }

    fn note(&self, register: u8, transfer: I2cTransfer) {
        if !transfer.status.is_ok() {
            trace!(
                address = self.settings.address,
                register,
                status = %transfer.status,
                bytes = transfer.bytes_transferred,
                "I2C register access incomplete"
            );
        }
    }
}

impl fmt::Debug for I2cDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I2cDevice")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use test_case::test_case;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Txn {
        Write(Vec<u8>),
        Read(usize),
        WriteRead(Vec<u8>, usize),
    }

    /// Register file that answers reads with `register + offset` and records
    /// every transaction.
    struct Scripted {
        log: Arc<Mutex<Vec<Txn>>>,
        status: I2cTransferStatus,
    }

    impl I2cBus for Scripted {
        fn write(&mut self, buffer: &[u8]) -> I2cTransfer {
            self.log.lock().push(Txn::Write(buffer.to_vec()));
            I2cTransfer::failed(self.status, buffer.len())
        }

        fn read(&mut self, buffer: &mut [u8]) -> I2cTransfer {
            self.log.lock().push(Txn::Read(buffer.len()));
            buffer.fill(0xAA);
            I2cTransfer::failed(self.status, buffer.len())
        }

        fn write_read(&mut self, write_buffer: &[u8], read_buffer: &mut [u8]) -> I2cTransfer {
            self.log
                .lock()
                .push(Txn::WriteRead(write_buffer.to_vec(), read_buffer.len()));
            let start = write_buffer[0];
            for (offset, byte) in read_buffer.iter_mut().enumerate() {
                *byte = start.wrapping_add(offset as u8);
            }
            I2cTransfer::failed(self.status, write_buffer.len() + read_buffer.len())
        }
    }

    fn device(status: I2cTransferStatus) -> (I2cDevice, Arc<Mutex<Vec<Txn>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = Scripted {
            log: log.clone(),
            status,
        };
        (I2cDevice::new(Box::new(bus), I2cSettings::new(0x40)), log)
    }

    #[test]
    fn test_write_register_is_single_two_byte_write() {
        let (mut dev, log) = device(I2cTransferStatus::FullTransfer);
        let status = dev.write_register(0x05, 0x7F);

        assert_eq!(status, I2cTransferStatus::FullTransfer);
        assert_eq!(*log.lock(), vec![Txn::Write(vec![0x05, 0x7F])]);
    }

    #[test]
    fn test_read_register_is_single_combined_transaction() {
        let (mut dev, log) = device(I2cTransferStatus::FullTransfer);
        let value = dev.read_register(0x22);

        assert_eq!(value, 0x22);
        assert_eq!(*log.lock(), vec![Txn::WriteRead(vec![0x22], 1)]);
    }

    #[test]
    fn test_read_registers_matches_combined_transaction() {
        let (mut dev, log) = device(I2cTransferStatus::FullTransfer);
        let values = dev.read_registers(0x10, 3);

        let mut expected = [0u8; 3];
        let (mut reference, _) = device(I2cTransferStatus::FullTransfer);
        let _ = reference.write_read(&[0x10], &mut expected);

        assert_eq!(values, expected.to_vec());
        assert_eq!(*log.lock(), vec![Txn::WriteRead(vec![0x10], 3)]);
    }

    #[test_case(I2cTransferStatus::PartialTransfer)]
    #[test_case(I2cTransferStatus::SlaveAddressNotAcknowledged)]
    #[test_case(I2cTransferStatus::ClockStretchTimeout)]
    fn test_status_passes_through(status: I2cTransferStatus) {
        let (mut dev, _) = device(status);

        assert_eq!(dev.write_register(0x01, 0x02), status);
        assert_eq!(dev.try_read_register(0x01).0, status);
        let mut values = [0u8; 2];
        assert_eq!(dev.read_registers_into(0x01, &mut values), status);
        assert!(!status.is_ok());
    }

    #[test]
    fn test_raw_primitives_forward() {
        let (mut dev, log) = device(I2cTransferStatus::FullTransfer);
        let mut buf = [0u8; 4];

        let transfer = dev.read(&mut buf);
        assert_eq!(transfer, I2cTransfer::full(4));
        assert_eq!(buf, [0xAA; 4]);

        let transfer = dev.write(&[1, 2, 3]);
        assert_eq!(transfer.bytes_transferred, 3);

        assert_eq!(*log.lock(), vec![Txn::Read(4), Txn::Write(vec![1, 2, 3])]);
    }

    #[test_case(0x00, true)]
    #[test_case(0x7F, true)]
    #[test_case(0x80, false)]
    fn test_settings_validate(address: u8, valid: bool) {
        assert_eq!(I2cSettings::new(address).validate().is_ok(), valid);
    }

    #[test]
    fn test_bus_speed() {
        let settings = I2cSettings::new(0x20).fast();
        assert_eq!(settings.speed.hz(), 400_000);
        assert_eq!(I2cBusSpeed::default().hz(), 100_000);
    }
}
