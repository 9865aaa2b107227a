//! Register-file I2C targets.
//!
//! Each target is 256 byte-wide registers behind an auto-incrementing
//! pointer, the layout most sensor and power-management parts use. The first
//! byte of a write loads the pointer; any further bytes are stored starting
//! there. Reads return bytes from the pointer onward.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::I2cTargetConfig;
use crate::hw_trait::{I2cBus, I2cSettings, I2cTransfer, I2cTransferStatus};
use crate::socket::SocketId;
use crate::tracing::prelude::*;

/// One transaction as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cRecord {
    Write {
        address: u8,
        data: Vec<u8>,
    },
    Read {
        address: u8,
        data: Vec<u8>,
    },
    /// Write and read joined by a repeated start.
    WriteRead {
        address: u8,
        written: Vec<u8>,
        read: Vec<u8>,
    },
}

struct RegisterFile {
    registers: [u8; 256],
    pointer: u8,
}

impl RegisterFile {
    fn new(initial: &[u8]) -> Self {
        let mut registers = [0u8; 256];
        for (slot, value) in registers.iter_mut().zip(initial) {
            *slot = *value;
        }
        Self {
            registers,
            pointer: 0,
        }
    }

    fn write(&mut self, data: &[u8]) {
        if let Some((pointer, values)) = data.split_first() {
            self.pointer = *pointer;
            for value in values {
                self.registers[self.pointer as usize] = *value;
                self.pointer = self.pointer.wrapping_add(1);
            }
        }
    }

    fn read(&mut self, buffer: &mut [u8]) {
        for byte in buffer {
            *byte = self.registers[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

/// Transactions kept in the log; older ones are discarded.
pub const LOG_CAPACITY: usize = 256;

#[derive(Default)]
struct Targets {
    files: BTreeMap<u8, RegisterFile>,
    log: VecDeque<I2cRecord>,
}

impl Targets {
    fn record(&mut self, record: I2cRecord) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(record);
    }
}

/// Every target on one socket's bus, plus the transaction log.
#[derive(Clone, Default)]
pub(crate) struct I2cTargets {
    inner: Arc<Mutex<Targets>>,
}

impl I2cTargets {
    pub fn new(configs: &[I2cTargetConfig]) -> Self {
        let files = configs
            .iter()
            .map(|target| (target.address, RegisterFile::new(&target.registers)))
            .collect();
        Self {
            inner: Arc::new(Mutex::new(Targets {
                files,
                log: VecDeque::with_capacity(LOG_CAPACITY),
            })),
        }
    }

    pub fn register(&self, address: u8, register: u8) -> Option<u8> {
        self.inner
            .lock()
            .files
            .get(&address)
            .map(|file| file.registers[register as usize])
    }

    pub fn set_register(&self, address: u8, register: u8, value: u8) -> bool {
        match self.inner.lock().files.get_mut(&address) {
            Some(file) => {
                file.registers[register as usize] = value;
                true
            }
            None => false,
        }
    }

    /// The most recent transactions, oldest first.
    pub fn log(&self) -> Vec<I2cRecord> {
        self.inner.lock().log.iter().cloned().collect()
    }

    pub fn clear_log(&self) {
        self.inner.lock().log.clear();
    }
}

/// Bus handle bound to one target address.
pub(crate) struct SimI2cBus {
    socket: SocketId,
    settings: I2cSettings,
    targets: I2cTargets,
}

impl SimI2cBus {
    pub fn new(socket: SocketId, settings: I2cSettings, targets: I2cTargets) -> Self {
        trace!(
            socket = %socket,
            address = settings.address,
            hz = settings.speed.hz(),
            "I2C target bound."
        );
        Self {
            socket,
            settings,
            targets,
        }
    }

    fn nak(&self) -> I2cTransfer {
        trace!(
            socket = %self.socket,
            address = self.settings.address,
            "I2C address not acknowledged."
        );
        I2cTransfer::failed(I2cTransferStatus::SlaveAddressNotAcknowledged, 0)
    }
}

impl I2cBus for SimI2cBus {
    fn write(&mut self, buffer: &[u8]) -> I2cTransfer {
        let address = self.settings.address;
        let mut targets = self.targets.inner.lock();
        let Some(file) = targets.files.get_mut(&address) else {
            return self.nak();
        };

        file.write(buffer);
        targets.record(I2cRecord::Write {
            address,
            data: buffer.to_vec(),
        });
        trace!(socket = %self.socket, address, "I2C write {}", hex::encode(buffer));
        I2cTransfer::full(buffer.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> I2cTransfer {
        let address = self.settings.address;
        let mut targets = self.targets.inner.lock();
        let Some(file) = targets.files.get_mut(&address) else {
            return self.nak();
        };

        file.read(buffer);
        targets.record(I2cRecord::Read {
            address,
            data: buffer.to_vec(),
        });
        trace!(socket = %self.socket, address, "I2C read {}", hex::encode(&*buffer));
        I2cTransfer::full(buffer.len())
    }

    fn write_read(&mut self, write_buffer: &[u8], read_buffer: &mut [u8]) -> I2cTransfer {
        let address = self.settings.address;
        let mut targets = self.targets.inner.lock();
        let Some(file) = targets.files.get_mut(&address) else {
            return self.nak();
        };

        file.write(write_buffer);
        file.read(read_buffer);
        targets.record(I2cRecord::WriteRead {
            address,
            written: write_buffer.to_vec(),
            read: read_buffer.to_vec(),
        });
        trace!(
            socket = %self.socket,
            address,
            "I2C write {} read {}",
            hex::encode(write_buffer),
            hex::encode(&*read_buffer)
        );
        I2cTransfer::full(write_buffer.len() + read_buffer.len())
    }
}
