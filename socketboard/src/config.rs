//! Configuration management for socketboard.
//!
//! This module loads the board description the simulated mainboard is built
//! from: which sockets exist, their type letters, analog reference voltage
//! and the I2C targets wired to them. Descriptions are JSON files; when none
//! is named, a built-in layout is used.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::pin::SocketType;
use crate::tracing::prelude::*;

/// Environment variable naming the board description file.
pub const CONFIG_ENV: &str = "SOCKETBOARD_CONFIG";

/// Get module initialization timeout from environment or use default.
pub fn module_init_timeout() -> Duration {
    std::env::var("SOCKETBOARD_INIT_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(10))
}

/// Mainboard description.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BoardConfig {
    /// Board name, for logs
    pub name: String,

    /// Sockets, in any order
    pub sockets: Vec<SocketConfig>,
}

/// One socket of the board.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SocketConfig {
    /// Socket number printed on the board
    pub number: u8,

    /// Optional silkscreen label
    #[serde(default)]
    pub name: Option<String>,

    /// Type letters, e.g. "YIP"
    pub types: String,

    /// Reference voltage for analog inputs and outputs
    #[serde(default = "default_max_voltage")]
    pub analog_max_voltage: f64,

    /// I2C targets present on the socket's bus
    #[serde(default)]
    pub i2c_targets: Vec<I2cTargetConfig>,
}

/// A simulated I2C target.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct I2cTargetConfig {
    /// 7-bit address
    pub address: u8,

    /// Initial register contents starting at register 0; the rest read 0
    #[serde(default)]
    pub registers: Vec<u8>,
}

fn default_max_voltage() -> f64 {
    3.3
}

impl SocketConfig {
    pub fn new(number: u8, types: &str) -> Self {
        Self {
            number,
            name: None,
            types: types.to_string(),
            analog_max_voltage: default_max_voltage(),
            i2c_targets: Vec::new(),
        }
    }

    pub fn with_i2c_target(mut self, address: u8, registers: Vec<u8>) -> Self {
        self.i2c_targets.push(I2cTargetConfig { address, registers });
        self
    }

    pub fn socket_types(&self) -> Result<Vec<SocketType>> {
        SocketType::parse_label(&self.types)
    }

    fn validate(&self) -> Result<()> {
        let types = self.socket_types()?;

        if self.analog_max_voltage.is_nan() || self.analog_max_voltage <= 0.0 {
            return Err(Error::Config(format!(
                "socket {}: analog_max_voltage must be positive, got {}",
                self.number, self.analog_max_voltage
            )));
        }

        let mut addresses = HashSet::new();
        for target in &self.i2c_targets {
            if target.address > 0x7F {
                return Err(Error::Config(format!(
                    "socket {}: I2C address 0x{:02x} does not fit in 7 bits",
                    self.number, target.address
                )));
            }
            if !addresses.insert(target.address) {
                return Err(Error::Config(format!(
                    "socket {}: duplicate I2C target 0x{:02x}",
                    self.number, target.address
                )));
            }
            if target.registers.len() > 256 {
                return Err(Error::Config(format!(
                    "socket {}: I2C target 0x{:02x} has more than 256 registers",
                    self.number, target.address
                )));
            }
        }

        if !self.i2c_targets.is_empty() && !types.contains(&SocketType::I) {
            warn!(
                "Socket {} lists I2C targets but is not type I; they will be unreachable.",
                self.number
            );
        }

        Ok(())
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "simulated".to_string(),
            sockets: vec![
                SocketConfig::new(1, "Y"),
                SocketConfig::new(2, "XA"),
                SocketConfig::new(3, "XI")
                    .with_i2c_target(0x4C, vec![0x1A, 0x00, 0x00, 0x00]),
                SocketConfig::new(4, "XP"),
                SocketConfig::new(5, "O"),
                SocketConfig::new(6, "SU"),
                SocketConfig::new(7, "KC"),
            ],
        }
    }
}

impl BoardConfig {
    /// Load the file named by `SOCKETBOARD_CONFIG`, or the built-in layout.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from(&PathBuf::from(path)),
            None => {
                debug!("{CONFIG_ENV} not set, using built-in board description.");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!(
            "Loaded board description {:?} from {}.",
            config.name,
            path.display()
        );
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: BoardConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut numbers = HashSet::new();
        for socket in &self.sockets {
            if !numbers.insert(socket.number) {
                return Err(Error::Config(format!(
                    "socket number {} appears twice",
                    socket.number
                )));
            }
            socket.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "name": "bench",
        "sockets": [
            { "number": 1, "types": "YI",
              "i2c_targets": [ { "address": 64, "registers": [1, 2, 3] } ] },
            { "number": 2, "name": "analog", "types": "A", "analog_max_voltage": 5.0 }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = BoardConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.name, "bench");
        assert_eq!(config.sockets.len(), 2);

        let first = &config.sockets[0];
        assert_eq!(first.analog_max_voltage, 3.3);
        assert_eq!(first.i2c_targets[0].address, 0x40);
        assert_eq!(
            first.socket_types().unwrap(),
            vec![SocketType::Y, SocketType::I]
        );

        let second = &config.sockets[1];
        assert_eq!(second.name.as_deref(), Some("analog"));
        assert_eq!(second.analog_max_voltage, 5.0);
    }

    #[test]
    fn test_default_is_valid() {
        BoardConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_duplicate_socket() {
        let mut config = BoardConfig::default();
        config.sockets.push(SocketConfig::new(1, "X"));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_bad_letters_and_addresses() {
        let bad_type = r#"{ "name": "b", "sockets": [ { "number": 1, "types": "Q" } ] }"#;
        assert!(matches!(BoardConfig::from_json(bad_type), Err(Error::Config(_))));

        let bad_addr = SocketConfig::new(1, "I").with_i2c_target(0x80, vec![]);
        assert!(bad_addr.validate().is_err());

        let dup_addr = SocketConfig::new(1, "I")
            .with_i2c_target(0x10, vec![])
            .with_i2c_target(0x10, vec![]);
        assert!(dup_addr.validate().is_err());

        let mut no_ref = SocketConfig::new(1, "A");
        no_ref.analog_max_voltage = 0.0;
        assert!(no_ref.validate().is_err());
        no_ref.analog_max_voltage = f64::NAN;
        assert!(no_ref.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(BoardConfig::from_json("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir()
            .join(format!("socketboard-{}.json", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        drop(file);

        let config = BoardConfig::load_from(&path).unwrap();
        assert_eq!(config.sockets.len(), 2);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(BoardConfig::load_from(&path), Err(Error::Io(_))));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = BoardConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(BoardConfig::from_json(&text).unwrap(), config);
    }
}
