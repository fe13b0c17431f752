//! Smart meter (DSMR / P1 port) telegram reader
//!
//! Reads telegrams from the meter's serial port, verifies their CRC, decodes
//! them into typed readings and publishes the latest one over MQTT.

pub mod config;
pub mod dsmr;
pub mod mqtt;
pub mod snapshot;

// Re-export common types for easier access
pub use config::{Config, ConfigError};
pub use dsmr::{DsmrError, DsmrManager, Frame, Object, Reader, Timestamp, Value};
pub use mqtt::{MeteringData, MqttManager, Transmission};
pub use snapshot::LatestFrame;
