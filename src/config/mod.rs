use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_yml;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const CONFIG_ENV: &str = "DSMR2MQTT_CONFIG";
const CONFIG_PATHS: [&str; 2] = ["config/dsmr2mqtt.yaml", "dsmr2mqtt.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config {0}: {1}")]
    Io(String, std::io::Error),
    #[error("Unable to parse config: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error("No config found, tried {0}")]
    NotFound(String),
}

fn serial_baud_rate_default() -> u32 { 115200 }
fn serial_read_timeout_default() -> u64 { 1000 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SerialConfig {
    pub device: String,
    #[serde(default="serial_baud_rate_default")]
    pub baud_rate: u32,
    #[serde(default="serial_read_timeout_default")]
    pub read_timeout_ms: u64,
}

fn mqtt_port_default() -> u16 { 1883 }
fn mqtt_client_name_default() -> String { "dsmr2mqtt".to_string() }
fn mqtt_base_topic_default() -> String { "dsmr2mqtt".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default="mqtt_port_default")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
    #[serde(default="mqtt_base_topic_default")]
    pub base_topic: String,
}

fn publish_interval_default() -> u64 { 10 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PublishConfig {
    #[serde(default="publish_interval_default")]
    pub interval: u64,
    #[serde(default)]
    pub include_raw: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        PublishConfig { interval: publish_interval_default(), include_raw: false }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    pub serial: SerialConfig,
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        let config: Config = serde_yml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
        debug!("Read config from {}", path.display());
        contents.parse()
    }

    /// Loads the config from `$DSMR2MQTT_CONFIG`, `config/dsmr2mqtt.yaml` or
    /// `dsmr2mqtt.yaml`, whichever is found first.
    pub fn load() -> Result<Self, ConfigError> {
        let candidates: Vec<PathBuf> = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .into_iter()
            .chain(CONFIG_PATHS.iter().map(PathBuf::from))
            .collect();

        for path in &candidates {
            if path.is_file() {
                info!("Using config {}", path.display());
                return Self::load_from(path);
            }
        }

        let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(ConfigError::NotFound(tried.join(", ")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.device.is_empty() {
            return Err(ConfigError::Invalid("serial.device must not be empty".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("serial.baud_rate must be greater than zero".to_string()));
        }
        if self.mqtt.host.is_empty() {
            return Err(ConfigError::Invalid("mqtt.host must not be empty".to_string()));
        }
        if self.publish.interval == 0 {
            return Err(ConfigError::Invalid("publish.interval must be greater than zero".to_string()));
        }
        Ok(())
    }
}
