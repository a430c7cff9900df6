//! Configuration loading and validation.
//!
//! Settings come from three layers, later layers winning: built-in
//! defaults, a TOML file, then `ROUTEWATCH_*` environment variables.
//! CLI flags override individual fields after loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Device;
use crate::parsers::Platform;

/// Default config filename probed in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "routewatch.toml";

/// One device in the inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub hostname: String,
    pub address: String,
    /// Platform tag, validated against the supported parser set
    pub platform: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl DeviceConfig {
    pub fn to_device(&self) -> Device {
        let mut device = Device::new(&self.hostname, &self.address, &self.platform);
        device.location = self.location.clone();
        device
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between scheduled collection cycles
    pub collection_interval: u64,
    /// Concurrent device collection ceiling
    pub max_workers: usize,
    /// Changed fraction of the table above which change records are kept
    pub change_threshold: f64,
    pub enable_change_detection: bool,
    /// Fetch per-VRF BGP tables to enrich BGP routes with path detail
    pub bgp_detail: bool,
    /// Days of runs and change history to keep
    pub retention_days: i64,
    /// Directory holding captured command output, one subdir per device
    pub capture_dir: PathBuf,
    /// Store snapshot file; in-memory only when unset
    pub store_path: Option<PathBuf>,
    pub devices: Vec<DeviceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collection_interval: 3600,
            max_workers: 10,
            change_threshold: 0.1,
            enable_change_detection: true,
            bgp_detail: true,
            retention_days: 30,
            capture_dir: PathBuf::from("captures"),
            store_path: Some(PathBuf::from("routewatch.json")),
            devices: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration. An explicit path must exist; otherwise the
    /// default file is probed and silently skipped when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::ConfigFileNotFound(path.to_path_buf()));
                }
                Self::from_file(path)?
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    debug!("no config file found, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config file");
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Applies `ROUTEWATCH_*` environment overrides for scalar settings.
    fn apply_env(&mut self) {
        if let Some(value) = env_parse::<u64>("ROUTEWATCH_COLLECTION_INTERVAL") {
            self.collection_interval = value;
        }
        if let Some(value) = env_parse::<usize>("ROUTEWATCH_MAX_WORKERS") {
            self.max_workers = value;
        }
        if let Some(value) = env_parse::<f64>("ROUTEWATCH_CHANGE_THRESHOLD") {
            self.change_threshold = value;
        }
        if let Some(value) = env_parse::<bool>("ROUTEWATCH_ENABLE_CHANGE_DETECTION") {
            self.enable_change_detection = value;
        }
        if let Some(value) = env_parse::<i64>("ROUTEWATCH_RETENTION_DAYS") {
            self.retention_days = value;
        }
        if let Ok(value) = std::env::var("ROUTEWATCH_CAPTURE_DIR") {
            self.capture_dir = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("ROUTEWATCH_STORE_PATH") {
            self.store_path = Some(PathBuf::from(value));
        }
    }

    fn validate(&self) -> Result<()> {
        if self.collection_interval == 0 {
            return Err(Error::Config(
                "collection_interval must be at least 1 second".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.change_threshold) {
            return Err(Error::Config(format!(
                "change_threshold must be between 0.0 and 1.0, got {}",
                self.change_threshold
            )));
        }
        if self.retention_days < 1 {
            return Err(Error::Config(
                "retention_days must be at least 1".to_string(),
            ));
        }
        for device in &self.devices {
            Platform::for_device(&device.hostname, &device.platform)?;
        }
        Ok(())
    }

    /// The inventory as store-ready device rows.
    pub fn devices(&self) -> Vec<Device> {
        self.devices.iter().map(DeviceConfig::to_device).collect()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}
