// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use config::{Config as ConfigFile, File, Environment};

/// Central configuration for the kiosk server and the coin bridge
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_addr: String,

    pub queue: QueueConfig,
    pub device: DeviceConfig,
    pub ledger: LedgerConfig,
    pub recorder: RecorderConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Inactivity budget of the active session
    pub active_timeout_secs: u64,
    /// Maximum time a session may sit in the waiting line
    pub max_wait_secs: u64,
    pub max_queue_size: usize,
    pub sweep_interval_secs: u64,
    /// Per-session figure used for waiting estimates
    pub estimated_session_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Operator-supplied serial port, takes priority over auto-discovery
    pub port: Option<String>,
    pub baud_rate: u32,
    pub startup_delay_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub reset_low_ms: u64,
    pub boot_wait_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub claim_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// JSON-lines file for coin and transaction records; log-only when unset
    pub path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8080".to_string(),
            queue: QueueConfig::default(),
            device: DeviceConfig::default(),
            ledger: LedgerConfig::default(),
            recorder: RecorderConfig::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            active_timeout_secs: 90,
            max_wait_secs: 600,
            max_queue_size: 10,
            sweep_interval_secs: 30,
            estimated_session_secs: 120,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
            startup_delay_ms: 5000,
            reconnect_delay_ms: 8000,
            max_reconnect_attempts: 5,
            reset_low_ms: 500,
            boot_wait_ms: 3000,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            claim_ttl_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl DeviceConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn reset_low(&self) -> Duration {
        Duration::from_millis(self.reset_low_ms)
    }

    pub fn boot_wait(&self) -> Duration {
        Duration::from_millis(self.boot_wait_ms)
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // APP__DEVICE__PORT=/dev/ttyUSB0 and friends
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let mut config = Self::default();

                if let Ok(addr) = env::var("KIOSK_ADDR") {
                    config.server_addr = addr;
                }

                config.device.port = env::var("COIN_PORT").ok().filter(|p| !p.is_empty());
                config.device.baud_rate = env_parse("COIN_BAUD_RATE")
                    .unwrap_or(config.device.baud_rate);
                config.queue.active_timeout_secs = env_parse("ACTIVE_TIMEOUT_SECS")
                    .unwrap_or(config.queue.active_timeout_secs);
                config.queue.max_queue_size = env_parse("MAX_QUEUE_SIZE")
                    .unwrap_or(config.queue.max_queue_size);
                config.recorder.path = env::var("RECORDER_PATH").ok();

                config
            }
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_kiosk_policy() {
        let config = Config::default();
        assert_eq!(config.queue.active_timeout_secs, 90);
        assert_eq!(config.queue.max_wait_secs, 600);
        assert_eq!(config.queue.max_queue_size, 10);
        assert_eq!(config.device.baud_rate, 9600);
        assert_eq!(config.device.max_reconnect_attempts, 5);
        assert_eq!(config.device.reconnect_delay(), Duration::from_secs(8));
        assert_eq!(config.device.startup_delay(), Duration::from_secs(5));
        assert_eq!(config.ledger.claim_ttl_secs, 300);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config: Config = ConfigFile::builder()
            .set_override("device.port", "/dev/ttyACM0")
            .and_then(|b| b.set_override("queue.max_queue_size", 3))
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .expect("config should deserialize");

        assert_eq!(config.device.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.device.boot_wait_ms, 3000);
        assert_eq!(config.queue.max_queue_size, 3);
        assert_eq!(config.queue.active_timeout_secs, 90);
    }
}
