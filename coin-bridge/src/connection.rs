// coin-bridge/src/connection.rs
use serde::{Deserialize, Serialize};
use std::time::Duration;

use common::DeviceConfig;

/// Connection lifecycle of the device link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkState {
    Disconnected,
    Connecting,
    /// Port is open, control lines are being pulsed while the board reboots
    OpenPendingReset,
    Ready,
    /// Reconnect attempts exhausted, waits for an explicit reset
    Failed,
}

/// Timing and retry knobs of the bridge
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub port: Option<String>,
    pub startup_delay: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub reset_low: Duration,
    pub boot_wait: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self::from(&DeviceConfig::default())
    }
}

impl From<&DeviceConfig> for BridgeSettings {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            port: config.port.clone(),
            startup_delay: config.startup_delay(),
            reconnect_delay: config.reconnect_delay(),
            max_reconnect_attempts: config.max_reconnect_attempts,
            reset_low: config.reset_low(),
            boot_wait: config.boot_wait(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry(Duration),
    GiveUp,
}

/// Counts failed connection attempts since the last time the link was ready
#[derive(Debug, Clone)]
pub struct ReconnectTracker {
    attempts: u32,
    max_attempts: u32,
    delay: Duration,
}

impl ReconnectTracker {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Record a failed attempt or a lost link and decide what to do next
    pub fn record_failure(&mut self) -> ReconnectDecision {
        self.attempts = self.attempts.saturating_add(1);
        if self.exhausted() {
            ReconnectDecision::GiveUp
        } else {
            ReconnectDecision::Retry(self.delay)
        }
    }

    pub fn record_ready(&mut self) {
        self.attempts = 0;
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

/// Public view of the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub connected: bool,
    pub address: Option<String>,
    pub reconnect_attempts: u32,
    pub state: LinkState,
    pub failed: bool,
    pub handshake_acknowledged: bool,
}
