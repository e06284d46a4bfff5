// common/src/models/coin.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hardware-reported coin, as retained for inspection by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinEvent {
    pub value: u32,
    pub coin_type: String,
    /// Milliseconds since the epoch on the wire; clients echo it back when claiming
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl CoinEvent {
    pub fn key(&self) -> CoinKey {
        CoinKey::new(self.timestamp.timestamp_millis(), self.value)
    }
}

/// Identity of a coin event: (timestamp in ms, value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoinKey {
    pub timestamp: i64,
    pub value: u32,
}

impl CoinKey {
    pub fn new(timestamp: i64, value: u32) -> Self {
        Self { timestamp, value }
    }
}

/// A coin event bound to the session that is allowed to spend it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedCoin {
    pub session_id: String,
    pub claimed_at: DateTime<Utc>,
}
