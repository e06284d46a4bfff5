// kiosk-server/src/recorder.rs
//! Persistence collaborator for coins and transactions.
//!
//! Recording is fire-and-forget: callers log a failure and move on, queue and
//! ledger state never depend on it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use common::models::session::FileInfo;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("failed to write record: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionOutcome {
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Uuid,
    pub session_id: String,
    pub file_info: FileInfo,
    pub outcome: TransactionOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(session_id: String, file_info: FileInfo, outcome: TransactionOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            file_info,
            outcome,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinRecord {
    pub value: u32,
    pub coin_type: String,
    pub session_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

pub trait TransactionRecorder: Send + Sync {
    fn record_coin(&self, value: u32, coin_type: &str, session_id: Option<&str>) -> Result<(), RecorderError>;
    fn record_transaction(&self, record: &TransactionRecord) -> Result<(), RecorderError>;
}

/// Log-only recorder, used when no storage is configured
#[derive(Debug, Default)]
pub struct TracingRecorder;

impl TransactionRecorder for TracingRecorder {
    fn record_coin(&self, value: u32, coin_type: &str, session_id: Option<&str>) -> Result<(), RecorderError> {
        tracing::info!(
            value,
            coin_type,
            session_id = session_id.unwrap_or("-"),
            "coin recorded"
        );
        Ok(())
    }

    fn record_transaction(&self, record: &TransactionRecord) -> Result<(), RecorderError> {
        tracing::info!(
            session_id = %record.session_id,
            outcome = ?record.outcome,
            "transaction recorded"
        );
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Entry<'a> {
    Coin(&'a CoinRecord),
    Transaction(&'a TransactionRecord),
}

/// Appends one JSON object per line to a file
#[derive(Debug)]
pub struct JsonLinesRecorder {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn append(&self, entry: &Entry<'_>) -> Result<(), RecorderError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl TransactionRecorder for JsonLinesRecorder {
    fn record_coin(&self, value: u32, coin_type: &str, session_id: Option<&str>) -> Result<(), RecorderError> {
        let record = CoinRecord {
            value,
            coin_type: coin_type.to_string(),
            session_id: session_id.map(str::to_string),
            recorded_at: Utc::now(),
        };
        self.append(&Entry::Coin(&record))
    }

    fn record_transaction(&self, record: &TransactionRecord) -> Result<(), RecorderError> {
        self.append(&Entry::Transaction(record))
    }
}
