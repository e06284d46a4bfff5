// common/src/models/session.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Informational metadata about the document a visitor wants to print
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Waiting,
    Active,
}

/// One kiosk visitor's print attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Client-supplied identifier
    pub id: String,
    pub file_info: FileInfo,
    pub status: SessionStatus,
    pub joined_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a new waiting session
    pub fn new_waiting(id: String, file_info: FileInfo, now: DateTime<Utc>) -> Self {
        Self {
            id,
            file_info,
            status: SessionStatus::Waiting,
            joined_at: now,
            activated_at: None,
            last_activity: None,
        }
    }

    /// Promote to the active slot
    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.status = SessionStatus::Active;
        self.activated_at = Some(now);
        self.last_activity = Some(now);
    }

    /// Update session activity timestamp
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = Some(now);
    }

    /// Time since the last heartbeat (or activation) of an active session
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        let since = self.last_activity.unwrap_or(self.joined_at);
        now.signed_duration_since(since)
    }

    /// Check whether a waiting session has outlived the maximum wait
    pub fn has_waited_longer_than(&self, max_wait: Duration, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Waiting && now.signed_duration_since(self.joined_at) > max_wait
    }
}

/// Position of a session in the admission queue, as reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    #[serde(rename_all = "camelCase")]
    Active {
        position: usize,
        can_proceed: bool,
        /// Seconds left before the inactivity timeout
        time_remaining: i64,
    },
    #[serde(rename_all = "camelCase")]
    Waiting {
        /// 1-based position in the waiting line
        position: usize,
        can_proceed: bool,
        /// Rough estimate in seconds
        estimated_wait: i64,
    },
    NotFound,
}

impl QueueStatus {
    pub fn can_proceed(&self) -> bool {
        matches!(self, QueueStatus::Active { can_proceed: true, .. })
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, QueueStatus::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub session_id: String,
    pub position: usize,
    pub file_info: FileInfo,
}

/// Observability snapshot of the admission queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueInfo {
    pub active_session: Option<String>,
    pub queue_length: usize,
    pub total_sessions: usize,
    pub queue: Vec<QueueEntry>,
}
