// kiosk-server/src/admission.rs
//! Single-slot admission queue.
//!
//! At most one session is `ACTIVE` (allowed to pay) at any time; everyone else
//! waits in strict arrival order. Clocks are passed in so the state machine can
//! be driven deterministically.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use common::models::session::{FileInfo, QueueEntry, QueueInfo, QueueStatus, Session};
use common::QueueConfig;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue is full ({capacity} sessions waiting)")]
    QueueFull { capacity: usize },
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub active_timeout: Duration,
    pub max_wait: Duration,
    pub max_queue_size: usize,
    pub estimated_session: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for QueueSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            active_timeout: Duration::seconds(config.active_timeout_secs as i64),
            max_wait: Duration::seconds(config.max_wait_secs as i64),
            max_queue_size: config.max_queue_size,
            estimated_session: Duration::seconds(config.estimated_session_secs as i64),
        }
    }
}

/// Result of re-checking the active session's inactivity timer
#[derive(Debug, Clone)]
pub enum TimeoutCheck {
    /// The session the timer was armed for is no longer active
    Stale,
    /// Still within budget; re-arm for the remaining time
    Pending(Duration),
    /// Removed for inactivity
    Expired(Session),
}

#[derive(Debug, Default)]
pub struct AdmissionQueue {
    settings: QueueSettings,
    sessions: HashMap<String, Session>,
    waiting: VecDeque<String>,
    active: Option<String>,
}

impl AdmissionQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            settings,
            sessions: HashMap::new(),
            waiting: VecDeque::new(),
            active: None,
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active.as_ref().and_then(|id| self.sessions.get(id))
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn join(&mut self, session_id: &str, file_info: FileInfo, now: DateTime<Utc>) -> Result<QueueStatus, QueueError> {
        if self.sessions.contains_key(session_id) {
            return Ok(self.status(session_id, now));
        }

        if self.active.is_some() && self.waiting.len() >= self.settings.max_queue_size {
            return Err(QueueError::QueueFull {
                capacity: self.settings.max_queue_size,
            });
        }

        let session = Session::new_waiting(session_id.to_string(), file_info, now);
        self.sessions.insert(session_id.to_string(), session);
        self.waiting.push_back(session_id.to_string());
        tracing::info!("Session {} joined the queue", session_id);

        self.process_queue(now);
        Ok(self.status(session_id, now))
    }

    pub fn status(&self, session_id: &str, now: DateTime<Utc>) -> QueueStatus {
        if self.active.as_deref() == Some(session_id) {
            let remaining = self
                .sessions
                .get(session_id)
                .map(|s| self.settings.active_timeout - s.idle_for(now))
                .unwrap_or_else(Duration::zero);

            return QueueStatus::Active {
                position: 0,
                can_proceed: true,
                time_remaining: remaining.num_seconds().max(0),
            };
        }

        match self.waiting.iter().position(|id| id == session_id) {
            Some(index) => {
                let position = index + 1;
                QueueStatus::Waiting {
                    position,
                    can_proceed: false,
                    estimated_wait: self.estimated_wait(position, now),
                }
            },
            None => QueueStatus::NotFound,
        }
    }

    // Whatever is left of the active session plus a flat figure per session ahead
    fn estimated_wait(&self, position: usize, now: DateTime<Utc>) -> i64 {
        let active_left = self
            .active_session()
            .map(|s| (self.settings.active_timeout - s.idle_for(now)).num_seconds().max(0))
            .unwrap_or(0);
        active_left + self.settings.estimated_session.num_seconds() * (position as i64 - 1)
    }

    /// Refresh the inactivity clock of the active session; no-op for anyone else
    pub fn heartbeat(&mut self, session_id: &str, now: DateTime<Utc>) -> QueueStatus {
        if self.active.as_deref() == Some(session_id) {
            if let Some(session) = self.sessions.get_mut(session_id) {
                session.touch(now);
            }
        }
        self.status(session_id, now)
    }

    /// Finish the active session and hand the slot to the next in line
    pub fn complete(&mut self, session_id: &str, now: DateTime<Utc>) -> Option<Session> {
        if self.active.as_deref() != Some(session_id) {
            tracing::warn!("Ignoring completion for non-active session {}", session_id);
            return None;
        }
        let session = self.remove(session_id);
        tracing::info!("Session {} completed", session_id);
        self.process_queue(now);
        session
    }

    /// Remove a session wherever it is
    pub fn leave(&mut self, session_id: &str, now: DateTime<Utc>) -> Option<Session> {
        let session = self.remove(session_id)?;
        tracing::info!("Session {} left the queue", session_id);
        self.process_queue(now);
        Some(session)
    }

    pub fn can_proceed_to_payment(&self, session_id: &str) -> bool {
        self.active.as_deref() == Some(session_id)
    }

    /// Re-check the inactivity timer armed for `session_id`
    pub fn check_active_timeout(&mut self, session_id: &str, now: DateTime<Utc>) -> TimeoutCheck {
        if self.active.as_deref() != Some(session_id) {
            return TimeoutCheck::Stale;
        }
        let idle = match self.sessions.get(session_id) {
            Some(session) => session.idle_for(now),
            None => return TimeoutCheck::Stale,
        };

        if idle < self.settings.active_timeout {
            return TimeoutCheck::Pending(self.settings.active_timeout - idle);
        }

        tracing::warn!("Session {} timed out after {}s idle", session_id, idle.num_seconds());
        match self.remove(session_id) {
            Some(session) => {
                self.process_queue(now);
                TimeoutCheck::Expired(session)
            },
            None => TimeoutCheck::Stale,
        }
    }

    /// Drop waiting sessions past the maximum wait, then fill a free slot.
    /// Returns the expired sessions.
    pub fn process_queue(&mut self, now: DateTime<Utc>) -> Vec<Session> {
        let expired = self.sweep_waiting(now);

        if self.active.is_none() {
            if let Some(next) = self.waiting.pop_front() {
                if let Some(session) = self.sessions.get_mut(&next) {
                    session.activate(now);
                    tracing::info!("Session {} is now active", next);
                }
                self.active = Some(next);
            }
        }

        expired
    }

    fn sweep_waiting(&mut self, now: DateTime<Utc>) -> Vec<Session> {
        let max_wait = self.settings.max_wait;
        let stale: Vec<String> = self
            .waiting
            .iter()
            .filter(|id| {
                self.sessions
                    .get(id.as_str())
                    .map(|s| s.has_waited_longer_than(max_wait, now))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        let mut expired = Vec::with_capacity(stale.len());
        for id in stale {
            if let Some(session) = self.remove(&id) {
                tracing::info!("Session {} expired while waiting", id);
                expired.push(session);
            }
        }
        expired
    }

    fn remove(&mut self, session_id: &str) -> Option<Session> {
        if self.active.as_deref() == Some(session_id) {
            self.active = None;
        }
        self.waiting.retain(|id| id != session_id);
        self.sessions.remove(session_id)
    }

    pub fn info(&self) -> QueueInfo {
        QueueInfo {
            active_session: self.active.clone(),
            queue_length: self.waiting.len(),
            total_sessions: self.sessions.len(),
            queue: self
                .waiting
                .iter()
                .enumerate()
                .map(|(index, id)| QueueEntry {
                    session_id: id.clone(),
                    position: index + 1,
                    file_info: self
                        .sessions
                        .get(id)
                        .map(|s| s.file_info.clone())
                        .unwrap_or_default(),
                })
                .collect(),
        }
    }

    #[cfg(test)]
    fn assert_invariants(&self) {
        use common::models::session::SessionStatus;

        let active_count = self
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .count();
        assert!(active_count <= 1, "more than one active session");
        assert_eq!(active_count, usize::from(self.active.is_some()));

        if let Some(active) = &self.active {
            assert!(!self.waiting.contains(active), "active session is also waiting");
        }
        let mut seen = std::collections::HashSet::new();
        for id in &self.waiting {
            assert!(seen.insert(id), "duplicate waiting entry {}", id);
        }
        assert_eq!(self.sessions.len(), self.waiting.len() + usize::from(self.active.is_some()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str, pages: u32) -> FileInfo {
        FileInfo {
            file_name: Some(name.to_string()),
            page_count: Some(pages),
        }
    }

    fn queue() -> AdmissionQueue {
        AdmissionQueue::new(QueueSettings::default())
    }

    #[test]
    fn first_join_is_active_second_waits_then_promoted() {
        let mut q = queue();
        let now = Utc::now();

        let s1 = q.join("s1", pdf("a.pdf", 3), now).unwrap();
        assert_eq!(
            s1,
            QueueStatus::Active {
                position: 0,
                can_proceed: true,
                time_remaining: 90
            }
        );

        let s2 = q.join("s2", pdf("b.pdf", 1), now).unwrap();
        assert!(matches!(s2, QueueStatus::Waiting { position: 1, can_proceed: false, .. }));

        assert!(q.complete("s1", now).is_some());
        assert!(matches!(q.status("s2", now), QueueStatus::Active { position: 0, .. }));
        assert_eq!(q.status("s1", now), QueueStatus::NotFound);
        q.assert_invariants();
    }

    #[test]
    fn rejoin_is_idempotent() {
        let mut q = queue();
        let now = Utc::now();
        q.join("s1", FileInfo::default(), now).unwrap();

        let first = q.join("s2", FileInfo::default(), now).unwrap();
        let second = q.join("s2", FileInfo::default(), now).unwrap();
        assert_eq!(first, second);
        assert_eq!(q.info().total_sessions, 2);
        q.assert_invariants();
    }

    #[test]
    fn capacity_applies_only_with_an_active_session() {
        let mut q = queue();
        let now = Utc::now();

        q.join("active", FileInfo::default(), now).unwrap();
        for i in 0..10 {
            q.join(&format!("w{}", i), FileInfo::default(), now).unwrap();
        }
        assert_eq!(
            q.join("w10", FileInfo::default(), now),
            Err(QueueError::QueueFull { capacity: 10 })
        );
        assert_eq!(q.status("w10", now), QueueStatus::NotFound);

        // Fresh queue never rejects
        let mut empty = queue();
        assert!(empty.join("x", FileInfo::default(), now).is_ok());
        q.assert_invariants();
    }

    #[test]
    fn promotion_is_fifo() {
        let mut q = queue();
        let now = Utc::now();
        for id in ["a", "b", "c", "d"] {
            q.join(id, FileInfo::default(), now).unwrap();
        }

        let mut order = Vec::new();
        while let Some(active) = q.active_session_id().map(str::to_string) {
            order.push(active.clone());
            q.complete(&active, now);
            q.assert_invariants();
        }
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn leaving_waiting_session_keeps_order() {
        let mut q = queue();
        let now = Utc::now();
        for id in ["a", "b", "c"] {
            q.join(id, FileInfo::default(), now).unwrap();
        }

        assert!(q.leave("b", now).is_some());
        assert!(matches!(q.status("c", now), QueueStatus::Waiting { position: 1, .. }));
        assert!(q.leave("b", now).is_none());

        assert!(q.leave("a", now).is_some());
        assert!(q.can_proceed_to_payment("c"));
        q.assert_invariants();
    }

    #[test]
    fn complete_ignores_waiting_sessions() {
        let mut q = queue();
        let now = Utc::now();
        q.join("a", FileInfo::default(), now).unwrap();
        q.join("b", FileInfo::default(), now).unwrap();

        assert!(q.complete("b", now).is_none());
        assert!(q.can_proceed_to_payment("a"));
        assert!(!q.can_proceed_to_payment("b"));
        assert!(!q.can_proceed_to_payment("nobody"));
    }

    #[test]
    fn inactive_session_times_out_and_next_is_promoted() {
        let mut q = queue();
        let start = Utc::now();
        q.join("a", FileInfo::default(), start).unwrap();
        q.join("b", FileInfo::default(), start).unwrap();

        let check = q.check_active_timeout("a", start + Duration::seconds(30));
        assert!(matches!(check, TimeoutCheck::Pending(d) if d == Duration::seconds(60)));

        let check = q.check_active_timeout("a", start + Duration::seconds(90));
        assert!(matches!(check, TimeoutCheck::Expired(ref s) if s.id == "a"));
        assert_eq!(q.active_session_id(), Some("b"));
        q.assert_invariants();

        // Timer armed for "a" is now stale
        assert!(matches!(q.check_active_timeout("a", start + Duration::seconds(200)), TimeoutCheck::Stale));
    }

    #[test]
    fn heartbeat_pushes_back_the_timeout() {
        let mut q = queue();
        let start = Utc::now();
        q.join("a", FileInfo::default(), start).unwrap();

        let status = q.heartbeat("a", start + Duration::seconds(80));
        assert!(matches!(status, QueueStatus::Active { time_remaining: 90, .. }));

        let check = q.check_active_timeout("a", start + Duration::seconds(90));
        assert!(matches!(check, TimeoutCheck::Pending(d) if d == Duration::seconds(80)));

        // Heartbeat from a waiting or unknown session changes nothing
        assert_eq!(q.heartbeat("ghost", start), QueueStatus::NotFound);
    }

    #[test]
    fn stale_waiting_sessions_are_swept() {
        let mut q = queue();
        let start = Utc::now();
        q.join("a", FileInfo::default(), start).unwrap();
        q.join("b", FileInfo::default(), start).unwrap();
        q.join("c", FileInfo::default(), start + Duration::minutes(5)).unwrap();

        let expired = q.process_queue(start + Duration::minutes(11));
        let ids: Vec<_> = expired.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(q.active_session_id(), Some("a"));
        assert!(matches!(q.status("c", start), QueueStatus::Waiting { position: 1, .. }));
        q.assert_invariants();
    }

    #[test]
    fn waiting_estimate_grows_with_position() {
        let mut q = queue();
        let now = Utc::now();
        for id in ["a", "b", "c"] {
            q.join(id, FileInfo::default(), now).unwrap();
        }

        let b = match q.status("b", now) {
            QueueStatus::Waiting { estimated_wait, .. } => estimated_wait,
            other => panic!("unexpected status {:?}", other),
        };
        let c = match q.status("c", now) {
            QueueStatus::Waiting { estimated_wait, .. } => estimated_wait,
            other => panic!("unexpected status {:?}", other),
        };
        assert_eq!(b, 90);
        assert_eq!(c, 90 + 120);
    }

    #[test]
    fn info_lists_waiting_line() {
        let mut q = queue();
        let now = Utc::now();
        q.join("a", pdf("a.pdf", 3), now).unwrap();
        q.join("b", pdf("b.pdf", 2), now).unwrap();

        let info = q.info();
        assert_eq!(info.active_session.as_deref(), Some("a"));
        assert_eq!(info.queue_length, 1);
        assert_eq!(info.total_sessions, 2);
        assert_eq!(info.queue[0].session_id, "b");
        assert_eq!(info.queue[0].position, 1);
        assert_eq!(info.queue[0].file_info.page_count, Some(2));
    }
}
