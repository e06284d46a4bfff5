// kiosk-server/src/actors/queue_manager.rs
use std::sync::Arc;
use std::time::Duration;

use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult, SpawnHandle};
use chrono::Utc;
use common::models::session::{FileInfo, QueueInfo, QueueStatus, Session};

use crate::admission::{AdmissionQueue, QueueError, QueueSettings, TimeoutCheck};
use crate::recorder::{TransactionOutcome, TransactionRecord, TransactionRecorder};

/// Actor message: join the queue (idempotent per session id)
#[derive(Message)]
#[rtype(result = "Result<QueueStatus, QueueError>")]
pub struct JoinQueue {
    pub session_id: String,
    pub file_info: FileInfo,
}

#[derive(Message)]
#[rtype(result = "QueueStatus")]
pub struct GetQueueStatus {
    pub session_id: String,
}

/// Actor message: keep the active session alive
#[derive(Message)]
#[rtype(result = "QueueStatus")]
pub struct Heartbeat {
    pub session_id: String,
}

/// Actor message: remove a session, active or waiting
#[derive(Message)]
#[rtype(result = "bool")]
pub struct LeaveQueue {
    pub session_id: String,
}

/// Actor message: the active session has paid and printed
#[derive(Message)]
#[rtype(result = "bool")]
pub struct CompleteSession {
    pub session_id: String,
}

#[derive(Message)]
#[rtype(result = "bool")]
pub struct CanProceedToPayment {
    pub session_id: String,
}

#[derive(Message)]
#[rtype(result = "QueueInfo")]
pub struct GetQueueInfo;

/// Owns the admission queue and drives its timers
pub struct QueueManagerActor {
    queue: AdmissionQueue,
    recorder: Arc<dyn TransactionRecorder>,
    sweep_interval: Duration,
    active_timer: Option<SpawnHandle>,
}

impl QueueManagerActor {
    pub fn new(settings: QueueSettings, recorder: Arc<dyn TransactionRecorder>) -> Self {
        Self {
            queue: AdmissionQueue::new(settings),
            recorder,
            sweep_interval: Duration::from_secs(30),
            active_timer: None,
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    fn active_id(&self) -> Option<String> {
        self.queue.active_session_id().map(str::to_string)
    }

    // Re-arm the inactivity timer whenever the occupant of the slot changes
    fn after_change(&mut self, before: Option<String>, ctx: &mut Context<Self>) {
        let current = self.active_id();
        if current == before {
            return;
        }
        if let Some(handle) = self.active_timer.take() {
            ctx.cancel_future(handle);
        }
        if let Some(session_id) = current {
            let timeout = self.queue.settings().active_timeout;
            self.arm_timeout(session_id, timeout, ctx);
        }
    }

    fn arm_timeout(&mut self, session_id: String, delay: chrono::Duration, ctx: &mut Context<Self>) {
        if let Some(handle) = self.active_timer.take() {
            ctx.cancel_future(handle);
        }
        let delay = delay.to_std().unwrap_or_default();
        let handle = ctx.run_later(delay, move |act, ctx| {
            act.active_timer = None;
            act.check_timeout(session_id, ctx);
        });
        self.active_timer = Some(handle);
    }

    fn check_timeout(&mut self, session_id: String, ctx: &mut Context<Self>) {
        let before = self.active_id();
        match self.queue.check_active_timeout(&session_id, Utc::now()) {
            TimeoutCheck::Stale => {},
            TimeoutCheck::Pending(remaining) => self.arm_timeout(session_id, remaining, ctx),
            TimeoutCheck::Expired(session) => {
                self.record(&session, TransactionOutcome::Abandoned);
                self.after_change(before, ctx);
            },
        }
    }

    fn record(&self, session: &Session, outcome: TransactionOutcome) {
        let record = TransactionRecord::new(session.id.clone(), session.file_info.clone(), outcome);
        if let Err(e) = self.recorder.record_transaction(&record) {
            tracing::error!("Failed to record transaction for {}: {}", session.id, e);
        }
    }
}

impl Actor for QueueManagerActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            "QueueManagerActor started (active timeout {}s, capacity {})",
            self.queue.settings().active_timeout.num_seconds(),
            self.queue.settings().max_queue_size
        );

        // Reclaim stale waiting sessions even when nobody is calling the queue
        ctx.run_interval(self.sweep_interval, |act, ctx| {
            let before = act.active_id();
            let expired = act.queue.process_queue(Utc::now());
            if !expired.is_empty() {
                tracing::info!("Expired {} waiting sessions", expired.len());
            }
            act.after_change(before, ctx);
        });
    }
}

impl Handler<JoinQueue> for QueueManagerActor {
    type Result = Result<QueueStatus, QueueError>;

    fn handle(&mut self, msg: JoinQueue, ctx: &mut Self::Context) -> Self::Result {
        let before = self.active_id();
        let result = self.queue.join(&msg.session_id, msg.file_info, Utc::now());
        if let Err(e) = &result {
            tracing::warn!("Session {} rejected: {}", msg.session_id, e);
        }
        self.after_change(before, ctx);
        result
    }
}

impl Handler<GetQueueStatus> for QueueManagerActor {
    type Result = MessageResult<GetQueueStatus>;

    fn handle(&mut self, msg: GetQueueStatus, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.queue.status(&msg.session_id, Utc::now()))
    }
}

impl Handler<Heartbeat> for QueueManagerActor {
    type Result = MessageResult<Heartbeat>;

    fn handle(&mut self, msg: Heartbeat, _ctx: &mut Self::Context) -> Self::Result {
        // The armed timer re-checks last activity when it fires
        MessageResult(self.queue.heartbeat(&msg.session_id, Utc::now()))
    }
}

impl Handler<LeaveQueue> for QueueManagerActor {
    type Result = bool;

    fn handle(&mut self, msg: LeaveQueue, ctx: &mut Self::Context) -> Self::Result {
        let before = self.active_id();
        let was_active = before.as_deref() == Some(msg.session_id.as_str());

        match self.queue.leave(&msg.session_id, Utc::now()) {
            Some(session) => {
                if was_active {
                    self.record(&session, TransactionOutcome::Abandoned);
                }
                self.after_change(before, ctx);
                true
            },
            None => false,
        }
    }
}

impl Handler<CompleteSession> for QueueManagerActor {
    type Result = bool;

    fn handle(&mut self, msg: CompleteSession, ctx: &mut Self::Context) -> Self::Result {
        let before = self.active_id();
        match self.queue.complete(&msg.session_id, Utc::now()) {
            Some(session) => {
                self.record(&session, TransactionOutcome::Completed);
                self.after_change(before, ctx);
                true
            },
            None => false,
        }
    }
}

impl Handler<CanProceedToPayment> for QueueManagerActor {
    type Result = bool;

    fn handle(&mut self, msg: CanProceedToPayment, _ctx: &mut Self::Context) -> Self::Result {
        self.queue.can_proceed_to_payment(&msg.session_id)
    }
}

impl Handler<GetQueueInfo> for QueueManagerActor {
    type Result = MessageResult<GetQueueInfo>;

    fn handle(&mut self, _msg: GetQueueInfo, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.queue.info())
    }
}
