// kiosk-server/src/lib.rs
//! Admission control and coin reconciliation for a single shared kiosk printer.

pub mod actors;
pub mod admission;
pub mod api;
pub mod claims;
pub mod payment_gate;
pub mod recorder;

use std::sync::Arc;
use std::time::Duration;

use actix::{Actor, Addr};
use actix_web::web;
use coin_bridge::{DeviceBridge, Subscribe};
use common::{Config, RecorderConfig};

use crate::actors::coin_ledger::CoinLedgerActor;
use crate::actors::queue_manager::QueueManagerActor;
use crate::admission::QueueSettings;
use crate::claims::ClaimLedger;
use crate::payment_gate::PaymentGate;
use crate::recorder::{JsonLinesRecorder, TracingRecorder, TransactionRecorder};

/// Running actors shared by every HTTP worker
#[derive(Clone)]
pub struct KioskServices {
    pub queue: Addr<QueueManagerActor>,
    pub ledger: Addr<CoinLedgerActor>,
    pub bridge: Addr<DeviceBridge>,
    pub gate: PaymentGate,
}

impl KioskServices {
    /// Start the queue and ledger actors and the given bridge, wiring coin events to the ledger
    pub fn start(config: &Config, bridge: DeviceBridge, recorder: Arc<dyn TransactionRecorder>) -> Self {
        let queue = QueueManagerActor::new(QueueSettings::from(&config.queue), recorder.clone())
            .with_sweep_interval(Duration::from_secs(config.queue.sweep_interval_secs))
            .start();

        let ledger = CoinLedgerActor::new(ClaimLedger::from(&config.ledger), recorder)
            .with_sweep_interval(Duration::from_secs(config.ledger.sweep_interval_secs))
            .start();

        let bridge = bridge.start();
        bridge.do_send(Subscribe(ledger.clone().recipient()));

        let gate = PaymentGate::new(queue.clone(), ledger.clone());
        Self { queue, ledger, bridge, gate }
    }

    /// Register shared state and the API routes
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.queue.clone()))
            .app_data(web::Data::new(self.ledger.clone()))
            .app_data(web::Data::new(self.bridge.clone()))
            .app_data(web::Data::new(self.gate.clone()));
        api::configure(cfg);
    }
}

/// Recorder selected by configuration: JSON lines when a path is set, logs otherwise
pub fn recorder_from_config(config: &RecorderConfig) -> Arc<dyn TransactionRecorder> {
    match &config.path {
        Some(path) => {
            tracing::info!("Recording transactions to {}", path);
            Arc::new(JsonLinesRecorder::new(path))
        },
        None => Arc::new(TracingRecorder),
    }
}
