// kiosk-server/src/actors/mod.rs
pub mod coin_ledger;
pub mod queue_manager;
