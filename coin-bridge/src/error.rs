// coin-bridge/src/error.rs
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("no candidate serial ports found")]
    NoCandidates,
    #[error("serial port {address} is busy")]
    Busy { address: String },
    #[error("failed to open {address}: {reason}")]
    Open { address: String, reason: String },
    #[error("failed to toggle control lines: {0}")]
    ControlLines(String),
    #[error("device link is not ready")]
    NotReady,
    #[error("device link closed")]
    LinkClosed,
}

/// Outbound command text outside the controller vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown device command: {0}")]
pub struct UnknownCommand(pub String);
