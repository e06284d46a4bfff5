// coin-bridge/src/lib.rs
//! Serial bridge to the coin-accepting microcontroller.
//!
//! The bridge is session-agnostic: it publishes [`common::CoinInserted`] to its
//! subscribers and accepts [`protocol::Command`]s while the link is ready.

pub mod actors;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod link;
pub mod protocol;

pub use actors::device_bridge::{
    DeviceBridge, GetDeviceStatus, ResetConnection, SendCommand, Subscribe, SubscriptionId, Unsubscribe,
};
pub use connection::{BridgeSettings, DeviceStatus, LinkState};
pub use error::{BridgeError, UnknownCommand};
pub use protocol::Command;
