// coin-bridge/src/actors/mod.rs

pub mod device_bridge;
