// common/src/models/mod.rs
pub mod coin;
pub mod session;
