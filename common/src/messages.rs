// common/src/messages.rs
use actix::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::coin::CoinEvent;

/// Coin reported by the acceptor hardware. Carries no session identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Message)]
#[rtype(result = "()")]
#[serde(rename_all = "camelCase")]
pub struct CoinInserted {
    pub value: u32,
    pub coin_type: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl From<CoinInserted> for CoinEvent {
    fn from(msg: CoinInserted) -> Self {
        CoinEvent {
            value: msg.value,
            coin_type: msg.coin_type,
            timestamp: msg.timestamp,
        }
    }
}
