// kiosk-server/src/actors/coin_ledger.rs
use std::sync::Arc;
use std::time::Duration;

use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult};
use chrono::Utc;
use common::messages::CoinInserted;
use common::models::coin::{ClaimedCoin, CoinEvent, CoinKey};

use crate::claims::ClaimLedger;
use crate::recorder::TransactionRecorder;

#[derive(Message)]
#[rtype(result = "Option<CoinEvent>")]
pub struct GetLastCoin;

/// Actor message: bind a coin event to a session
#[derive(Message)]
#[rtype(result = "bool")]
pub struct ClaimCoin {
    pub timestamp: i64,
    pub value: u32,
    pub session_id: String,
}

#[derive(Message)]
#[rtype(result = "Option<ClaimedCoin>")]
pub struct LookupClaim {
    pub timestamp: i64,
    pub value: u32,
}

/// Keeps the most recent coin and the claims made against coins
pub struct CoinLedgerActor {
    ledger: ClaimLedger,
    last_coin: Option<CoinEvent>,
    recorder: Arc<dyn TransactionRecorder>,
    sweep_interval: Duration,
}

impl CoinLedgerActor {
    pub fn new(ledger: ClaimLedger, recorder: Arc<dyn TransactionRecorder>) -> Self {
        Self {
            ledger,
            last_coin: None,
            recorder,
            sweep_interval: Duration::from_secs(60),
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    // The claim request only carries the key, so the type comes from the last coin when it matches
    fn coin_type_for(&self, key: &CoinKey) -> String {
        match &self.last_coin {
            Some(coin) if coin.key() == *key => coin.coin_type.clone(),
            _ => key.value.to_string(),
        }
    }
}

impl Actor for CoinLedgerActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("CoinLedgerActor started");

        ctx.run_interval(self.sweep_interval, |act, _ctx| {
            let removed = act.ledger.sweep(Utc::now());
            if removed > 0 {
                tracing::debug!("Dropped {} expired coin claims", removed);
            }
        });
    }
}

impl Handler<CoinInserted> for CoinLedgerActor {
    type Result = ();

    fn handle(&mut self, msg: CoinInserted, _ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Coin inserted: {} ({})", msg.value, msg.coin_type);
        self.last_coin = Some(CoinEvent::from(msg));
    }
}

impl Handler<GetLastCoin> for CoinLedgerActor {
    type Result = MessageResult<GetLastCoin>;

    fn handle(&mut self, _msg: GetLastCoin, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.last_coin.clone())
    }
}

impl Handler<ClaimCoin> for CoinLedgerActor {
    type Result = bool;

    fn handle(&mut self, msg: ClaimCoin, _ctx: &mut Self::Context) -> Self::Result {
        let key = CoinKey::new(msg.timestamp, msg.value);
        let previous = self.ledger.claim(key, &msg.session_id, Utc::now());

        // Repeated claims by the same session are not new money
        let newly_bound = previous
            .map(|claim| claim.session_id != msg.session_id)
            .unwrap_or(true);
        if newly_bound {
            let coin_type = self.coin_type_for(&key);
            if let Err(e) = self.recorder.record_coin(msg.value, &coin_type, Some(&msg.session_id)) {
                tracing::error!("Failed to record coin {:?}: {}", key, e);
            }
        }
        true
    }
}

impl Handler<LookupClaim> for CoinLedgerActor {
    type Result = MessageResult<LookupClaim>;

    fn handle(&mut self, msg: LookupClaim, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.ledger.lookup(&CoinKey::new(msg.timestamp, msg.value), Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::testing::MemoryRecorder;
    use chrono::TimeZone;

    fn coin(millis: i64, value: u32) -> CoinInserted {
        CoinInserted {
            value,
            coin_type: value.to_string(),
            timestamp: Utc.timestamp_millis_opt(millis).unwrap(),
        }
    }

    #[actix_web::test]
    async fn retains_last_coin() {
        let ledger = CoinLedgerActor::new(ClaimLedger::default(), Arc::new(MemoryRecorder::default())).start();
        assert!(ledger.send(GetLastCoin).await.unwrap().is_none());

        ledger.send(coin(1_000, 5)).await.unwrap();
        ledger.send(coin(2_000, 20)).await.unwrap();

        let last = ledger.send(GetLastCoin).await.unwrap().unwrap();
        assert_eq!(last.value, 20);
        assert_eq!(last.key(), CoinKey::new(2_000, 20));
    }

    #[actix_web::test]
    async fn claims_record_each_new_owner_once() {
        let recorder = MemoryRecorder::default();
        let ledger = CoinLedgerActor::new(ClaimLedger::default(), Arc::new(recorder.clone())).start();
        ledger.send(coin(1_700_000_000_000, 10)).await.unwrap();

        let claim = |session: &str| ClaimCoin {
            timestamp: 1_700_000_000_000,
            value: 10,
            session_id: session.to_string(),
        };
        assert!(ledger.send(claim("s1")).await.unwrap());
        assert!(ledger.send(claim("s1")).await.unwrap());
        assert!(ledger.send(claim("s2")).await.unwrap());

        let found = ledger
            .send(LookupClaim { timestamp: 1_700_000_000_000, value: 10 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.session_id, "s2");

        let coins = recorder.coins.lock().unwrap();
        assert_eq!(coins.len(), 2);
        assert_eq!(coins[0].session_id.as_deref(), Some("s1"));
        assert_eq!(coins[1].session_id.as_deref(), Some("s2"));
    }

    #[actix_web::test]
    async fn unknown_claim_is_none() {
        let ledger = CoinLedgerActor::new(ClaimLedger::default(), Arc::new(MemoryRecorder::default())).start();
        let found = ledger.send(LookupClaim { timestamp: 1, value: 1 }).await.unwrap();
        assert!(found.is_none());
    }
}
