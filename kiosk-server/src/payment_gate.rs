// kiosk-server/src/payment_gate.rs
use actix::{Addr, MailboxError};
use common::models::coin::CoinEvent;
use serde::Serialize;

use crate::actors::coin_ledger::{CoinLedgerActor, GetLastCoin, LookupClaim};
use crate::actors::queue_manager::{CanProceedToPayment, QueueManagerActor};

/// Outcome of a payment authorization check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentDecision {
    /// The session does not hold the payment slot
    NotActive,
    /// No coin has been seen since startup
    NoCoin,
    Unclaimed { coin: CoinEvent },
    ClaimedByOther { coin: CoinEvent },
    Authorized { coin: CoinEvent },
}

impl PaymentDecision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, PaymentDecision::Authorized { .. })
    }
}

/// Combines the admission check with the claim on the most recent coin
#[derive(Clone)]
pub struct PaymentGate {
    queue: Addr<QueueManagerActor>,
    ledger: Addr<CoinLedgerActor>,
}

impl PaymentGate {
    pub fn new(queue: Addr<QueueManagerActor>, ledger: Addr<CoinLedgerActor>) -> Self {
        Self { queue, ledger }
    }

    pub async fn authorize(&self, session_id: &str) -> Result<PaymentDecision, MailboxError> {
        let active = self
            .queue
            .send(CanProceedToPayment {
                session_id: session_id.to_string(),
            })
            .await?;
        if !active {
            return Ok(PaymentDecision::NotActive);
        }

        let coin = match self.ledger.send(GetLastCoin).await? {
            Some(coin) => coin,
            None => return Ok(PaymentDecision::NoCoin),
        };

        let key = coin.key();
        let claim = self
            .ledger
            .send(LookupClaim {
                timestamp: key.timestamp,
                value: key.value,
            })
            .await?;

        let decision = match claim {
            None => PaymentDecision::Unclaimed { coin },
            Some(claim) if claim.session_id == session_id => PaymentDecision::Authorized { coin },
            Some(_) => PaymentDecision::ClaimedByOther { coin },
        };
        tracing::debug!("Payment check for {}: {:?}", session_id, decision);
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::coin_ledger::ClaimCoin;
    use crate::actors::queue_manager::JoinQueue;
    use crate::admission::QueueSettings;
    use crate::claims::ClaimLedger;
    use crate::recorder::testing::MemoryRecorder;
    use actix::Actor;
    use chrono::{TimeZone, Utc};
    use common::messages::CoinInserted;
    use common::models::session::FileInfo;
    use std::sync::Arc;

    fn gate() -> (PaymentGate, Addr<QueueManagerActor>, Addr<CoinLedgerActor>) {
        let recorder = Arc::new(MemoryRecorder::default());
        let queue = QueueManagerActor::new(QueueSettings::default(), recorder.clone()).start();
        let ledger = CoinLedgerActor::new(ClaimLedger::default(), recorder).start();
        (PaymentGate::new(queue.clone(), ledger.clone()), queue, ledger)
    }

    #[actix_web::test]
    async fn walks_through_every_decision() {
        let (gate, queue, ledger) = gate();
        let join = |id: &str| JoinQueue {
            session_id: id.to_string(),
            file_info: FileInfo::default(),
        };
        queue.send(join("s1")).await.unwrap().unwrap();
        queue.send(join("s2")).await.unwrap().unwrap();

        assert_eq!(gate.authorize("s2").await.unwrap(), PaymentDecision::NotActive);
        assert_eq!(gate.authorize("s1").await.unwrap(), PaymentDecision::NoCoin);

        ledger
            .send(CoinInserted {
                value: 5,
                coin_type: "5".to_string(),
                timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            })
            .await
            .unwrap();
        assert!(matches!(
            gate.authorize("s1").await.unwrap(),
            PaymentDecision::Unclaimed { .. }
        ));

        let claim = |id: &str| ClaimCoin {
            timestamp: 1_700_000_000_000,
            value: 5,
            session_id: id.to_string(),
        };
        ledger.send(claim("s2")).await.unwrap();
        assert!(matches!(
            gate.authorize("s1").await.unwrap(),
            PaymentDecision::ClaimedByOther { .. }
        ));

        ledger.send(claim("s1")).await.unwrap();
        let decision = gate.authorize("s1").await.unwrap();
        assert!(decision.is_authorized());
        match decision {
            PaymentDecision::Authorized { coin } => assert_eq!(coin.value, 5),
            other => panic!("unexpected decision {:?}", other),
        }
    }
}
